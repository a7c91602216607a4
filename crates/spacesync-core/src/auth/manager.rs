use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialStore};
use crate::error::{Result, SyncError};
use crate::services::TokenService;

/// Where a stored credential stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No credential on file
    Missing,
    /// Access token still usable
    Valid,
    /// Access token expired, refresh token still usable
    Refreshable,
    /// Both tokens expired; only a new interactive login helps
    Unrecoverable,
}

impl TokenState {
    pub fn classify(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            None => TokenState::Missing,
            Some(c) if !c.is_refreshable_at(now) => TokenState::Unrecoverable,
            Some(c) if c.is_access_valid_at(now) => TokenState::Valid,
            Some(_) => TokenState::Refreshable,
        }
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenState::Missing => write!(f, "missing"),
            TokenState::Valid => write!(f, "valid"),
            TokenState::Refreshable => write!(f, "expired (refreshable)"),
            TokenState::Unrecoverable => write!(f, "expired (unrecoverable)"),
        }
    }
}

/// Loads the stored credential and keeps it usable for the current run.
///
/// The manager holds no credential itself: callers pass the loaded value in
/// and get the usable one back.
pub struct TokenManager<T> {
    store: CredentialStore,
    token_service: T,
    client_id: String,
    client_secret: String,
}

impl<T: TokenService> TokenManager<T> {
    pub fn new(
        store: CredentialStore,
        token_service: T,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            token_service,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Read the persisted credential, if any.
    pub fn load(&self) -> Result<Option<Credential>> {
        self.store.load()
    }

    /// Return a credential whose access token is usable now.
    pub async fn ensure_valid(&self, credential: Option<Credential>) -> Result<Credential> {
        self.ensure_valid_at(credential, Utc::now()).await
    }

    /// Same as [`ensure_valid`](Self::ensure_valid) with an explicit clock.
    pub async fn ensure_valid_at(
        &self,
        credential: Option<Credential>,
        now: DateTime<Utc>,
    ) -> Result<Credential> {
        let state = TokenState::classify(credential.as_ref(), now);
        debug!(%state, "Checked stored credential");

        match (state, credential) {
            (TokenState::Valid, Some(credential)) => {
                info!(expires_at = %credential.expires_at, "Using stored token");
                Ok(credential)
            }
            (TokenState::Refreshable, Some(credential)) => {
                info!(expired_at = %credential.expires_at, "Stored token expired, refreshing");
                self.refresh_at(&credential, now).await
            }
            _ => {
                warn!(%state, path = %self.store.path().display(), "Stored token cannot be used or refreshed");
                Err(SyncError::ReauthenticationRequired)
            }
        }
    }

    /// Redeem the refresh token and persist the new credential.
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        self.refresh_at(credential, Utc::now()).await
    }

    async fn refresh_at(&self, credential: &Credential, now: DateTime<Utc>) -> Result<Credential> {
        let grant = self
            .token_service
            .refresh_token(&credential.refresh_token, &self.client_id, &self.client_secret)
            .await
            .map_err(SyncError::RefreshFailed)?;

        let refreshed =
            Credential::from_grant(grant, now, credential).map_err(SyncError::RefreshFailed)?;
        self.store.save(&refreshed)?;

        info!(expires_at = %refreshed.expires_at, "Obtained and stored refreshed token");
        Ok(refreshed)
    }
}

// ============================================================================
// Tests
// ============================================================================
