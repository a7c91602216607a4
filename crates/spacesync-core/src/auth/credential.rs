use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::ApiError;
use crate::error::{Result, SyncError};

/// OAuth credential as stored in the token file.
///
/// Field names match what OAuth client libraries write, so a file produced
/// by the external login procedure can be read as-is. Unknown fields are kept
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds, as issued
    pub expires_in: i64,
    #[serde(with = "epoch_seconds")]
    pub expires_at: DateTime<Utc>,
    /// Lifetime of the refresh token in seconds, counted from issue time
    pub refresh_token_expires_in: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    /// When the credential was issued, derived from the access token expiry.
    ///
    /// `None` if the stored lifetime does not fit the representable time range.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = TimeDelta::try_seconds(self.expires_in)?;
        self.expires_at.checked_sub_signed(lifetime)
    }

    /// Last instant at which the refresh token can still be redeemed.
    pub fn refresh_expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = TimeDelta::try_seconds(self.refresh_token_expires_in)?;
        self.issued_at()?.checked_add_signed(lifetime)
    }

    pub fn is_access_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }

    /// A credential whose refresh boundary cannot be computed is never refreshable.
    pub fn is_refreshable_at(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at().is_some_and(|end| now <= end)
    }

    /// Check that the lifetimes are non-negative and that every derived
    /// instant is representable.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.expires_in < 0 || self.refresh_token_expires_in < 0 {
            return Err(format!(
                "negative token lifetime (expires_in={}, refresh_token_expires_in={})",
                self.expires_in, self.refresh_token_expires_in
            ));
        }
        if self.refresh_expires_at().is_none() {
            return Err(format!(
                "token lifetime out of range (expires_in={}, refresh_token_expires_in={})",
                self.expires_in, self.refresh_token_expires_in
            ));
        }
        Ok(())
    }

    /// Build the replacement credential from a token endpoint response.
    ///
    /// Values the endpoint leaves out (the refresh token itself, or its
    /// lifetime) are carried over from `previous`. Lifetimes that cannot be
    /// turned into valid instants are rejected as an invalid response.
    pub fn from_grant(
        grant: TokenGrant,
        issued_at: DateTime<Utc>,
        previous: &Credential,
    ) -> std::result::Result<Self, ApiError> {
        let expires_at = TimeDelta::try_seconds(grant.expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("expires_in out of range: {}", grant.expires_in))
            })?;

        let mut extra = grant.extra;
        extra.remove("expires_at");
        let credential = Self {
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .unwrap_or_else(|| previous.refresh_token.clone()),
            expires_in: grant.expires_in,
            expires_at,
            refresh_token_expires_in: grant
                .refresh_token_expires_in
                .unwrap_or(previous.refresh_token_expires_in),
            extra,
        };
        credential.validate().map_err(ApiError::InvalidResponse)?;
        Ok(credential)
    }
}

/// Token endpoint response for a `refresh_token` grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// (De)serializes a timestamp as Unix epoch seconds, accepting fractions.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.timestamp_millis() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(de::Error::custom("expires_at is not a finite number"));
        }
        DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
            .ok_or_else(|| de::Error::custom(format!("expires_at out of range: {}", secs)))
    }
}

/// The credential file.
///
/// The file is owned exclusively by one run; there is no locking against a
/// second process refreshing at the same time.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential, or `None` if there is no store file.
    pub fn load(&self) -> Result<Option<Credential>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential store file");
                return Ok(None);
            }
            Err(e) => return Err(self.store_error(e)),
        };

        let credential: Credential = serde_json::from_str(&contents)
            .map_err(|e| self.store_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        credential
            .validate()
            .map_err(|e| self.store_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(Some(credential))
    }

    /// Replace the stored credential.
    ///
    /// Writes a sibling temp file and renames it over the store, so a failed
    /// write never leaves a truncated credential behind.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let contents = serde_json::to_string_pretty(credential)
            .map_err(|e| self.store_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.store_error(e))?;
        }

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, contents).map_err(|e| self.store_error(e))?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(self.store_error(e));
        }

        debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tokens.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn store_error(&self, source: io::Error) -> SyncError {
        SyncError::CredentialStore {
            path: self.path.clone(),
            source,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
