use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

/// Fatal conditions of a sync run.
///
/// Per-membership mutation failures are not represented here: they are
/// logged and counted in the `ApplyReport` instead of aborting the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Stored token has expired and cannot be refreshed")]
    ReauthenticationRequired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] ApiError),

    #[error("External service error: {0}")]
    ExternalService(#[from] ApiError),

    #[error("Missing required configuration value: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Credential store error at {}: {source}", path.display())]
    CredentialStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read exclusion list {}: {source}", path.display())]
    ExclusionList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Whether the user has to run the interactive login flow before retrying.
    pub fn needs_reauthentication(&self) -> bool {
        matches!(self, SyncError::ReauthenticationRequired)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
