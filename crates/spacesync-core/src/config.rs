//! Run configuration.
//!
//! Everything is read from the process environment once at start-up
//! (the binary loads a `.env` file first, if present). Only the space id
//! and the OAuth client identity are required; file locations and the API
//! base URL have defaults.

use std::path::PathBuf;

use crate::error::{Result, SyncError};

/// Default Webex REST API base URL
pub const DEFAULT_API_BASE: &str = "https://webexapis.com/v1";

/// Default credential store location (relative to the working directory)
const DEFAULT_TOKEN_FILE: &str = "tokens.json";

const DEFAULT_EXCLUDED_EMAILS_FILE: &str = "excluded_emails.txt";
const DEFAULT_EXCLUDED_DEPARTMENTS_FILE: &str = "excluded_departments.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub space_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub token_file: PathBuf,
    pub excluded_emails_file: PathBuf,
    pub excluded_departments_file: PathBuf,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(SyncError::ConfigurationMissing(key));

        Ok(Self {
            space_id: require("SYNC_SPACE_ID")?,
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
            api_base: get("WEBEX_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token_file: get("TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            excluded_emails_file: get("EXCLUDED_EMAILS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXCLUDED_EMAILS_FILE)),
            excluded_departments_file: get("EXCLUDED_DEPARTMENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXCLUDED_DEPARTMENTS_FILE)),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
