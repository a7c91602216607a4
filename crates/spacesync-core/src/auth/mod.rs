//! Authentication module for the Webex OAuth credential.
//!
//! This module provides:
//! - `Credential`: the persisted access/refresh token pair and its expiry data
//! - `CredentialStore`: the JSON file the credential lives in
//! - `TokenManager`: decides whether a stored credential is usable,
//!   refreshes it when possible, and reports when a new login is required
//!
//! The first credential is always created by an external interactive login;
//! this crate only ever loads and refreshes it.

pub mod credential;
pub mod manager;

pub use credential::{Credential, CredentialStore, TokenGrant};
pub use manager::{TokenManager, TokenState};
