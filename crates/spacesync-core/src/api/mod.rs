//! REST API client module for Webex services.
//!
//! This module provides the `WebexClient` for listing the people directory,
//! listing and mutating space memberships, and redeeming OAuth refresh
//! tokens.
//!
//! Data endpoints use bearer token authentication with the access token
//! handed out by the `TokenManager`.

pub mod client;
pub mod error;

pub use client::{RetryPolicy, WebexClient};
pub use error::ApiError;
