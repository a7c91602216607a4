//! Collaborator interfaces used by the token manager and the reconciler.
//!
//! `WebexClient` implements all three against the Webex REST API; tests
//! substitute in-memory fakes.

use async_trait::async_trait;

use crate::api::ApiError;
use crate::auth::TokenGrant;
use crate::models::{DirectoryEntry, Membership};

/// Source of the organization's people directory
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_people(&self) -> Result<Vec<DirectoryEntry>, ApiError>;
}

/// Membership operations on a space
#[async_trait]
pub trait MembershipService: Send + Sync {
    async fn list_memberships(&self, space_id: &str) -> Result<Vec<Membership>, ApiError>;

    async fn create_membership(&self, space_id: &str, person_id: &str) -> Result<(), ApiError>;

    async fn delete_membership(&self, membership_id: &str) -> Result<(), ApiError>;
}

/// OAuth token endpoint
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, ApiError>;
}
