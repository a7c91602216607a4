//! Core library for spacesync.
//!
//! Keeps the membership of a single Webex space in sync with the
//! organization's people directory:
//!
//! - `auth`: the persisted OAuth credential and its refresh lifecycle
//! - `api`: the Webex REST client and its error type
//! - `models`: directory and membership records as returned by the API
//! - `services`: the collaborator traits the reconciler talks to
//! - `sync`: exclusion rules, plan computation and plan application

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;

pub use api::{ApiError, RetryPolicy, WebexClient};
pub use auth::{Credential, CredentialStore, TokenGrant, TokenManager, TokenState};
pub use config::Config;
pub use error::{Result, SyncError};
pub use models::{DirectoryEntry, Membership};
pub use services::{DirectoryService, MembershipService, TokenService};
pub use sync::{
    apply_plan, compute_eligible_set, compute_plan, run_sync, sync_space, ApplyReport, EligibleSet,
    ExclusionRules, FilterStats, ReconciliationPlan, RunOptions, SyncSummary,
};
