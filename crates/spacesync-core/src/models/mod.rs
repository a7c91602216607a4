//! Data models for Webex directory and membership records.
//!
//! - `DirectoryEntry`: a person from the organization directory
//! - `Membership`: a person's membership in a space

pub mod membership;
pub mod person;

pub use membership::Membership;
pub use person::DirectoryEntry;
