//! Roster reconciliation.
//!
//! A run reads the directory and the current space membership, filters the
//! directory through the exclusion rules, and applies the resulting
//! add/remove plan:
//!
//! - `exclusions`: email and department exclusion lists
//! - `reconcile`: eligibility filtering, plan computation, plan application
//! - `run`: the end-to-end run used by the binary

pub mod exclusions;
pub mod reconcile;
pub mod run;

pub use exclusions::ExclusionRules;
pub use reconcile::{
    apply_plan, compute_eligible_set, compute_plan, filter_directory, ApplyReport, EligibleSet,
    FilterOutcome, FilterStats, ReconciliationPlan, RejectReason,
};
pub use run::{run_sync, sync_space, RunOptions, SyncSummary};
