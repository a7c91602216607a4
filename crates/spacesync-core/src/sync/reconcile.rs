use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::models::{DirectoryEntry, Membership};
use crate::services::MembershipService;
use crate::sync::ExclusionRules;

/// Person ids that should be members of the space
pub type EligibleSet = BTreeSet<String>;

/// Why a directory entry was left out of the eligible set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    LoginDisabled,
    InvitePending,
    ExcludedEmail,
    ExcludedDepartment,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::LoginDisabled => write!(f, "login disabled"),
            RejectReason::InvitePending => write!(f, "invite pending"),
            RejectReason::ExcludedEmail => write!(f, "excluded email"),
            RejectReason::ExcludedDepartment => write!(f, "excluded department"),
        }
    }
}

/// Rejection counts per reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub login_disabled: usize,
    pub invite_pending: usize,
    pub excluded_email: usize,
    pub excluded_department: usize,
}

impl FilterStats {
    fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::LoginDisabled => self.login_disabled += 1,
            RejectReason::InvitePending => self.invite_pending += 1,
            RejectReason::ExcludedEmail => self.excluded_email += 1,
            RejectReason::ExcludedDepartment => self.excluded_department += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.login_disabled + self.invite_pending + self.excluded_email + self.excluded_department
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub eligible: EligibleSet,
    pub stats: FilterStats,
}

/// Membership changes needed to make the space match the eligible set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Person ids to add
    pub to_add: BTreeSet<String>,
    /// Membership id to delete -> person id it belongs to
    pub to_remove: BTreeMap<String, String>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Outcome of applying a plan. Failed operations carry the affected id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub added: usize,
    pub removed: usize,
    pub failed_adds: Vec<String>,
    pub failed_removes: Vec<String>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed_adds.is_empty() && self.failed_removes.is_empty()
    }
}

/// First filter an entry fails, in evaluation order.
///
/// Only the first listed email is checked against the excluded addresses;
/// secondary addresses are ignored.
pub fn rejection_reason(entry: &DirectoryEntry, rules: &ExclusionRules) -> Option<RejectReason> {
    if !entry.login_enabled {
        return Some(RejectReason::LoginDisabled);
    }
    if entry.invite_pending {
        return Some(RejectReason::InvitePending);
    }
    if entry
        .primary_email()
        .is_some_and(|email| rules.is_email_excluded(email))
    {
        return Some(RejectReason::ExcludedEmail);
    }
    if entry
        .department
        .as_deref()
        .and_then(|department| rules.matching_department(department))
        .is_some()
    {
        return Some(RejectReason::ExcludedDepartment);
    }
    None
}

/// Split the directory into eligible ids and per-reason rejection counts.
pub fn filter_directory(directory: &[DirectoryEntry], rules: &ExclusionRules) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for entry in directory {
        match rejection_reason(entry, rules) {
            None => {
                outcome.eligible.insert(entry.id.clone());
            }
            Some(reason) => {
                match reason {
                    RejectReason::ExcludedEmail | RejectReason::ExcludedDepartment => info!(
                        id = %entry.id,
                        name = %entry.display_name,
                        email = entry.primary_email().unwrap_or_default(),
                        department = entry.department.as_deref().unwrap_or_default(),
                        %reason,
                        "Excluding user"
                    ),
                    _ => debug!(id = %entry.id, name = %entry.display_name, %reason, "Skipping inactive user"),
                }
                outcome.stats.record(reason);
            }
        }
    }

    outcome
}

/// Ids of directory entries that pass every exclusion filter.
pub fn compute_eligible_set(directory: &[DirectoryEntry], rules: &ExclusionRules) -> EligibleSet {
    filter_directory(directory, rules).eligible
}

/// Diff the eligible set against the current roster.
///
/// Every membership of an ineligible person is removed, so a person listed
/// more than once in the roster leaves no stray membership behind.
pub fn compute_plan(eligible: &EligibleSet, current_members: &[Membership]) -> ReconciliationPlan {
    let mut memberships_per_person: BTreeMap<&str, usize> = BTreeMap::new();
    for m in current_members {
        *memberships_per_person.entry(m.person_id.as_str()).or_default() += 1;
    }
    for (person_id, count) in &memberships_per_person {
        if *count > 1 {
            warn!(person_id = %person_id, memberships = count, "Person holds several memberships in the space");
        }
    }

    let to_add = eligible
        .iter()
        .filter(|id| !memberships_per_person.contains_key(id.as_str()))
        .cloned()
        .collect();

    let to_remove = current_members
        .iter()
        .filter(|m| !eligible.contains(&m.person_id))
        .map(|m| (m.membership_id.clone(), m.person_id.clone()))
        .collect();

    ReconciliationPlan { to_add, to_remove }
}

/// Apply a plan, removals first.
///
/// A failed call is logged with the affected id and the remaining
/// operations still run; there is no rollback.
pub async fn apply_plan<M>(plan: &ReconciliationPlan, space_id: &str, service: &M) -> ApplyReport
where
    M: MembershipService + ?Sized,
{
    let mut report = ApplyReport::default();

    for (membership_id, person_id) in &plan.to_remove {
        info!(person_id = %person_id, membership_id = %membership_id, "Removing user");
        match service.delete_membership(membership_id).await {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!(person_id = %person_id, membership_id = %membership_id, error = %e, "Failed to remove user");
                report.failed_removes.push(person_id.clone());
            }
        }
    }

    for person_id in &plan.to_add {
        info!(person_id = %person_id, "Adding user");
        match service.create_membership(space_id, person_id).await {
            Ok(()) => report.added += 1,
            Err(e) => {
                warn!(person_id = %person_id, error = %e, "Failed to add user");
                report.failed_adds.push(person_id.clone());
            }
        }
    }

    report
}

// ============================================================================
// Tests
// ============================================================================
