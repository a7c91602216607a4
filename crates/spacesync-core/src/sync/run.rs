use tracing::info;

use crate::api::WebexClient;
use crate::auth::{CredentialStore, TokenManager};
use crate::config::Config;
use crate::error::Result;
use crate::services::{DirectoryService, MembershipService};
use crate::sync::{apply_plan, compute_plan, filter_directory, ApplyReport, ExclusionRules, FilterStats};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and log the plan without changing the space
    pub dry_run: bool,
}

/// What a run saw and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub directory_count: usize,
    pub member_count: usize,
    pub eligible_count: usize,
    pub filtered: FilterStats,
    pub planned_adds: usize,
    pub planned_removes: usize,
    /// `None` for a dry run
    pub applied: Option<ApplyReport>,
}

/// Reconcile the space against the directory with already-authenticated
/// services.
///
/// Listing failures abort the run; individual membership changes do not.
pub async fn run_sync<D, M>(
    directory: &D,
    memberships: &M,
    space_id: &str,
    rules: &ExclusionRules,
    options: RunOptions,
) -> Result<SyncSummary>
where
    D: DirectoryService + ?Sized,
    M: MembershipService + ?Sized,
{
    let people = directory.list_people().await?;
    let outcome = filter_directory(&people, rules);
    info!(
        people = people.len(),
        eligible = outcome.eligible.len(),
        filtered = outcome.stats.total(),
        "Read organization directory"
    );

    info!(space_id = space_id, "Evaluating membership in space");
    let members = memberships.list_memberships(space_id).await?;
    let plan = compute_plan(&outcome.eligible, &members);
    info!(
        members = members.len(),
        to_add = plan.to_add.len(),
        to_remove = plan.to_remove.len(),
        "Computed reconciliation plan"
    );

    let mut summary = SyncSummary {
        directory_count: people.len(),
        member_count: members.len(),
        eligible_count: outcome.eligible.len(),
        filtered: outcome.stats,
        planned_adds: plan.to_add.len(),
        planned_removes: plan.to_remove.len(),
        applied: None,
    };

    if options.dry_run {
        for (membership_id, person_id) in &plan.to_remove {
            info!(person_id = %person_id, membership_id = %membership_id, "Would remove user");
        }
        for person_id in &plan.to_add {
            info!(person_id = %person_id, "Would add user");
        }
        return Ok(summary);
    }

    let report = apply_plan(&plan, space_id, memberships).await;
    info!(
        added = report.added,
        removed = report.removed,
        failed = report.failed_adds.len() + report.failed_removes.len(),
        "Applied reconciliation plan"
    );
    summary.applied = Some(report);
    Ok(summary)
}

/// Full run against Webex: validate or refresh the stored credential, load
/// the exclusion lists, then reconcile.
///
/// Credential problems are returned before any membership call is made.
pub async fn sync_space(config: &Config, options: RunOptions) -> Result<SyncSummary> {
    let client = WebexClient::new(&config.api_base)?;
    let manager = TokenManager::new(
        CredentialStore::new(&config.token_file),
        client.clone(),
        config.client_id.as_str(),
        config.client_secret.as_str(),
    );

    let credential = manager.ensure_valid(manager.load()?).await?;
    let api = client.with_token(credential.access_token);

    let rules = ExclusionRules::load(&config.excluded_emails_file, &config.excluded_departments_file)?;
    run_sync(&api, &api, &config.space_id, &rules, options).await
}
