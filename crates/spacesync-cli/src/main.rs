//! spacesync - keeps a Webex space roster in sync with the organization
//! directory.
//!
//! Adds every active directory user who passes the exclusion lists to the
//! configured space and removes everyone else. Intended to run unattended
//! (cron, systemd timer); each invocation is one sequential sync run.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use spacesync_core::{sync_space, Config, RunOptions, SyncError, SyncSummary};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit status when the stored token can no longer be refreshed
const EXIT_REAUTH_REQUIRED: u8 = 1;

/// Exit status for every other fatal error
const EXIT_FAILURE: u8 = 2;

const USAGE: &str = "\
Usage: spacesync [--dry-run]

Synchronizes the membership of the space SYNC_SPACE_ID with the
organization directory.

Options:
  --dry-run    Compute and log the changes without applying them
  -h, --help   Show this help

Environment (a .env file in the working directory is loaded first):
  SYNC_SPACE_ID               Space to synchronize (required)
  CLIENT_ID, CLIENT_SECRET    OAuth integration identity (required)
  TOKEN_FILE                  Credential store (default: tokens.json)
  EXCLUDED_EMAILS_FILE        One email per line (default: excluded_emails.txt)
  EXCLUDED_DEPARTMENTS_FILE   One department substring per line
                              (default: excluded_departments.txt)
  WEBEX_API_BASE              API base URL (default: https://webexapis.com/v1)
  RUST_LOG                    Log filter (default: info)";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut options = RunOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => options.dry_run = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("Unknown argument: {}\n\n{}", other, USAGE);
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    }

    init_tracing();

    match run(options).await {
        Ok(summary) => {
            report(&summary, options);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = exit_code(&e);
            if code == EXIT_REAUTH_REQUIRED {
                eprintln!(
                    "Stored token has expired and cannot be refreshed, please generate a new \
                     admin token by running the interactive login procedure."
                );
            } else {
                error!("{:#}", e);
            }
            ExitCode::from(code)
        }
    }
}

/// Map a fatal error to the process exit status.
///
/// Looks through any context added on the way up to find the `SyncError`.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::ReauthenticationRequired) => EXIT_REAUTH_REQUIRED,
        _ => EXIT_FAILURE,
    }
}

async fn run(options: RunOptions) -> Result<SyncSummary> {
    let config = Config::from_env().context("Failed to read configuration from environment")?;
    info!(space_id = %config.space_id, dry_run = options.dry_run, "spacesync starting");

    let summary = sync_space(&config, options)
        .await
        .with_context(|| format!("Sync of space {} failed", config.space_id))?;
    Ok(summary)
}

fn report(summary: &SyncSummary, options: RunOptions) {
    info!(
        directory = summary.directory_count,
        members = summary.member_count,
        eligible = summary.eligible_count,
        filtered = summary.filtered.total(),
        "Run complete"
    );

    match summary.applied {
        None if options.dry_run => info!(
            would_add = summary.planned_adds,
            would_remove = summary.planned_removes,
            "Dry run, no changes made"
        ),
        None => {}
        Some(ref applied) if applied.is_complete() => info!(
            added = applied.added,
            removed = applied.removed,
            "Done! Space membership and directory are in sync."
        ),
        Some(ref applied) => error!(
            added = applied.added,
            removed = applied.removed,
            failed_adds = ?applied.failed_adds,
            failed_removes = ?applied.failed_removes,
            "Sync finished with failures; failed changes will be retried on the next run"
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use spacesync_core::ApiError;

    #[test]
    fn test_exit_code_reauth_through_context() {
        let err = anyhow::Error::new(SyncError::ReauthenticationRequired)
            .context("Sync of space room-1 failed");
        assert_eq!(exit_code(&err), EXIT_REAUTH_REQUIRED);
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_exit_code_missing_configuration() {
        let err = anyhow::Error::new(SyncError::ConfigurationMissing("SYNC_SPACE_ID"))
            .context("Failed to read configuration from environment");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_exit_code_refresh_failed() {
        let err = anyhow::Error::new(SyncError::RefreshFailed(ApiError::Unauthorized))
            .context("Sync of space room-1 failed");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_exit_code_unrelated_error() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), EXIT_FAILURE);
    }
}
