//! Import orchestration: fetch → store, organization by organization.
//!
//! A fetch failure for one organization is recorded in the report and the
//! run moves on; storage failures abort the run. Successfully stored
//! snapshots stay stored even when a later organization fails — there is
//! no cross-organization rollback.

pub mod scheduler;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    config::GithubConfig,
    db::{DbError, SnapshotRepo},
    github::{FetchError, MetricsClient},
    secrets::{SecretError, SecretManager},
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No bearer token available under secret key '{0}'")]
    MissingToken(String),

    #[error("No organizations configured")]
    NoOrganizations,

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Outcome of one import pass.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Snapshots written to the store.
    pub inserted: u64,
    /// Snapshots already present (or lacking a usable date).
    pub skipped: u64,
    /// Organizations whose fetch failed and contributed nothing.
    pub failures: Vec<OrgFailure>,
}

#[derive(Debug)]
pub struct OrgFailure {
    pub org: String,
    pub error: FetchError,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run one import pass over the configured organization list.
///
/// Fails fast before any fetch when no token is resolvable or the
/// organization list is empty.
pub async fn run_import(
    config: &GithubConfig,
    secrets: &dyn SecretManager,
    client: &MetricsClient,
    snapshots: &dyn SnapshotRepo,
) -> Result<ImportReport, ImportError> {
    if config.orgs.is_empty() {
        return Err(ImportError::NoOrganizations);
    }

    let token = secrets
        .get(&config.token_secret)
        .await?
        .ok_or_else(|| ImportError::MissingToken(config.token_secret.clone()))?;

    let mut report = ImportReport::default();

    for org in &config.orgs {
        match client.fetch_org_metrics(org, &token).await {
            Ok(batch) => {
                let fetched = batch.len();
                let (inserted, skipped) = store_org_snapshots(org, &batch, snapshots).await?;
                report.inserted += inserted;
                report.skipped += skipped;
                tracing::info!(org, fetched, inserted, skipped, "Imported organization");
            }
            Err(error) => {
                tracing::error!(org, %error, "Skipping organization after fetch failure");
                report.failures.push(OrgFailure {
                    org: org.clone(),
                    error,
                });
            }
        }
    }

    Ok(report)
}

/// Check-then-insert each snapshot of one organization's batch.
///
/// The UNIQUE index makes the insert safe even if another writer won the
/// race between the check and the insert; that Conflict counts as a skip.
async fn store_org_snapshots(
    org: &str,
    batch: &[serde_json::Value],
    snapshots: &dyn SnapshotRepo,
) -> Result<(u64, u64), DbError> {
    let mut inserted = 0;
    let mut skipped = 0;

    for snapshot in batch {
        let Some(date) = snapshot_date(snapshot) else {
            tracing::warn!(org, "Snapshot without a parseable date, skipping");
            skipped += 1;
            continue;
        };

        if snapshots.exists(org, date).await? {
            skipped += 1;
            continue;
        }

        match snapshots.insert(org, date, snapshot).await {
            Ok(()) => inserted += 1,
            Err(DbError::Conflict(_)) => skipped += 1,
            Err(e) => return Err(e),
        }
    }

    Ok((inserted, skipped))
}

fn snapshot_date(snapshot: &serde_json::Value) -> Option<NaiveDate> {
    snapshot
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::snapshot_date;

    #[test]
    fn snapshot_date_parses_iso_dates() {
        let date = snapshot_date(&json!({"date": "2025-06-02"})).expect("date");
        assert_eq!(date.to_string(), "2025-06-02");
    }

    #[test]
    fn snapshot_date_rejects_missing_or_malformed() {
        assert_eq!(snapshot_date(&json!({})), None);
        assert_eq!(snapshot_date(&json!({"date": 20250602})), None);
        assert_eq!(snapshot_date(&json!({"date": "06/02/2025"})), None);
    }
}
