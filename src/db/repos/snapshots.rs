use async_trait::async_trait;
use chrono::NaiveDate;

use super::DateRange;
use crate::{db::error::DbResult, models::SnapshotRecord};

/// Repository for daily usage snapshots.
///
/// Snapshots are append-only from the ingestion side: at most one row
/// exists per (org, date), and stored rows are never updated.
#[async_trait]
pub trait SnapshotRepo: Send + Sync {
    /// Point lookup for an already-stored (org, date) pair.
    async fn exists(&self, org: &str, date: NaiveDate) -> DbResult<bool>;

    /// Store one snapshot. Fails with [`DbError::Conflict`] when the
    /// (org, date) pair is already present.
    ///
    /// [`DbError::Conflict`]: crate::db::DbError::Conflict
    async fn insert(&self, org: &str, date: NaiveDate, data: &serde_json::Value) -> DbResult<()>;

    /// Inclusive date-bounded scan, optionally restricted to an explicit
    /// organization set. An empty `orgs` slice returns all organizations.
    async fn query_range(&self, range: DateRange, orgs: &[String])
    -> DbResult<Vec<SnapshotRecord>>;

    /// All organizations with at least one snapshot, sorted.
    async fn distinct_orgs(&self) -> DbResult<Vec<String>>;

    /// Earliest and latest snapshot dates, or None when the store is empty.
    async fn date_bounds(&self) -> DbResult<Option<(NaiveDate, NaiveDate)>>;

    /// Total number of stored snapshots.
    async fn count(&self) -> DbResult<i64>;
}
