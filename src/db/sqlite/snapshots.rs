use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{DateRange, SnapshotRepo},
    },
    models::{DaySnapshot, SnapshotRecord},
};

pub struct SqliteSnapshotRepo {
    pool: SqlitePool,
}

impl SqliteSnapshotRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Parse a stored payload, degrading to an all-zero snapshot when the
    /// blob does not match the expected shape.
    fn parse_payload(org: &str, date: NaiveDate, raw: &str) -> DaySnapshot {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(org, %date, error = %e, "Malformed snapshot payload, treating as empty");
            DaySnapshot::default()
        })
    }
}

#[async_trait]
impl SnapshotRepo for SqliteSnapshotRepo {
    async fn exists(&self, org: &str, date: NaiveDate) -> DbResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM snapshots WHERE org = ? AND date = ?
            "#,
        )
        .bind(org)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn insert(&self, org: &str, date: NaiveDate, data: &serde_json::Value) -> DbResult<()> {
        let payload = serde_json::to_string(data)?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (org, date, data)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(org)
        .bind(date)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::Conflict(
                format!("Snapshot for '{org}' on {date} already exists"),
            ),
            _ => DbError::from(e),
        })?;

        Ok(())
    }

    async fn query_range(
        &self,
        range: DateRange,
        orgs: &[String],
    ) -> DbResult<Vec<SnapshotRecord>> {
        // ISO dates compare correctly as TEXT, so BETWEEN-style bounds
        // work without casting.
        let mut query = String::from(
            r#"
            SELECT org, date, data
            FROM snapshots
            WHERE date >= ? AND date <= ?
            "#,
        );

        if !orgs.is_empty() {
            let placeholders = vec!["?"; orgs.len()].join(", ");
            query.push_str(&format!(" AND org IN ({placeholders})"));
        }
        query.push_str(" ORDER BY date ASC, org ASC");

        let mut q = sqlx::query(&query).bind(range.start).bind(range.end);
        for org in orgs {
            q = q.bind(org);
        }

        let rows = q.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let org: String = row.get("org");
                let date: NaiveDate = row.get("date");
                let raw: String = row.get("data");
                let data = Self::parse_payload(&org, date, &raw);
                SnapshotRecord { org, date, data }
            })
            .collect())
    }

    async fn distinct_orgs(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT org FROM snapshots ORDER BY org ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("org")).collect())
    }

    async fn date_bounds(&self) -> DbResult<Option<(NaiveDate, NaiveDate)>> {
        let row = sqlx::query(
            r#"
            SELECT MIN(date) as min_date, MAX(date) as max_date FROM snapshots
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min: Option<NaiveDate> = row.get("min_date");
        let max: Option<NaiveDate> = row.get("max_date");

        Ok(min.zip(max))
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as snapshot_count FROM snapshots
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("snapshot_count"))
    }
}
