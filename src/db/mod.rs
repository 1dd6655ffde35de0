mod error;
pub mod repos;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::{path::Path, sync::Arc};

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    snapshots: Arc<dyn SnapshotRepo>,
}

/// SQLite-backed database pool.
///
/// Repositories are cached at construction time to avoid allocation on
/// each access.
pub struct DbPool {
    pool: sqlx::SqlitePool,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let repos = CachedRepos {
            snapshots: Arc::new(sqlite::SqliteSnapshotRepo::new(pool.clone())),
        };
        DbPool { pool, repos }
    }

    /// Create a database pool from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(config.create_if_missing)
                    .journal_mode(if config.wal_mode {
                        sqlx::sqlite::SqliteJournalMode::Wal
                    } else {
                        sqlx::sqlite::SqliteJournalMode::Delete
                    })
                    .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms)),
            )
            .await?;

        Ok(Self::from_sqlite(pool))
    }

    /// Run database migrations using sqlx's migration runner.
    /// This automatically creates and manages a _sqlx_migrations table.
    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running SQLite migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        tracing::info!("SQLite migrations completed successfully");
        Ok(())
    }

    /// Get snapshot repository
    pub fn snapshots(&self) -> Arc<dyn SnapshotRepo> {
        Arc::clone(&self.repos.snapshots)
    }

    /// Health check for database connectivity
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Write a consistent copy of the whole database to `path` using
    /// SQLite's own `VACUUM INTO` dump. The target file must not exist.
    pub async fn backup_to(&self, path: impl AsRef<Path>) -> DbResult<()> {
        let target = path.as_ref().to_string_lossy().into_owned();
        sqlx::query("VACUUM INTO ?")
            .bind(target)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
