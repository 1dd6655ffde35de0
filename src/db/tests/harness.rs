//! Test harness for database repository testing.
//!
//! Provides fast in-memory SQLite databases with real migrations so tests
//! match the production schema.

use sqlx::SqlitePool;

/// Create an in-memory SQLite pool for testing
pub async fn create_sqlite_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// Run SQLite migrations on the pool
///
/// Uses the actual migration files to ensure tests match production schema
pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations_sqlx/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}

/// Create a migrated in-memory pool in one call.
pub async fn migrated_pool() -> SqlitePool {
    let pool = create_sqlite_pool().await;
    run_sqlite_migrations(&pool).await;
    pool
}
