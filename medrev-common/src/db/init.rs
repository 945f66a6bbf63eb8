//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently. All timestamp columns that participate in comparisons
//! are written from Rust as `chrono::DateTime<Utc>` values so the stored
//! text format stays uniform.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer; the cache and
    // quota tables are written from many concurrent requests
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Migrations (idempotent - safe to call multiple times)
    create_doctor_reviews_table(&pool).await?;
    create_caller_quotas_table(&pool).await?;

    Ok(pool)
}

/// Create the doctor_reviews table
///
/// One row per deduplicated review. The `(doctor_id, hash)` primary key
/// makes `INSERT OR IGNORE` the dedup mechanism: re-inserting a review
/// whose content hash is already present for that doctor is a no-op.
pub async fn create_doctor_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doctor_reviews (
            doctor_id TEXT NOT NULL,
            hash TEXT NOT NULL,
            doctor_name TEXT NOT NULL,
            doctor_specialty TEXT,
            hospital_name TEXT,
            location TEXT,
            source TEXT NOT NULL,
            url TEXT,
            snippet TEXT NOT NULL,
            sentiment TEXT,
            rating REAL NOT NULL DEFAULT 0,
            review_date TEXT,
            author_name TEXT NOT NULL DEFAULT 'Anonymous',
            fetched_at TEXT NOT NULL,
            valid_until TEXT NOT NULL,
            display_policy TEXT NOT NULL DEFAULT 'normal',
            PRIMARY KEY (doctor_id, hash),
            CHECK (sentiment IS NULL OR sentiment IN ('positive', 'neutral', 'negative')),
            CHECK (display_policy IN ('normal', 'hidden')),
            CHECK (length(hash) = 64)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Read path filters on doctor_id + valid_until
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_doctor_reviews_valid ON doctor_reviews(doctor_id, valid_until)",
    )
    .execute(pool)
    .await?;

    // Sweep path scans valid_until alone
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_doctor_reviews_expiry ON doctor_reviews(valid_until)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the caller_quotas table
///
/// One row per caller identity, created lazily on first request.
pub async fn create_caller_quotas_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS caller_quotas (
            caller_id TEXT PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'standard',
            quota_ceiling INTEGER NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 0,
            total_requests INTEGER NOT NULL DEFAULT 0,
            period_anchor TEXT NOT NULL,
            first_seen TEXT NOT NULL,
            last_active TEXT NOT NULL,
            CHECK (role IN ('standard', 'elevated')),
            CHECK (usage_count >= 0),
            CHECK (quota_ceiling > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_caller_quotas_last_active ON caller_quotas(last_active)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_creates_tables() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("medrev.db");

        let pool = init_database(&db_path).await.unwrap();

        // Schema is queryable
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM doctor_reviews")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM caller_quotas")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("medrev.db");

        let pool = init_database(&db_path).await.unwrap();
        drop(pool);

        // Second init against the same file must not fail
        init_database(&db_path).await.unwrap();
    }
}
