//! Database setup and initialization.
//!
//! Entry points call [`setup_database`] with the resolved database path.
//! All schema statements use `IF NOT EXISTS`, so setup is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::path::Path;

/// Open (creating if missing) the database at `db_path` and apply the schema.
///
/// # Example
///
/// ```rust,no_run
/// use gamedock_db::setup_database;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = setup_database(Path::new("/path/to/gamedock.db")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true),
    )
    .await?;

    create_schema(&pool).await?;
    tracing::debug!(path = %db_path.display(), "database ready");

    Ok(pool)
}

/// Sets up an in-memory `SQLite` database for testing.
///
/// The pool holds exactly one connection that is never recycled: every
/// in-memory connection is its own database.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_id TEXT NOT NULL,
            title TEXT NOT NULL,
            size_hint INTEGER,
            image_refs TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL CHECK(status IN
                ('queued', 'active', 'paused', 'completed', 'failed', 'canceled')),
            progress_percent REAL NOT NULL DEFAULT 0,
            bytes_downloaded INTEGER NOT NULL DEFAULT 0,
            bytes_total INTEGER,
            transfer_rate REAL,
            eta_seconds INTEGER,
            queue_position INTEGER,
            error_message TEXT,
            awaiting_second_factor INTEGER NOT NULL DEFAULT 0,
            install_dir TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            CHECK ((status = 'queued') = (queue_position IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One open entry per resource, enforced at commit.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_open_resource
        ON queue_entries(resource_id)
        WHERE status IN ('queued', 'active', 'paused')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_status_position ON queue_entries(status, queue_position)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS compression_jobs (
            resource_id TEXT PRIMARY KEY NOT NULL,
            status TEXT NOT NULL,
            format TEXT NOT NULL,
            level INTEGER NOT NULL,
            progress_percent REAL NOT NULL DEFAULT 0,
            total_bytes INTEGER NOT NULL DEFAULT 0,
            processed_bytes INTEGER NOT NULL DEFAULT 0,
            output_path TEXT,
            output_size INTEGER,
            error TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS compressed_archives (
            resource_id TEXT PRIMARY KEY NOT NULL,
            archive_path TEXT NOT NULL,
            archive_size INTEGER NOT NULL,
            format TEXT NOT NULL,
            compressed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings_kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_setup_creates_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gamedock.db");

        let pool = setup_database(&path).await.unwrap();
        assert!(path.exists());
        create_schema(&pool).await.unwrap();

        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name IN \
             ('queue_entries', 'compression_jobs', 'compressed_archives', 'settings_kv')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        let n: i64 = row.get("n");
        assert_eq!(n, 4);
    }

    #[tokio::test]
    async fn test_queued_rows_require_position() {
        let pool = setup_test_database().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO queue_entries (resource_id, title, status, created_at) \
             VALUES ('1', 't', 'queued', '2024-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
