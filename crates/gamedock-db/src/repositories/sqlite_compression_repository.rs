//! `SQLite` implementation of the `CompressionRepository` trait.

use async_trait::async_trait;
use sqlx::SqlitePool;

use gamedock_core::{CompressedArchive, CompressionJob, CompressionRepository, RepositoryError};

use super::row_mappers::{format_datetime, row_to_archive, row_to_job, storage};

/// Persists compression job snapshots and archive records.
pub struct SqliteCompressionRepository {
    pool: SqlitePool,
}

impl SqliteCompressionRepository {
    /// Create a new `SQLite` compression repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompressionRepository for SqliteCompressionRepository {
    #[allow(clippy::cast_possible_wrap)]
    async fn save_job(&self, job: &CompressionJob) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO compression_jobs (
                resource_id, status, format, level, progress_percent, total_bytes,
                processed_bytes, output_path, output_size, error, start_time, end_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.resource_id)
        .bind(job.status.as_str())
        .bind(job.format.as_str())
        .bind(i64::from(job.level))
        .bind(job.progress_percent)
        .bind(job.total_bytes as i64)
        .bind(job.processed_bytes as i64)
        .bind(&job.output_path)
        .bind(job.output_size.map(|v| v as i64))
        .bind(&job.error)
        .bind(format_datetime(job.start_time))
        .bind(job.end_time.map(format_datetime))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn load_jobs(&self) -> Result<Vec<CompressionJob>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT resource_id, status, format, level, progress_percent, total_bytes,
                   processed_bytes, output_path, output_size, error, start_time, end_time
            FROM compression_jobs
            ORDER BY start_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_job).collect()
    }

    #[allow(clippy::cast_possible_wrap)]
    async fn mark_compressed(&self, archive: &CompressedArchive) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO compressed_archives (
                resource_id, archive_path, archive_size, format, compressed_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&archive.resource_id)
        .bind(&archive.archive_path)
        .bind(archive.archive_size as i64)
        .bind(archive.format.as_str())
        .bind(format_datetime(archive.compressed_at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        tracing::debug!(
            target: "gamedock.compression",
            resource_id = %archive.resource_id,
            "archive recorded"
        );
        Ok(())
    }

    async fn get_archive(
        &self,
        resource_id: &str,
    ) -> Result<Option<CompressedArchive>, RepositoryError> {
        let row = sqlx::query(
            "SELECT resource_id, archive_path, archive_size, format, compressed_at \
             FROM compressed_archives WHERE resource_id = ?",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(row_to_archive).transpose()
    }
}
