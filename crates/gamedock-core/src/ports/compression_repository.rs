//! Compression history port.

use async_trait::async_trait;

use super::RepositoryError;
use crate::compression::{CompressedArchive, CompressionJob};

/// Persists compression job snapshots and finished-archive records.
///
/// Job snapshots are written on status changes, not on every progress tick.
#[async_trait]
pub trait CompressionRepository: Send + Sync {
    /// Insert or replace the snapshot for `job.resource_id`.
    async fn save_job(&self, job: &CompressionJob) -> Result<(), RepositoryError>;

    /// All stored job snapshots.
    async fn load_jobs(&self) -> Result<Vec<CompressionJob>, RepositoryError>;

    /// Record that a resource now has an archive.
    async fn mark_compressed(&self, archive: &CompressedArchive) -> Result<(), RepositoryError>;

    /// The archive record for a resource, if one exists.
    async fn get_archive(
        &self,
        resource_id: &str,
    ) -> Result<Option<CompressedArchive>, RepositoryError>;
}
