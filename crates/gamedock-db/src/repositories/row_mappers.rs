//! Row mapping helpers for `SQLite` queries.

use chrono::{DateTime, Utc};
use gamedock_core::{
    CompressedArchive, CompressionFormat, CompressionJob, CompressionStatus, EntryId, EntryStatus,
    QueueEntry, RepositoryError, ResourceMetadata,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Shared SELECT column list for queue entry queries.
pub const ENTRY_SELECT_COLUMNS: &str = "id, resource_id, title, size_hint, image_refs, status, \
     progress_percent, bytes_downloaded, bytes_total, transfer_rate, eta_seconds, queue_position, \
     error_message, awaiting_second_factor, install_dir, created_at, started_at, completed_at";

/// Map a driver error into the storage variant.
pub fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// Format a timestamp for storage.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp.
pub fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Parse a database row into a `QueueEntry`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn row_to_entry(row: &SqliteRow) -> Result<QueueEntry, RepositoryError> {
    let status_str: String = row.try_get("status").map_err(storage)?;
    let status = EntryStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Serialization(format!("unknown status '{status_str}'")))?;

    let image_refs_json: String = row.try_get("image_refs").map_err(storage)?;
    let image_refs: Vec<String> = serde_json::from_str(&image_refs_json)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    let created_at: String = row.try_get("created_at").map_err(storage)?;

    Ok(QueueEntry {
        id: EntryId::new(row.try_get("id").map_err(storage)?),
        resource_id: row.try_get("resource_id").map_err(storage)?,
        metadata: ResourceMetadata {
            title: row.try_get("title").map_err(storage)?,
            size_hint: row
                .try_get::<Option<i64>, _>("size_hint")
                .map_err(storage)?
                .map(|v| v as u64),
            image_refs,
        },
        status,
        progress_percent: row.try_get("progress_percent").map_err(storage)?,
        bytes_downloaded: row.try_get::<i64, _>("bytes_downloaded").map_err(storage)? as u64,
        bytes_total: row
            .try_get::<Option<i64>, _>("bytes_total")
            .map_err(storage)?
            .map(|v| v as u64),
        transfer_rate: row.try_get("transfer_rate").map_err(storage)?,
        eta_seconds: row
            .try_get::<Option<i64>, _>("eta_seconds")
            .map_err(storage)?
            .map(|v| v as u64),
        queue_position: row
            .try_get::<Option<i64>, _>("queue_position")
            .map_err(storage)?
            .map(|v| v as u32),
        error_message: row.try_get("error_message").map_err(storage)?,
        awaiting_second_factor: row.try_get("awaiting_second_factor").map_err(storage)?,
        install_dir: row.try_get("install_dir").map_err(storage)?,
        created_at: parse_datetime(Some(created_at)).unwrap_or_else(Utc::now),
        started_at: parse_datetime(row.try_get("started_at").map_err(storage)?),
        completed_at: parse_datetime(row.try_get("completed_at").map_err(storage)?),
    })
}

/// Parse a database row into a `CompressionJob`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn row_to_job(row: &SqliteRow) -> Result<CompressionJob, RepositoryError> {
    let status_str: String = row.try_get("status").map_err(storage)?;
    let format_str: String = row.try_get("format").map_err(storage)?;
    let start_time: String = row.try_get("start_time").map_err(storage)?;

    Ok(CompressionJob {
        resource_id: row.try_get("resource_id").map_err(storage)?,
        status: CompressionStatus::parse(&status_str).ok_or_else(|| {
            RepositoryError::Serialization(format!("unknown compression status '{status_str}'"))
        })?,
        format: parse_format(&format_str)?,
        level: row.try_get::<i64, _>("level").map_err(storage)? as u32,
        progress_percent: row.try_get("progress_percent").map_err(storage)?,
        total_bytes: row.try_get::<i64, _>("total_bytes").map_err(storage)? as u64,
        processed_bytes: row.try_get::<i64, _>("processed_bytes").map_err(storage)? as u64,
        output_path: row.try_get("output_path").map_err(storage)?,
        output_size: row
            .try_get::<Option<i64>, _>("output_size")
            .map_err(storage)?
            .map(|v| v as u64),
        error: row.try_get("error").map_err(storage)?,
        start_time: parse_datetime(Some(start_time)).unwrap_or_else(Utc::now),
        end_time: parse_datetime(row.try_get("end_time").map_err(storage)?),
    })
}

/// Parse a database row into a `CompressedArchive`.
#[allow(clippy::cast_sign_loss)]
pub fn row_to_archive(row: &SqliteRow) -> Result<CompressedArchive, RepositoryError> {
    let format_str: String = row.try_get("format").map_err(storage)?;
    let compressed_at: String = row.try_get("compressed_at").map_err(storage)?;

    Ok(CompressedArchive {
        resource_id: row.try_get("resource_id").map_err(storage)?,
        archive_path: row.try_get("archive_path").map_err(storage)?,
        archive_size: row.try_get::<i64, _>("archive_size").map_err(storage)? as u64,
        format: parse_format(&format_str)?,
        compressed_at: parse_datetime(Some(compressed_at)).unwrap_or_else(Utc::now),
    })
}

fn parse_format(s: &str) -> Result<CompressionFormat, RepositoryError> {
    s.parse().map_err(RepositoryError::Serialization)
}
