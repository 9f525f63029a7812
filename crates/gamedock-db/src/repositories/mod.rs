//! Repository implementations using `SQLite`.
//!
//! These implementations encapsulate all SQL queries and database access.
//! The `SqlitePool` is confined to this module and never exposed through
//! the port trait signatures.

mod row_mappers;
mod sqlite_compression_repository;
mod sqlite_queue_repository;
mod sqlite_settings_repository;

pub use sqlite_compression_repository::SqliteCompressionRepository;
pub use sqlite_queue_repository::SqliteQueueRepository;
pub use sqlite_settings_repository::SqliteSettingsRepository;
