//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the scheduler and runners expect from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - No process, HTTP, or filesystem details
//! - Status changes are compare-and-set, never blind writes

mod compression_repository;
mod metadata;
mod queue_repository;
mod settings_repository;

use std::sync::Arc;

use thiserror::Error;

pub use compression_repository::CompressionRepository;
pub use metadata::{MetadataError, MetadataResolver};
pub use queue_repository::QueueRepository;
pub use settings_repository::SettingsRepository;

/// Domain-specific errors for repository operations.
///
/// This error type abstracts away storage implementation details (e.g., sqlx errors)
/// and provides a clean interface for services to handle storage failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A compare-and-set found the row in an unexpected state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (e.g., foreign key, check constraint).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Container for all repository trait objects.
///
/// Lets adapters wire storage without depending on `gamedock-db`.
#[derive(Clone)]
pub struct Repos {
    /// Queue entries (the job store).
    pub queue: Arc<dyn QueueRepository>,
    /// Compression job history and archive records.
    pub compression: Arc<dyn CompressionRepository>,
    /// Application settings.
    pub settings: Arc<dyn SettingsRepository>,
}

impl Repos {
    /// Create a new Repos container.
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        compression: Arc<dyn CompressionRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            queue,
            compression,
            settings,
        }
    }
}
