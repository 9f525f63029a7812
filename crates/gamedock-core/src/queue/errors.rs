//! Queue error types.
//!
//! Serializable so adapters (CLI, future HTTP layer) can forward them
//! without depending on storage error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{EntryId, EntryStatus};
use crate::ports::{MetadataError, RepositoryError};

/// Result alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Error type for queue operations.
///
/// Every variant except `Storage` is a validation failure: the queue is
/// left unchanged when it is returned.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueueError {
    /// An open entry already exists for the resource.
    #[error("Resource {resource_id} is already queued or downloading")]
    DuplicateResource {
        /// The contested resource key.
        resource_id: String,
    },

    /// The resource's install directory is being archived.
    #[error("Resource {resource_id} is being compressed")]
    ResourceBusy {
        /// The contested resource key.
        resource_id: String,
    },

    /// No entry with this id.
    #[error("Queue entry {id} not found")]
    NotFound {
        /// The missing entry id.
        id: EntryId,
    },

    /// The requested action is not legal from the entry's current status.
    #[error("Cannot {action} entry {id} while it is {from}")]
    InvalidTransition {
        /// Entry the action targeted.
        id: EntryId,
        /// Status the entry was in.
        from: EntryStatus,
        /// The rejected action.
        action: String,
    },

    /// Malformed request (blank id or code).
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// Metadata lookup failed during a resolved enqueue.
    #[error("Metadata lookup failed: {message}")]
    Metadata {
        /// Detailed error message.
        message: String,
    },

    /// The record store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message.
        message: String,
    },
}

impl QueueError {
    /// Create a duplicate-resource error.
    pub fn duplicate(resource_id: impl Into<String>) -> Self {
        Self::DuplicateResource {
            resource_id: resource_id.into(),
        }
    }

    /// Create a resource-busy error.
    pub fn busy(resource_id: impl Into<String>) -> Self {
        Self::ResourceBusy {
            resource_id: resource_id.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub const fn not_found(id: EntryId) -> Self {
        Self::NotFound { id }
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(id: EntryId, from: EntryStatus, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            id,
            from,
            action: action.into(),
        }
    }

    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the queue was left untouched (bad input rather than a fault).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage { .. })
    }

    /// A sentence suitable for showing to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::DuplicateResource { resource_id } => {
                format!("{resource_id} is already in the download queue.")
            }
            Self::ResourceBusy { resource_id } => {
                format!("{resource_id} is being compressed; try again when the archive is done.")
            }
            Self::NotFound { id } => format!("There is no queue entry #{id}."),
            Self::InvalidTransition { id, from, action } => {
                format!("Entry #{id} is {from}; it cannot {action} right now.")
            }
            Self::InvalidInput { message } => format!("Invalid request: {message}."),
            Self::Metadata { message } => format!("Could not look up the game: {message}"),
            Self::Storage { message } => format!("The queue database reported an error: {message}"),
        }
    }
}

impl From<MetadataError> for QueueError {
    fn from(err: MetadataError) -> Self {
        Self::Metadata {
            message: err.to_string(),
        }
    }
}

/// Map a repository failure that is not already handled by the caller.
impl From<RepositoryError> for QueueError {
    fn from(err: RepositoryError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_is_not_validation() {
        assert!(!QueueError::storage("disk full").is_validation());
        assert!(QueueError::duplicate("440").is_validation());
        assert!(QueueError::not_found(EntryId::new(3)).is_validation());
        assert!(QueueError::busy("440").is_validation());
    }

    #[test]
    fn invalid_transition_message_names_status() {
        let err = QueueError::invalid_transition(EntryId::new(7), EntryStatus::Completed, "pause");
        assert_eq!(err.to_string(), "Cannot pause entry 7 while it is completed");
        assert!(err.user_message().contains("completed"));
    }

    #[test]
    fn metadata_error_converts() {
        let err: QueueError = MetadataError::NotFound {
            resource_id: "1".into(),
        }
        .into();
        assert!(matches!(err, QueueError::Metadata { .. }));
    }
}
