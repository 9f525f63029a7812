//! CLI-specific error types and mappings.
//!
//! Maps queue, compression, and settings errors to exit codes and
//! user-facing messages.

use gamedock_core::{CompressionError, PathError, QueueError, SettingsError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// The queue rejected the request; the message is already user-facing.
    #[error("{0}")]
    Queue(String),

    /// Compression could not start.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// The transfer tool is missing or offline.
    #[error("Transfer tool error: {0}")]
    Transfer(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Queue(_) | Self::Compression(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Database(_) => 73, // EX_CANTCREAT (closest fit)
            Self::Transfer(_) => 69, // EX_UNAVAILABLE
        }
    }
}

impl From<QueueError> for CliError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Storage { message } => Self::Database(message),
            QueueError::InvalidInput { .. } => Self::Arguments(err.user_message()),
            other => Self::Queue(other.user_message()),
        }
    }
}

impl From<CompressionError> for CliError {
    fn from(err: CompressionError) -> Self {
        match err {
            CompressionError::Storage { message } => Self::Database(message),
            other => Self::Compression(other.to_string()),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Arguments(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamedock_core::{EntryId, EntryStatus};

    #[test]
    fn test_queue_errors_keep_user_message() {
        let err: CliError = QueueError::invalid_transition(
            EntryId::new(4),
            EntryStatus::Completed,
            "pause",
        )
        .into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("#4"));
    }

    #[test]
    fn test_storage_errors_map_to_database() {
        let err: CliError = QueueError::storage("disk full").into();
        assert!(matches!(err, CliError::Database(_)));
        assert_eq!(err.exit_code(), 73);
    }

    #[test]
    fn test_invalid_input_is_usage_error() {
        let err: CliError = QueueError::invalid_input("resource id is empty").into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_settings_error_is_usage_error() {
        let err: CliError = SettingsError::InvalidConcurrency(0).into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("between 1 and 16"));
    }

    #[test]
    fn test_compression_busy_is_general_error() {
        let err: CliError = CompressionError::SourceBusy {
            resource_id: "570".into(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "Compression error: 570 has an unfinished download");
    }
}
