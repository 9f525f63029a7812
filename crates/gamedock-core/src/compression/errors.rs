use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a compression could not start or did not finish.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionError {
    /// The install directory does not exist.
    #[error("Source directory not found: {path}")]
    SourceMissing {
        /// The missing directory.
        path: String,
    },

    /// A non-terminal job already exists for this resource.
    #[error("Compression already in progress for {resource_id}")]
    AlreadyInProgress {
        /// The contested resource key.
        resource_id: String,
    },

    /// The install directory belongs to a download that has not completed.
    #[error("{resource_id} has an unfinished download")]
    SourceBusy {
        /// The contested resource key.
        resource_id: String,
    },

    /// The queue lookup guarding the source failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message.
        message: String,
    },

    /// I/O error while walking the source or writing the archive.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error.
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The archive library rejected an entry.
    #[error("Archive error: {message}")]
    Archive {
        /// Detailed error message.
        message: String,
    },
}

impl CompressionError {
    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create an archive error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}
