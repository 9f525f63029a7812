//! Settings domain types and validation.
//!
//! Pure domain types with no infrastructure dependencies. The scheduler reads
//! these fresh on every admission pass, so nothing here is cached.

use serde::{Deserialize, Serialize};

use crate::compression::CompressionFormat;

/// Default number of simultaneous transfers.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: u32 = 1;

/// Upper bound accepted for `max_concurrent_downloads`.
pub const MAX_CONCURRENT_DOWNLOADS_LIMIT: u32 = 16;

/// Default compression level (0 = store, 9 = smallest).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Application settings structure.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of active transfers (1-16).
    pub max_concurrent_downloads: Option<u32>,

    /// Archive format used by compression when none is given.
    pub compression_format: Option<CompressionFormat>,

    /// Compression level used when none is given (0-9).
    pub compression_level: Option<u32>,

    /// Archive each download automatically once it completes.
    pub auto_compress: Option<bool>,

    /// Directory games are installed into.
    pub library_dir: Option<String>,

    /// Directory archives are written to.
    pub archive_dir: Option<String>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            max_concurrent_downloads: Some(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            compression_format: Some(CompressionFormat::Zip),
            compression_level: Some(DEFAULT_COMPRESSION_LEVEL),
            auto_compress: Some(false),
            library_dir: None,
            archive_dir: None,
        }
    }

    /// Get the effective concurrency limit, never below one.
    #[must_use]
    pub fn effective_max_concurrent_downloads(&self) -> u32 {
        self.max_concurrent_downloads
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS)
            .max(1)
    }

    /// Get the effective compression format.
    #[must_use]
    pub fn effective_compression_format(&self) -> CompressionFormat {
        self.compression_format.unwrap_or_default()
    }

    /// Get the effective compression level, clamped to 0-9.
    #[must_use]
    pub fn effective_compression_level(&self) -> u32 {
        self.compression_level
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL)
            .min(9)
    }

    /// Whether completed downloads are archived automatically.
    #[must_use]
    pub fn effective_auto_compress(&self) -> bool {
        self.auto_compress.unwrap_or(false)
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref max) = other.max_concurrent_downloads {
            self.max_concurrent_downloads = *max;
        }
        if let Some(ref format) = other.compression_format {
            self.compression_format = *format;
        }
        if let Some(ref level) = other.compression_level {
            self.compression_level = *level;
        }
        if let Some(ref auto) = other.auto_compress {
            self.auto_compress = *auto;
        }
        if let Some(ref dir) = other.library_dir {
            self.library_dir.clone_from(dir);
        }
        if let Some(ref dir) = other.archive_dir {
            self.archive_dir.clone_from(dir);
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = reset field to its default
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub max_concurrent_downloads: Option<Option<u32>>,
    pub compression_format: Option<Option<CompressionFormat>>,
    pub compression_level: Option<Option<u32>>,
    pub auto_compress: Option<Option<bool>>,
    pub library_dir: Option<Option<String>>,
    pub archive_dir: Option<Option<String>>,
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Max concurrent downloads must be between 1 and 16, got {0}")]
    InvalidConcurrency(u32),

    #[error("Compression level must be between 0 and 9, got {0}")]
    InvalidCompressionLevel(u32),

    #[error("{0} cannot be empty")]
    EmptyPath(&'static str),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(max) = settings.max_concurrent_downloads {
        if !(1..=MAX_CONCURRENT_DOWNLOADS_LIMIT).contains(&max) {
            return Err(SettingsError::InvalidConcurrency(max));
        }
    }

    if let Some(level) = settings.compression_level {
        if level > 9 {
            return Err(SettingsError::InvalidCompressionLevel(level));
        }
    }

    if settings
        .library_dir
        .as_ref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(SettingsError::EmptyPath("Library directory"));
    }
    if settings
        .archive_dir
        .as_ref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(SettingsError::EmptyPath("Archive directory"));
    }

    Ok(())
}
