//! Compression job domain model.
//!
//! Jobs are keyed by resource id, not by a numeric id: there is at most one
//! non-terminal job per resource at any time.

mod errors;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use errors::CompressionError;

/// Archive container format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionFormat {
    /// Deflate-compressed zip.
    #[default]
    Zip,
    /// Gzip-compressed tarball.
    TarGz,
}

impl CompressionFormat {
    /// File extension, without the leading dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    /// Storage string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar_gz",
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "tar_gz" | "tar.gz" | "targz" | "tgz" => Ok(Self::TarGz),
            other => Err(format!("unknown compression format '{other}'")),
        }
    }
}

/// Status of a compression job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStatus {
    /// Created; the source tree is being measured.
    Pending,
    /// Archive entries are being written.
    Compressing,
    /// Output closed and flushed.
    Completed,
    /// Stopped with an error; any partial output is left on disk.
    Failed,
}

impl CompressionStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Storage string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compressing => "compressing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from storage string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "compressing" => Some(Self::Compressing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One archival job for one resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressionJob {
    pub resource_id: String,
    pub status: CompressionStatus,
    pub format: CompressionFormat,
    pub level: u32,
    /// 0-99 while writing; 100 only after the output is closed.
    pub progress_percent: f64,
    pub total_bytes: u64,
    pub processed_bytes: u64,
    pub output_path: Option<String>,
    pub output_size: Option<u64>,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl CompressionJob {
    /// A fresh pending job.
    pub fn pending(resource_id: impl Into<String>, format: CompressionFormat, level: u32) -> Self {
        Self {
            resource_id: resource_id.into(),
            status: CompressionStatus::Pending,
            format,
            level,
            progress_percent: 0.0,
            total_bytes: 0,
            processed_bytes: 0,
            output_path: None,
            output_size: None,
            error: None,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Record bytes written so far. Percent stays below 100 until [`Self::complete`].
    pub fn advance(&mut self, processed_bytes: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.processed_bytes = processed_bytes;
        let percent = if self.total_bytes == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = processed_bytes as f64 / self.total_bytes as f64;
            ratio * 100.0
        };
        self.progress_percent = percent.max(self.progress_percent).min(99.0);
    }

    /// Mark the job completed with the final archive size.
    pub fn complete(&mut self, output_size: u64) {
        self.status = CompressionStatus::Completed;
        self.progress_percent = 100.0;
        self.processed_bytes = self.total_bytes;
        self.output_size = Some(output_size);
        self.end_time = Some(Utc::now());
    }

    /// Mark the job failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = CompressionStatus::Failed;
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
    }
}

/// Record of a finished archive, kept by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedArchive {
    pub resource_id: String,
    pub archive_path: String,
    pub archive_size: u64,
    pub format: CompressionFormat,
    pub compressed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_aliases() {
        assert_eq!("zip".parse::<CompressionFormat>(), Ok(CompressionFormat::Zip));
        assert_eq!("TGZ".parse::<CompressionFormat>(), Ok(CompressionFormat::TarGz));
        assert_eq!("tar.gz".parse::<CompressionFormat>(), Ok(CompressionFormat::TarGz));
        assert!("rar".parse::<CompressionFormat>().is_err());
        assert_eq!(CompressionFormat::TarGz.extension(), "tar.gz");
    }

    #[test]
    fn advance_caps_at_99_until_complete() {
        let mut job = CompressionJob::pending("10", CompressionFormat::Zip, 6);
        job.total_bytes = 200;
        job.advance(100);
        assert!((job.progress_percent - 50.0).abs() < f64::EPSILON);
        job.advance(200);
        assert!((job.progress_percent - 99.0).abs() < f64::EPSILON);
        job.complete(150);
        assert!((job.progress_percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(job.output_size, Some(150));
        assert!(job.status.is_terminal());
    }

    #[test]
    fn advance_on_empty_tree_stays_at_zero() {
        let mut job = CompressionJob::pending("10", CompressionFormat::TarGz, 0);
        job.advance(0);
        assert!(job.progress_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn status_parse_round_trip() {
        for status in [
            CompressionStatus::Pending,
            CompressionStatus::Compressing,
            CompressionStatus::Completed,
            CompressionStatus::Failed,
        ] {
            assert_eq!(CompressionStatus::parse(status.as_str()), Some(status));
        }
    }
}
