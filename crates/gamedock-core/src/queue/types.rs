//! Queue entry types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier of a queue entry.
///
/// Assigned by the store at insertion time and monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Wrap a raw store id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw store id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a queue entry.
///
/// ```text
/// queued -> active -> completed | failed | canceled
/// active -> paused -> queued
/// failed -> queued
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Waiting for a free transfer slot.
    Queued,
    /// A transfer is running for this entry.
    Active,
    /// Transfer stopped by the user; the entry is kept for a later resume.
    Paused,
    /// Transfer finished successfully.
    Completed,
    /// Transfer finished with an error.
    Failed,
    /// Canceled by the user.
    Canceled,
}

impl EntryStatus {
    /// Statuses that still hold a claim on the resource.
    pub const OPEN: [Self; 3] = [Self::Queued, Self::Active, Self::Paused];

    /// Statuses from which no transition happens without explicit user action.
    pub const TERMINAL: [Self; 3] = [Self::Completed, Self::Failed, Self::Canceled];

    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Whether this status is terminal (completed, failed, canceled).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing a downloadable resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Display title.
    pub title: String,
    /// Expected install size in bytes, if the catalog reports one.
    pub size_hint: Option<u64>,
    /// Image URLs (header art, screenshots).
    #[serde(default)]
    pub image_refs: Vec<String>,
}

impl ResourceMetadata {
    /// Metadata with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Data needed to create a queue entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQueueEntry {
    /// External resource key (catalog/app id).
    pub resource_id: String,
    /// Resource metadata captured at enqueue time.
    pub metadata: ResourceMetadata,
}

impl NewQueueEntry {
    /// Create a new entry request.
    pub fn new(resource_id: impl Into<String>, metadata: ResourceMetadata) -> Self {
        Self {
            resource_id: resource_id.into(),
            metadata,
        }
    }
}

/// Structured progress for a running transfer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Completion percentage (0-100).
    pub percent: f64,
    /// Bytes written so far.
    pub bytes_downloaded: u64,
    /// Total bytes, once the transfer tool reports it.
    pub bytes_total: Option<u64>,
    /// Measured throughput in bytes per second.
    pub rate_bps: Option<f64>,
    /// Estimated seconds remaining.
    pub eta_seconds: Option<u64>,
}

/// One row of the download queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Store-assigned identifier.
    pub id: EntryId,
    /// External resource key.
    pub resource_id: String,
    /// Metadata captured at enqueue time.
    pub metadata: ResourceMetadata,
    /// Current status.
    pub status: EntryStatus,
    /// Completion percentage; 100 only when completed.
    pub progress_percent: f64,
    /// Bytes written so far.
    pub bytes_downloaded: u64,
    /// Total bytes, when known.
    pub bytes_total: Option<u64>,
    /// Last measured throughput in bytes per second.
    pub transfer_rate: Option<f64>,
    /// Last estimated seconds remaining.
    pub eta_seconds: Option<u64>,
    /// Dense 1-based position, present only while queued.
    pub queue_position: Option<u32>,
    /// Failure reason, present only while failed.
    pub error_message: Option<String>,
    /// The running transfer is blocked on a second-factor code.
    pub awaiting_second_factor: bool,
    /// Directory the transfer installs into, set on admission.
    pub install_dir: Option<String>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was last admitted.
    pub started_at: Option<DateTime<Utc>>,
    /// When the entry completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Display title.
    pub fn title(&self) -> &str {
        &self.metadata.title
    }
}

/// A compare-and-set status change applied by the store.
///
/// Each variant names the target status and the field resets that go
/// with it, so callers never write status fields piecemeal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Admit into the active set. Clears position, error, and progress.
    Activate {
        /// Directory the transfer will install into.
        install_dir: String,
    },
    /// Stop the transfer but keep the entry. Clears rate and ETA.
    Pause,
    /// Back of the queue with progress reset to zero.
    Requeue,
    /// Finished successfully. Progress becomes 100.
    Complete,
    /// Finished with an error.
    Fail {
        /// Human-readable failure reason.
        message: String,
    },
    /// Canceled by the user.
    Cancel,
}

impl Transition {
    /// The status an entry ends up in after this transition.
    #[must_use]
    pub const fn target(&self) -> EntryStatus {
        match self {
            Self::Activate { .. } => EntryStatus::Active,
            Self::Pause => EntryStatus::Paused,
            Self::Requeue => EntryStatus::Queued,
            Self::Complete => EntryStatus::Completed,
            Self::Fail { .. } => EntryStatus::Failed,
            Self::Cancel => EntryStatus::Canceled,
        }
    }

    /// Short verb used in logs and errors.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Pause => "pause",
            Self::Requeue => "requeue",
            Self::Complete => "complete",
            Self::Fail { .. } => "fail",
            Self::Cancel => "cancel",
        }
    }
}
