//! Point-in-time view of the queue for polling consumers.

use serde::{Deserialize, Serialize};

use super::types::{EntryStatus, QueueEntry};

/// Snapshot of every queue entry plus the counters a UI needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// All entries: active first, then queued by position, then the rest
    /// newest first.
    pub entries: Vec<QueueEntry>,
    /// Number of active entries.
    pub active_count: usize,
    /// Number of queued entries.
    pub queued_count: usize,
    /// Concurrency limit in effect when the snapshot was taken.
    pub max_concurrent: u32,
}

impl QueueSnapshot {
    /// Build a snapshot, ordering entries for display.
    #[must_use]
    pub fn new(mut entries: Vec<QueueEntry>, max_concurrent: u32) -> Self {
        entries.sort_by(|a, b| {
            rank(a.status)
                .cmp(&rank(b.status))
                .then_with(|| a.queue_position.cmp(&b.queue_position))
                .then_with(|| b.id.cmp(&a.id))
        });
        let active_count = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Active)
            .count();
        let queued_count = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Queued)
            .count();
        Self {
            entries,
            active_count,
            queued_count,
            max_concurrent,
        }
    }

    /// Whether nothing is queued, active, or paused.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_terminal())
    }

    /// Free transfer slots under the current limit.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        (self.max_concurrent as usize).saturating_sub(self.active_count)
    }
}

const fn rank(status: EntryStatus) -> u8 {
    match status {
        EntryStatus::Active => 0,
        EntryStatus::Queued => 1,
        EntryStatus::Paused => 2,
        EntryStatus::Failed => 3,
        EntryStatus::Completed | EntryStatus::Canceled => 4,
    }
}
