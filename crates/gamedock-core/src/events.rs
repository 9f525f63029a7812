//! Queue and compression events.
//!
//! Polling the snapshot reads is the primary contract; these events are an
//! additive push channel for consumers that want to react immediately.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::compression::CompressionStatus;
use crate::queue::{EntryId, QueueSnapshot, TransferProgress};

/// Single discriminated union for all queue and compression events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Snapshot of the entire queue state.
    QueueSnapshot {
        /// The snapshot.
        snapshot: QueueSnapshot,
    },

    /// An entry was admitted and its transfer started.
    EntryStarted { id: EntryId, resource_id: String },

    /// Throttled progress for a running transfer.
    EntryProgress {
        id: EntryId,
        #[serde(flatten)]
        progress: TransferProgress,
    },

    /// The transfer is blocked on a second-factor code.
    SecondFactorRequired { id: EntryId },

    /// A second-factor code was delivered to the transfer.
    SecondFactorSubmitted { id: EntryId },

    /// The transfer finished successfully.
    EntryCompleted { id: EntryId },

    /// The transfer failed.
    EntryFailed { id: EntryId, error: String },

    /// The transfer was stopped and the entry kept.
    EntryPaused { id: EntryId },

    /// The entry was canceled.
    EntryCanceled { id: EntryId },

    /// The entry was deleted from the queue.
    EntryRemoved { id: EntryId },

    /// Compression progress for a resource.
    CompressionProgress {
        resource_id: String,
        processed_bytes: u64,
        total_bytes: u64,
        percent: f64,
    },

    /// A compression job reached a terminal status.
    CompressionFinished {
        resource_id: String,
        status: CompressionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl QueueEvent {
    /// Entry this event refers to, if any.
    #[must_use]
    pub const fn entry_id(&self) -> Option<EntryId> {
        match self {
            Self::EntryStarted { id, .. }
            | Self::EntryProgress { id, .. }
            | Self::SecondFactorRequired { id }
            | Self::SecondFactorSubmitted { id }
            | Self::EntryCompleted { id }
            | Self::EntryFailed { id, .. }
            | Self::EntryPaused { id }
            | Self::EntryCanceled { id }
            | Self::EntryRemoved { id } => Some(*id),
            Self::QueueSnapshot { .. }
            | Self::CompressionProgress { .. }
            | Self::CompressionFinished { .. } => None,
        }
    }
}

/// Port for emitting queue events.
///
/// Implementations must not block; the scheduler calls this while holding
/// no locks but on hot paths.
pub trait QueueEventEmitter: Send + Sync {
    /// Emit an event.
    fn emit(&self, event: QueueEvent);
}

/// Discards all events. Used by tests and one-shot CLI commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl QueueEventEmitter for NoopEmitter {
    fn emit(&self, _event: QueueEvent) {}
}

/// Fans events out to any number of subscribers over a broadcast channel.
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// the sender.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: broadcast::Sender<QueueEvent>,
}

impl ChannelEmitter {
    /// Create an emitter with room for `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }
}

impl QueueEventEmitter for ChannelEmitter {
    fn emit(&self, event: QueueEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!(target: "gamedock.queue", "event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn event_tag_is_snake_case() {
        let json = serde_json::to_value(QueueEvent::EntryFailed {
            id: EntryId::new(4),
            error: "Rate limited".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "entry_failed");
        assert_eq!(json["id"], 4);
    }

    #[test]
    fn progress_is_flattened() {
        let json = serde_json::to_value(QueueEvent::EntryProgress {
            id: EntryId::new(1),
            progress: TransferProgress {
                percent: 12.5,
                bytes_downloaded: 10,
                bytes_total: Some(80),
                rate_bps: None,
                eta_seconds: None,
            },
        })
        .unwrap();
        assert_eq!(json["percent"], 12.5);
        assert_eq!(json["bytes_total"], 80);
    }

    #[test]
    fn noop_emitter_accepts_events() {
        let emitter: Arc<dyn QueueEventEmitter> = Arc::new(NoopEmitter);
        emitter.emit(QueueEvent::EntryCompleted { id: EntryId::new(1) });
    }

    #[tokio::test]
    async fn channel_emitter_delivers_to_subscribers() {
        let emitter = ChannelEmitter::new(8);
        let mut rx = emitter.subscribe();
        emitter.emit(QueueEvent::EntryPaused { id: EntryId::new(2) });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.entry_id(), Some(EntryId::new(2)));
    }

    #[test]
    fn channel_emitter_without_subscribers_does_not_fail() {
        let emitter = ChannelEmitter::new(1);
        emitter.emit(QueueEvent::EntryRemoved { id: EntryId::new(9) });
    }
}
