//! Transfer callbacks.
//!
//! Every terminal callback is a CAS from `active`. A callback that loses to
//! a user action (pause, cancel) is stale and only logged.

use async_trait::async_trait;
use gamedock_core::{
    EntryId, EntryStatus, QueueEntry, QueueEvent, RepositoryError, TransferFailure,
    TransferProgress, Transition,
};

use super::QueueScheduler;
use crate::transfer::TransferObserver;

impl QueueScheduler {
    async fn finish_active(&self, id: EntryId, transition: Transition) -> Option<QueueEntry> {
        let action = transition.action();
        match self
            .queue
            .transition(id, &[EntryStatus::Active], transition)
            .await
        {
            Ok(entry) => Some(entry),
            Err(RepositoryError::Conflict(_) | RepositoryError::NotFound(_)) => {
                tracing::debug!(target: "gamedock.queue", entry_id = %id, action, "Stale transfer callback ignored");
                None
            }
            Err(e) => {
                tracing::warn!(target: "gamedock.queue", entry_id = %id, action, error = %e, "Failed to record transfer outcome");
                None
            }
        }
    }

    async fn auto_compress(&self, entry: &QueueEntry) {
        let Some(compression) = &self.compression else {
            return;
        };
        let settings = self.current_settings().await;
        if !settings.effective_auto_compress() {
            return;
        }
        let started = compression
            .compress(
                &entry.resource_id,
                settings.effective_compression_format(),
                settings.effective_compression_level(),
            )
            .await;
        tracing::debug!(target: "gamedock.queue", entry_id = %entry.id, started, "Auto-compress requested");
    }
}

#[async_trait]
impl TransferObserver for QueueScheduler {
    async fn on_progress(&self, id: EntryId, progress: TransferProgress) {
        match self.queue.update_progress(id, &progress).await {
            Ok(true) => self.emitter.emit(QueueEvent::EntryProgress { id, progress }),
            Ok(false) => {
                tracing::debug!(target: "gamedock.queue", entry_id = %id, "Progress for inactive entry dropped");
            }
            Err(e) => {
                tracing::warn!(target: "gamedock.queue", entry_id = %id, error = %e, "Failed to store progress");
            }
        }
    }

    async fn on_second_factor(&self, id: EntryId) {
        match self.queue.set_second_factor_pending(id, true).await {
            Ok(true) => self.emitter.emit(QueueEvent::SecondFactorRequired { id }),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(target: "gamedock.queue", entry_id = %id, error = %e, "Failed to flag second-factor prompt");
            }
        }
    }

    async fn on_complete(&self, id: EntryId) {
        if let Some(entry) = self.finish_active(id, Transition::Complete).await {
            tracing::info!(target: "gamedock.queue", entry_id = %id, resource_id = %entry.resource_id, "Download completed");
            self.emitter.emit(QueueEvent::EntryCompleted { id });
            self.auto_compress(&entry).await;
        }
        self.after_change().await;
    }

    async fn on_error(&self, id: EntryId, failure: TransferFailure) {
        let message = failure.to_string();
        if self
            .finish_active(id, Transition::Fail { message: message.clone() })
            .await
            .is_some()
        {
            tracing::warn!(target: "gamedock.queue", entry_id = %id, error = %message, "Download failed");
            self.emitter.emit(QueueEvent::EntryFailed { id, error: message });
        }
        self.after_change().await;
    }
}
