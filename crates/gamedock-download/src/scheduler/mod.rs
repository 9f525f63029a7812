//! Queue scheduler.
//!
//! Owns every queue mutation that can change the active set. Admission is
//! a critical section guarded by one mutex; all other writes are
//! compare-and-set transitions in the store, so stale transfer callbacks
//! lose races against user actions instead of overwriting them.

mod admission;
mod callbacks;

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use gamedock_core::{
    Credentials, EntryId, EntryStatus, MetadataError, MetadataResolver, NewQueueEntry, QueueEntry,
    QueueError, QueueEvent, QueueEventEmitter, QueueRepository, QueueResult, QueueSnapshot,
    RepositoryError, ResourceMetadata, Settings, SettingsRepository, Transition,
};
use tokio::sync::Mutex;

use crate::compression::CompressionRunner;
use crate::layout::LibraryLayout;
use crate::transfer::{CONNECTIVITY_TIMEOUT, TransferRunner};

/// Dependencies for [`build_scheduler`].
pub struct SchedulerDeps {
    /// Job store.
    pub queue: Arc<dyn QueueRepository>,
    /// Read fresh on every admission pass.
    pub settings: Arc<dyn SettingsRepository>,
    pub runner: Arc<TransferRunner>,
    pub layout: LibraryLayout,
    /// `None` runs transfers anonymously.
    pub credentials: Option<Credentials>,
    pub emitter: Arc<dyn QueueEventEmitter>,
    /// Used by [`QueueScheduler::enqueue_resolved`].
    pub metadata: Option<Arc<dyn MetadataResolver>>,
    /// Target for auto-compress on completion.
    pub compression: Option<Arc<CompressionRunner>>,
    /// Admit entries and start transfers in this process. A process that
    /// only edits the queue leaves admission to the one that runs it.
    pub run_transfers: bool,
}

/// Build a scheduler from its dependencies.
pub fn build_scheduler(deps: SchedulerDeps) -> Arc<QueueScheduler> {
    Arc::new_cyclic(|this| QueueScheduler {
        this: this.clone(),
        queue: deps.queue,
        settings: deps.settings,
        runner: deps.runner,
        layout: deps.layout,
        credentials: deps.credentials,
        emitter: deps.emitter,
        metadata: deps.metadata,
        compression: deps.compression,
        run_transfers: deps.run_transfers,
        admission: Mutex::new(()),
        held_for_compression: Mutex::new(HashSet::new()),
    })
}

/// Admits queued entries under the concurrency limit and applies user
/// actions to the queue.
pub struct QueueScheduler {
    /// Handed to the transfer runner as the callback target.
    this: Weak<Self>,
    queue: Arc<dyn QueueRepository>,
    settings: Arc<dyn SettingsRepository>,
    runner: Arc<TransferRunner>,
    layout: LibraryLayout,
    credentials: Option<Credentials>,
    emitter: Arc<dyn QueueEventEmitter>,
    metadata: Option<Arc<dyn MetadataResolver>>,
    compression: Option<Arc<CompressionRunner>>,
    run_transfers: bool,
    /// Serializes count-then-admit, and stop-then-transition.
    admission: Mutex<()>,
    /// Resources with a queued entry held back until their archive is done.
    held_for_compression: Mutex<HashSet<String>>,
}

impl QueueScheduler {
    /// Add a resource to the back of the queue.
    pub async fn enqueue(
        &self,
        resource_id: &str,
        metadata: ResourceMetadata,
    ) -> QueueResult<QueueEntry> {
        let resource_id = resource_id.trim();
        if resource_id.is_empty() {
            return Err(QueueError::invalid_input("resource id is empty"));
        }
        if self.is_compressing(resource_id).await {
            return Err(QueueError::busy(resource_id));
        }

        let entry = match self
            .queue
            .insert(&NewQueueEntry::new(resource_id, metadata))
            .await
        {
            Ok(entry) => entry,
            Err(RepositoryError::AlreadyExists(_)) => {
                return Err(QueueError::duplicate(resource_id));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            target: "gamedock.queue",
            entry_id = %entry.id,
            resource_id,
            position = ?entry.queue_position,
            "Enqueued"
        );

        self.after_change().await;
        self.get(entry.id).await
    }

    /// Enqueue with metadata from the configured resolver.
    ///
    /// An unreachable catalog falls back to the bare id as title; an
    /// unknown id is rejected.
    pub async fn enqueue_resolved(&self, resource_id: &str) -> QueueResult<QueueEntry> {
        let resource_id = resource_id.trim();
        let metadata = match &self.metadata {
            None => ResourceMetadata::titled(resource_id),
            Some(resolver) => match resolver.resolve(resource_id).await {
                Ok(metadata) => metadata,
                Err(e @ MetadataError::NotFound { .. }) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(target: "gamedock.queue", resource_id, error = %e, "Metadata lookup failed, using id as title");
                    ResourceMetadata::titled(resource_id)
                }
            },
        };
        self.enqueue(resource_id, metadata).await
    }

    /// Stop an active transfer but keep the entry.
    pub async fn pause(&self, id: EntryId) -> QueueResult<QueueEntry> {
        let entry = {
            let _admission = self.admission.lock().await;
            let current = self.get(id).await?;
            if current.status != EntryStatus::Active {
                return Err(QueueError::invalid_transition(id, current.status, "pause"));
            }
            self.runner.cancel(id).await;
            self.apply(id, &[EntryStatus::Active], Transition::Pause)
                .await?
        };
        tracing::info!(target: "gamedock.queue", entry_id = %id, "Paused");
        self.emitter.emit(QueueEvent::EntryPaused { id });
        self.after_change().await;
        Ok(entry)
    }

    /// Put a paused or failed entry back at the end of the queue.
    pub async fn resume(&self, id: EntryId) -> QueueResult<QueueEntry> {
        let entry = match self
            .queue
            .transition(id, &[EntryStatus::Paused, EntryStatus::Failed], Transition::Requeue)
            .await
        {
            Ok(entry) => entry,
            Err(RepositoryError::AlreadyExists(_)) => {
                // Another open entry claimed the resource meanwhile.
                let resource_id = self.get(id).await?.resource_id;
                return Err(QueueError::duplicate(resource_id));
            }
            Err(e) => return Err(self.reject(id, "resume", e).await),
        };
        tracing::info!(target: "gamedock.queue", entry_id = %id, position = ?entry.queue_position, "Resumed");
        self.after_change().await;
        self.get(id).await
    }

    /// Cancel a queued, active, or paused entry. The transfer is stopped
    /// before the status changes.
    pub async fn cancel(&self, id: EntryId) -> QueueResult<QueueEntry> {
        let entry = {
            let _admission = self.admission.lock().await;
            let current = self.get(id).await?;
            if current.status.is_terminal() {
                return Err(QueueError::invalid_transition(id, current.status, "cancel"));
            }
            if current.status == EntryStatus::Active {
                self.runner.cancel(id).await;
            }
            self.apply(id, &EntryStatus::OPEN, Transition::Cancel).await?
        };
        tracing::info!(target: "gamedock.queue", entry_id = %id, "Canceled");
        self.emitter.emit(QueueEvent::EntryCanceled { id });
        self.after_change().await;
        Ok(entry)
    }

    /// Delete an entry, cancelling it first if it is still open.
    pub async fn remove(&self, id: EntryId) -> QueueResult<()> {
        {
            let _admission = self.admission.lock().await;
            let current = self.get(id).await?;
            if !current.status.is_terminal() {
                if current.status == EntryStatus::Active {
                    self.runner.cancel(id).await;
                }
                self.apply(id, &EntryStatus::OPEN, Transition::Cancel).await?;
            }
            if let Err(e) = self.queue.delete(id, &EntryStatus::TERMINAL).await {
                return Err(self.reject(id, "remove", e).await);
            }
        }
        tracing::info!(target: "gamedock.queue", entry_id = %id, "Removed");
        self.emitter.emit(QueueEvent::EntryRemoved { id });
        self.after_change().await;
        Ok(())
    }

    /// Reorder queued entries. Unknown or non-queued ids are ignored.
    /// Returns how many listed ids were applied.
    pub async fn reorder(&self, order: &[EntryId]) -> QueueResult<u32> {
        let applied = self.queue.reorder(order).await?;
        tracing::debug!(target: "gamedock.queue", requested = order.len(), applied, "Reordered queue");
        self.after_change().await;
        Ok(applied)
    }

    /// Forward a second-factor code to a transfer waiting for one.
    pub async fn submit_second_factor(&self, id: EntryId, code: &str) -> QueueResult<bool> {
        if code.trim().is_empty() {
            return Err(QueueError::invalid_input("second-factor code is empty"));
        }
        if !self.runner.signal_second_factor(id, code).await {
            return Ok(false);
        }
        if let Err(e) = self.queue.set_second_factor_pending(id, false).await {
            tracing::warn!(target: "gamedock.queue", entry_id = %id, error = %e, "Failed to clear second-factor flag");
        }
        self.emitter.emit(QueueEvent::SecondFactorSubmitted { id });
        Ok(true)
    }

    pub async fn get(&self, id: EntryId) -> QueueResult<QueueEntry> {
        match self.queue.get(id).await {
            Ok(entry) => Ok(entry),
            Err(RepositoryError::NotFound(_)) => Err(QueueError::not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Every entry, oldest first.
    pub async fn get_all(&self) -> QueueResult<Vec<QueueEntry>> {
        Ok(self.queue.list().await?)
    }

    pub async fn get_active(&self) -> QueueResult<Vec<QueueEntry>> {
        Ok(self.queue.list_by_status(EntryStatus::Active).await?)
    }

    /// Queued entries in admission order.
    pub async fn get_queued(&self) -> QueueResult<Vec<QueueEntry>> {
        Ok(self.queue.list_by_status(EntryStatus::Queued).await?)
    }

    /// Polling view of the whole queue.
    pub async fn snapshot(&self) -> QueueResult<QueueSnapshot> {
        let entries = self.queue.list().await?;
        let settings = self.current_settings().await;
        Ok(QueueSnapshot::new(
            entries,
            settings.effective_max_concurrent_downloads(),
        ))
    }

    /// Stop every running transfer. Entries stay active in the store and
    /// are requeued by [`Self::recover_on_startup`] on the next start.
    pub fn shutdown(&self) -> usize {
        self.runner.shutdown()
    }

    /// Bounded reachability check against the transfer backend.
    pub async fn check_connectivity(&self) -> bool {
        self.runner.check_connectivity(CONNECTIVITY_TIMEOUT).await
    }

    /// Settings as stored now, defaults on read failure.
    async fn current_settings(&self) -> Settings {
        match self.settings.load().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(target: "gamedock.queue", error = %e, "Failed to load settings, using defaults");
                Settings::default()
            }
        }
    }

    /// CAS transition, with conflicts reported against the current status.
    async fn apply(
        &self,
        id: EntryId,
        expected: &[EntryStatus],
        transition: Transition,
    ) -> QueueResult<QueueEntry> {
        let action = transition.action();
        match self.queue.transition(id, expected, transition).await {
            Ok(entry) => Ok(entry),
            Err(e) => Err(self.reject(id, action, e).await),
        }
    }

    async fn reject(&self, id: EntryId, action: &str, err: RepositoryError) -> QueueError {
        match err {
            RepositoryError::NotFound(_) => QueueError::not_found(id),
            RepositoryError::Conflict(_) => match self.queue.get(id).await {
                Ok(entry) => QueueError::invalid_transition(id, entry.status, action),
                Err(_) => QueueError::not_found(id),
            },
            other => other.into(),
        }
    }

    /// Run an admission pass and publish a snapshot. Failures here never
    /// undo the user action that triggered them.
    async fn is_compressing(&self, resource_id: &str) -> bool {
        match &self.compression {
            Some(compression) => compression.is_busy(resource_id).await,
            None => false,
        }
    }

    async fn after_change(&self) {
        if let Err(e) = self.admission_pass().await {
            tracing::warn!(target: "gamedock.queue", error = %e, "Admission pass failed");
        }
        match self.snapshot().await {
            Ok(snapshot) => self.emitter.emit(QueueEvent::QueueSnapshot { snapshot }),
            Err(e) => tracing::debug!(target: "gamedock.queue", error = %e, "Snapshot unavailable"),
        }
    }
}
