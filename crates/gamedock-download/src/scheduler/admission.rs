//! Admission pass and startup recovery.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use gamedock_core::{EntryId, EntryStatus, QueueEvent, QueueResult, RepositoryError, Transition};

use super::QueueScheduler;
use crate::compression::CompressionRunner;
use crate::transfer::{TransferObserver, TransferRequest};

/// Boxed so the admission pass does not name its own future type.
fn admit_when_idle(
    scheduler: Arc<QueueScheduler>,
    compression: Arc<CompressionRunner>,
    resource_id: String,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        compression.wait_idle(&resource_id).await;
        scheduler.held_for_compression.lock().await.remove(&resource_id);
        scheduler.after_change().await;
    })
}

impl QueueScheduler {
    /// Admit queued entries in position order until the concurrency limit
    /// is reached. Returns how many were admitted.
    ///
    /// Safe to call redundantly: the count and the admissions happen under
    /// one lock, and the limit is re-read from settings every time. A
    /// lowered limit never preempts running transfers.
    pub async fn admission_pass(&self) -> QueueResult<usize> {
        if !self.run_transfers {
            return Ok(0);
        }
        let _admission = self.admission.lock().await;

        let limit = self
            .current_settings()
            .await
            .effective_max_concurrent_downloads();
        let active = self.queue.count_by_status(EntryStatus::Active).await?;
        if active >= limit {
            tracing::debug!(target: "gamedock.queue", active, limit, "No free transfer slots");
            return Ok(0);
        }

        let Some(observer) = self.this.upgrade() else {
            return Ok(0);
        };
        let observer: Arc<dyn TransferObserver> = observer;

        let mut free = limit - active;
        let mut admitted = 0;
        for candidate in self.queue.list_by_status(EntryStatus::Queued).await? {
            if free == 0 {
                break;
            }
            if self.is_compressing(&candidate.resource_id).await {
                tracing::debug!(target: "gamedock.queue", entry_id = %candidate.id, resource_id = %candidate.resource_id, "Install directory is being compressed, holding entry");
                self.hold_for_compression(&candidate.resource_id).await;
                continue;
            }
            let destination = self.layout.install_dir(&candidate.resource_id);
            let activated = self
                .queue
                .transition(
                    candidate.id,
                    &[EntryStatus::Queued],
                    Transition::Activate {
                        install_dir: destination.display().to_string(),
                    },
                )
                .await;
            let entry = match activated {
                Ok(entry) => entry,
                Err(RepositoryError::Conflict(_) | RepositoryError::NotFound(_)) => {
                    tracing::debug!(target: "gamedock.queue", entry_id = %candidate.id, "Candidate changed before admission");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            free -= 1;
            admitted += 1;
            tracing::info!(
                target: "gamedock.queue",
                entry_id = %entry.id,
                resource_id = %entry.resource_id,
                "Admitted"
            );
            self.emitter.emit(QueueEvent::EntryStarted {
                id: entry.id,
                resource_id: entry.resource_id.clone(),
            });
            self.runner
                .start(
                    TransferRequest {
                        entry_id: entry.id,
                        resource_id: entry.resource_id,
                        destination,
                        credentials: self.credentials.clone(),
                    },
                    Arc::clone(&observer),
                )
                .await;
        }

        tracing::debug!(target: "gamedock.queue", active, limit, admitted, "Admission pass finished");
        Ok(admitted)
    }

    /// Run another admission pass once the resource's archive job ends.
    async fn hold_for_compression(&self, resource_id: &str) {
        let (Some(compression), Some(this)) = (&self.compression, self.this.upgrade()) else {
            return;
        };
        if !self
            .held_for_compression
            .lock()
            .await
            .insert(resource_id.to_string())
        {
            return;
        }
        tokio::spawn(admit_when_idle(
            this,
            Arc::clone(compression),
            resource_id.to_string(),
        ));
    }

    /// Requeue entries left active by a previous process, then admit.
    /// Returns how many were requeued.
    ///
    /// A queue-only scheduler recovers nothing: the active entries may
    /// belong to a process that is still running them.
    pub async fn recover_on_startup(&self) -> QueueResult<usize> {
        if !self.run_transfers {
            return Ok(0);
        }
        let mut recovered = 0;
        for entry in self.queue.list_by_status(EntryStatus::Active).await? {
            if self.runner.is_running(entry.id).await {
                continue;
            }
            match self
                .queue
                .transition(entry.id, &[EntryStatus::Active], Transition::Requeue)
                .await
            {
                Ok(_) => recovered += 1,
                Err(e) => {
                    tracing::warn!(target: "gamedock.queue", entry_id = %entry.id, error = %e, "Could not requeue interrupted entry");
                }
            }
        }
        if recovered > 0 {
            tracing::info!(target: "gamedock.queue", recovered, "Requeued interrupted downloads");
        }
        self.after_change().await;
        Ok(recovered)
    }

    /// Stop transfers whose entries were moved out of `active`, or deleted,
    /// by another process sharing the store. Returns how many were stopped.
    pub async fn reconcile_stopped(&self) -> QueueResult<usize> {
        let admission = self.admission.lock().await;
        let active: HashSet<EntryId> = self
            .queue
            .list_by_status(EntryStatus::Active)
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        let mut stopped = 0;
        for id in self.runner.running_ids().await {
            if !active.contains(&id) && self.runner.cancel(id).await {
                tracing::info!(target: "gamedock.queue", entry_id = %id, "Stopped transfer changed elsewhere");
                stopped += 1;
            }
        }
        drop(admission);

        if stopped > 0 {
            self.after_change().await;
        }
        Ok(stopped)
    }
}
