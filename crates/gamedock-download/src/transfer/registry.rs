//! Registry of in-flight transfers.
//!
//! Entries are inserted on start and removed either by the terminal path
//! (lease-checked) or by an explicit cancel. Nothing is garbage collected
//! implicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use gamedock_core::EntryId;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Lease for one execution of a transfer.
///
/// Prevents a stale drive task from finalizing an entry that was cancelled
/// or restarted while it was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(u64);

/// State for an active transfer.
struct ActiveTransfer {
    lease: LeaseId,
    cancel: CancellationToken,
    /// Process kill switch, attached once the backend has spawned.
    kill: Option<CancellationToken>,
    /// Process stdin, attached once the backend has spawned.
    input: Option<mpsc::Sender<String>>,
    awaiting_second_factor: bool,
}

impl ActiveTransfer {
    fn stop(&self) {
        self.cancel.cancel();
        if let Some(kill) = &self.kill {
            kill.cancel();
        }
    }
}

/// Concurrency-safe map from entry id to the handles of its transfer.
#[derive(Default)]
pub struct JobRegistry {
    active: Mutex<HashMap<EntryId, ActiveTransfer>>,
    lease_counter: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution. An existing registration for the same id
    /// is stopped and replaced.
    pub async fn register(&self, id: EntryId) -> (LeaseId, CancellationToken) {
        let lease = LeaseId(self.lease_counter.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let replaced = self.active.lock().await.insert(
            id,
            ActiveTransfer {
                lease,
                cancel: cancel.clone(),
                kill: None,
                input: None,
                awaiting_second_factor: false,
            },
        );
        if let Some(old) = replaced {
            tracing::warn!(target: "gamedock.transfer", entry_id = %id, "Replacing running transfer");
            old.stop();
        }
        (lease, cancel)
    }

    /// Attach process handles. Returns false if the lease is stale.
    pub async fn attach(
        &self,
        id: EntryId,
        lease: LeaseId,
        input: mpsc::Sender<String>,
        kill: CancellationToken,
    ) -> bool {
        let mut active = self.active.lock().await;
        match active.get_mut(&id) {
            Some(job) if job.lease == lease => {
                job.input = Some(input);
                job.kill = Some(kill);
                true
            }
            _ => false,
        }
    }

    /// Mark the transfer as blocked on a code. Returns true only when the
    /// flag was newly set.
    pub async fn set_awaiting(&self, id: EntryId, lease: LeaseId) -> bool {
        let mut active = self.active.lock().await;
        match active.get_mut(&id) {
            Some(job) if job.lease == lease && !job.awaiting_second_factor => {
                job.awaiting_second_factor = true;
                true
            }
            _ => false,
        }
    }

    /// Forward a code to a transfer that is waiting for one.
    pub async fn signal(&self, id: EntryId, code: &str) -> bool {
        let input = {
            let mut active = self.active.lock().await;
            let Some(job) = active.get_mut(&id) else {
                return false;
            };
            if !job.awaiting_second_factor {
                return false;
            }
            let Some(input) = job.input.clone() else {
                return false;
            };
            job.awaiting_second_factor = false;
            input
        };
        input.send(code.to_string()).await.is_ok()
    }

    /// Remove and stop a transfer. Returns whether one was registered.
    pub async fn cancel(&self, id: EntryId) -> bool {
        let removed = self.active.lock().await.remove(&id);
        removed.is_some_and(|job| {
            job.stop();
            true
        })
    }

    /// Verify lease matches and remove from the active map.
    pub async fn release(&self, id: EntryId, lease: LeaseId) -> bool {
        let mut active = self.active.lock().await;
        active
            .get(&id)
            .is_some_and(|job| job.lease == lease)
            .then(|| active.remove(&id))
            .is_some()
    }

    /// Whether a transfer is registered for this entry.
    pub async fn contains(&self, id: EntryId) -> bool {
        self.active.lock().await.contains_key(&id)
    }

    /// Ids of every registered transfer.
    pub async fn ids(&self) -> Vec<EntryId> {
        self.active.lock().await.keys().copied().collect()
    }

    /// Stop every registered transfer without awaiting.
    ///
    /// Usable from shutdown hooks where the lock cannot be awaited.
    pub fn cancel_all(&self) -> usize {
        self.active.try_lock().map_or_else(
            |_| {
                tracing::warn!(target: "gamedock.transfer", "Shutdown: registry busy, transfers left running");
                0
            },
            |active| {
                for job in active.values() {
                    job.stop();
                }
                active.len()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_equality() {
        assert_eq!(LeaseId(1), LeaseId(1));
        assert_ne!(LeaseId(1), LeaseId(2));
    }

    #[tokio::test]
    async fn release_requires_current_lease() {
        let registry = JobRegistry::new();
        let id = EntryId::new(1);
        let (old, old_cancel) = registry.register(id).await;
        let (new, _) = registry.register(id).await;

        assert!(old_cancel.is_cancelled());
        assert!(!registry.release(id, old).await);
        assert!(registry.release(id, new).await);
        assert!(!registry.contains(id).await);
    }

    #[tokio::test]
    async fn cancel_stops_process_and_removes() {
        let registry = JobRegistry::new();
        let id = EntryId::new(2);
        let (lease, cancel) = registry.register(id).await;
        let kill = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);
        assert!(registry.attach(id, lease, tx, kill.clone()).await);

        assert!(registry.cancel(id).await);
        assert!(cancel.is_cancelled());
        assert!(kill.is_cancelled());
        assert!(!registry.cancel(id).await);
        assert!(!registry.release(id, lease).await);
    }

    #[tokio::test]
    async fn signal_only_when_awaiting() {
        let registry = JobRegistry::new();
        let id = EntryId::new(3);
        let (lease, _) = registry.register(id).await;
        let (tx, mut rx) = mpsc::channel(1);
        registry.attach(id, lease, tx, CancellationToken::new()).await;

        assert!(!registry.signal(id, "11111").await);
        assert!(registry.set_awaiting(id, lease).await);
        assert!(!registry.set_awaiting(id, lease).await);
        assert!(registry.signal(id, "12345").await);
        assert_eq!(rx.recv().await.as_deref(), Some("12345"));
        assert!(!registry.signal(id, "12345").await);
    }

    #[tokio::test]
    async fn cancel_all_counts_registrations() {
        let registry = JobRegistry::new();
        let (_, a) = registry.register(EntryId::new(1)).await;
        let (_, b) = registry.register(EntryId::new(2)).await;
        assert_eq!(registry.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
