//! Queue repository port: the job store.

use async_trait::async_trait;

use super::RepositoryError;
use crate::queue::{
    EntryId, EntryStatus, NewQueueEntry, QueueEntry, TransferProgress, Transition,
};

/// Durable table of queue entries.
///
/// This is the single source of truth for entry status. Every status change
/// goes through [`QueueRepository::transition`], which is atomic with
/// respect to other calls on the same store.
///
/// Implementations keep `queue_position` dense (1..=n over queued entries)
/// after every operation that adds or removes a queued entry.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert a queued entry at the back of the queue.
    ///
    /// Returns `AlreadyExists` if an open entry (queued, active, paused)
    /// exists for the same resource. Uniqueness is enforced at commit, so
    /// two racing inserts cannot both succeed.
    async fn insert(&self, entry: &NewQueueEntry) -> Result<QueueEntry, RepositoryError>;

    /// Fetch one entry.
    async fn get(&self, id: EntryId) -> Result<QueueEntry, RepositoryError>;

    /// All entries, in id order.
    async fn list(&self) -> Result<Vec<QueueEntry>, RepositoryError>;

    /// Entries with the given status. Queued entries come back in position order.
    async fn list_by_status(&self, status: EntryStatus)
    -> Result<Vec<QueueEntry>, RepositoryError>;

    /// Number of entries with the given status.
    async fn count_by_status(&self, status: EntryStatus) -> Result<u32, RepositoryError>;

    /// The most recently inserted entry for a resource, if any.
    ///
    /// At most one entry per resource is open, and it is always the newest.
    async fn find_latest_by_resource(
        &self,
        resource_id: &str,
    ) -> Result<Option<QueueEntry>, RepositoryError>;

    /// Apply `transition` only if the entry's status is one of `expected`.
    ///
    /// Returns `Conflict` when the status does not match and `NotFound` when
    /// the entry is gone. On success returns the updated entry.
    async fn transition(
        &self,
        id: EntryId,
        expected: &[EntryStatus],
        transition: Transition,
    ) -> Result<QueueEntry, RepositoryError>;

    /// Record transfer progress for an active entry.
    ///
    /// Returns `false` (and writes nothing) if the entry is not active.
    /// Percent never decreases and stays below 100 while active.
    async fn update_progress(
        &self,
        id: EntryId,
        progress: &TransferProgress,
    ) -> Result<bool, RepositoryError>;

    /// Set or clear the second-factor flag on an active entry.
    async fn set_second_factor_pending(
        &self,
        id: EntryId,
        pending: bool,
    ) -> Result<bool, RepositoryError>;

    /// Renumber queued entries so the listed ids come first, in order.
    ///
    /// Ids that are unknown or not queued are ignored. Queued entries not
    /// listed keep their relative order after the listed ones. Returns the
    /// number of listed ids that were applied.
    async fn reorder(&self, order: &[EntryId]) -> Result<u32, RepositoryError>;

    /// Delete an entry whose status is one of `expected`.
    async fn delete(&self, id: EntryId, expected: &[EntryStatus]) -> Result<(), RepositoryError>;
}
