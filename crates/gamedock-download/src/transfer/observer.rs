//! Callbacks from a running transfer.

use async_trait::async_trait;
use gamedock_core::{EntryId, TransferFailure, TransferProgress};

/// Receives throttled progress and exactly one terminal callback per
/// transfer that was not cancelled.
#[async_trait]
pub trait TransferObserver: Send + Sync {
    async fn on_progress(&self, id: EntryId, progress: TransferProgress);

    /// The transfer is blocked on a second-factor code.
    async fn on_second_factor(&self, id: EntryId);

    async fn on_complete(&self, id: EntryId);

    async fn on_error(&self, id: EntryId, failure: TransferFailure);
}
