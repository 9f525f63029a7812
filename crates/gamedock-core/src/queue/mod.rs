//! Download queue domain model.
//!
//! The store owns these rows; the scheduler in `gamedock-download` only
//! changes them through [`Transition`]s applied as compare-and-set updates.

mod errors;
mod snapshot;
mod types;

pub use errors::{QueueError, QueueResult};
pub use snapshot::QueueSnapshot;
pub use types::{
    EntryId, EntryStatus, NewQueueEntry, QueueEntry, ResourceMetadata, TransferProgress,
    Transition,
};
