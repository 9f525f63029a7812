//! Download queue orchestration for gamedock.
//!
//! - [`scheduler`]: admits queued entries under the concurrency limit and
//!   applies user actions (pause, resume, cancel, remove, reorder)
//! - [`transfer`]: runs one external transfer per active entry, parses its
//!   output, and tracks live handles in a [`JobRegistry`]
//! - [`compression`]: single-flight archiving of finished installs
//!
//! Storage, settings, and metadata are reached through the ports defined
//! in `gamedock-core`.

pub mod compression;
pub mod layout;
pub mod metadata;
pub mod progress;
pub mod scheduler;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use compression::{
    ArchiveBackend, ArchiveError, CompressionRunner, FsArchiveBackend, dir_size,
};
pub use layout::LibraryLayout;
pub use metadata::{STORE_APP_DETAILS_URL, StoreMetadataResolver, parse_app_details};
pub use progress::{ProgressThrottle, RateEstimator};
pub use scheduler::{QueueScheduler, SchedulerDeps, build_scheduler};
pub use transfer::{
    CONNECTIVITY_TIMEOUT, JobRegistry, STEAMCMD_ENV, SteamCmdBackend, TransferBackend,
    TransferObserver, TransferProcess, TransferRequest, TransferRunner,
};
