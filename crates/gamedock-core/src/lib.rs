//! Core domain types and port definitions for gamedock.
//!
//! This crate holds the data model shared by every adapter: queue entries,
//! compression jobs, settings, events, and the traits (ports) that the
//! download crate expects from storage and metadata collaborators.
//!
//! No SQL, process, or HTTP code lives here.

#![deny(unused_crate_dependencies)]

pub mod compression;
pub mod events;
pub mod paths;
pub mod ports;
pub mod queue;
pub mod settings;
pub mod transfer;

pub use compression::{
    CompressedArchive, CompressionError, CompressionFormat, CompressionJob, CompressionStatus,
};
pub use events::{ChannelEmitter, NoopEmitter, QueueEvent, QueueEventEmitter};
pub use ports::{
    CompressionRepository, MetadataError, MetadataResolver, QueueRepository, Repos,
    RepositoryError, SettingsRepository,
};
pub use queue::{
    EntryId, EntryStatus, NewQueueEntry, QueueEntry, QueueError, QueueResult, QueueSnapshot,
    ResourceMetadata, TransferProgress, Transition,
};
pub use settings::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS_LIMIT,
    Settings, SettingsError, SettingsUpdate, validate_settings,
};
pub use transfer::{Credentials, TransferFailure};

pub use paths::{
    PathError, archive_dir_for, data_root, database_path, default_library_dir,
    resolve_library_dir,
};

