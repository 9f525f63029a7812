//! `SQLite` storage for gamedock.
//!
//! Implements the repository ports from `gamedock-core`: the queue job
//! store, compression history, and settings. `sqlx` types never leave this
//! crate.

#![deny(unsafe_code)]

pub mod factory;
pub mod repositories;
pub mod setup;

pub use factory::StoreFactory;

#[cfg(any(test, feature = "test-utils"))]
pub use factory::TestDb;

pub use repositories::{
    SqliteCompressionRepository, SqliteQueueRepository, SqliteSettingsRepository,
};

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;

