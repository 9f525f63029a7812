//! Composition utilities for wiring `SQLite` repositories.
//!
//! Construction only; no domain logic.

use sqlx::SqlitePool;
use std::sync::Arc;

use gamedock_core::Repos;

use crate::repositories::{
    SqliteCompressionRepository, SqliteQueueRepository, SqliteSettingsRepository,
};

/// Factory for creating repository instances with `SQLite` backends.
pub struct StoreFactory;

impl StoreFactory {
    /// Build all `SQLite` repositories from a pool.
    pub fn build_repos(pool: &SqlitePool) -> Repos {
        Repos::new(
            Arc::new(SqliteQueueRepository::new(pool.clone())),
            Arc::new(SqliteCompressionRepository::new(pool.clone())),
            Arc::new(SqliteSettingsRepository::new(pool.clone())),
        )
    }
}

/// In-memory database with the production schema, for tests in any crate.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    /// Create a fresh in-memory database.
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repositories over this database.
    pub fn repos(&self) -> Repos {
        StoreFactory::build_repos(&self.pool)
    }
}
