//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - Database pool and repositories (via gamedock-db)
//! - SteamCMD transfer backend and archive backend (via gamedock-download)
//! - Queue scheduler and compression runner (via gamedock-download)
//!
//! Command handlers receive the composed [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use gamedock_core::paths::{archive_dir_for, database_path, resolve_library_dir};
use gamedock_core::{ChannelEmitter, Credentials, MetadataResolver, QueueEventEmitter, Repos};
use gamedock_db::{StoreFactory, setup_database};
use gamedock_download::{
    CompressionRunner, FsArchiveBackend, LibraryLayout, QueueScheduler, SchedulerDeps,
    SteamCmdBackend, StoreMetadataResolver, TransferRunner, build_scheduler,
};

/// Account name for authenticated transfers.
pub const STEAM_USER_ENV: &str = "GAMEDOCK_STEAM_USER";

/// Password for authenticated transfers.
pub const STEAM_PASSWORD_ENV: &str = "GAMEDOCK_STEAM_PASSWORD";

/// Room for undelivered events per subscriber.
const EVENT_CAPACITY: usize = 256;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path to the queue database.
    pub database_path: PathBuf,
    /// Library directory given on the command line.
    pub library_override: Option<String>,
    /// Whether this process admits entries and runs transfers.
    pub run_transfers: bool,
}

impl CliConfig {
    /// Create config with default paths; queue edits only.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            database_path: database_path()?,
            library_override: None,
            run_transfers: false,
        })
    }

    #[must_use]
    pub fn with_library_override(mut self, library: Option<String>) -> Self {
        self.library_override = library;
        self
    }

    #[must_use]
    pub const fn running_transfers(mut self, run: bool) -> Self {
        self.run_transfers = run;
        self
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// Queue scheduler; the entry point for every queue action.
    pub scheduler: Arc<QueueScheduler>,
    /// Single-flight archiving of installed games.
    pub compression: Arc<CompressionRunner>,
    /// Storage ports, for reads that bypass the scheduler.
    pub repos: Repos,
    /// Where installs and archives live.
    pub layout: LibraryLayout,
    /// Push channel for queue and compression events.
    pub events: Arc<ChannelEmitter>,
    /// Resolved SteamCMD binary.
    pub steamcmd: PathBuf,
    /// Whether transfers run authenticated.
    pub authenticated: bool,
}

/// Build the CLI context from configuration.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let pool = setup_database(&config.database_path).await?;
    let repos = StoreFactory::build_repos(&pool);

    let settings = repos.settings.load().await?;
    let library = match config.library_override.as_deref() {
        Some(explicit) => resolve_library_dir(Some(explicit))?,
        None => resolve_library_dir(settings.library_dir.as_deref())?,
    };
    let archives = archive_dir_for(&library, settings.archive_dir.as_deref())?;
    let layout = LibraryLayout::new(library, archives);
    tracing::debug!(
        library = %layout.library_dir().display(),
        archives = %layout.archive_dir().display(),
        "resolved library layout"
    );

    let events = Arc::new(ChannelEmitter::new(EVENT_CAPACITY));
    let emitter: Arc<dyn QueueEventEmitter> = Arc::clone(&events) as Arc<dyn QueueEventEmitter>;

    let backend = SteamCmdBackend::locate();
    let steamcmd = backend.binary().to_path_buf();
    let runner = Arc::new(TransferRunner::new(Arc::new(backend)));

    let compression = Arc::new(
        CompressionRunner::new(Arc::new(FsArchiveBackend), layout.clone())
            .with_queue(Arc::clone(&repos.queue))
            .with_store(Arc::clone(&repos.compression))
            .with_emitter(Arc::clone(&emitter)),
    );

    let credentials = credentials_from(
        std::env::var(STEAM_USER_ENV).ok(),
        std::env::var(STEAM_PASSWORD_ENV).ok(),
    );
    let authenticated = credentials.is_some();

    let metadata: Arc<dyn MetadataResolver> = Arc::new(StoreMetadataResolver::new());

    let scheduler = build_scheduler(SchedulerDeps {
        queue: Arc::clone(&repos.queue),
        settings: Arc::clone(&repos.settings),
        runner,
        layout: layout.clone(),
        credentials,
        emitter,
        metadata: Some(metadata),
        compression: Some(Arc::clone(&compression)),
        run_transfers: config.run_transfers,
    });

    Ok(CliContext {
        scheduler,
        compression,
        repos,
        layout,
        events,
        steamcmd,
        authenticated,
    })
}

/// Credentials when both halves are present and non-blank; anonymous otherwise.
pub fn credentials_from(user: Option<String>, password: Option<String>) -> Option<Credentials> {
    let user = user.filter(|u| !u.trim().is_empty())?;
    let password = password.filter(|p| !p.is_empty())?;
    Some(Credentials::new(user.trim(), password))
}
