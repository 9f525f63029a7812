//! Transfer backend port.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use gamedock_core::{Credentials, EntryId, TransferFailure};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Default bound for the connectivity check.
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub entry_id: EntryId,
    pub resource_id: String,
    pub destination: PathBuf,
    /// `None` runs in anonymous mode.
    pub credentials: Option<Credentials>,
}

/// Handles to a running transfer process.
///
/// `output` yields raw lines (and unterminated prompt fragments). Cancelling
/// `kill` must terminate the process; `exit` resolves with the exit code
/// (`None` when killed by a signal).
#[derive(Debug)]
pub struct TransferProcess {
    pub output: mpsc::Receiver<String>,
    pub input: mpsc::Sender<String>,
    pub exit: oneshot::Receiver<Option<i32>>,
    pub kill: CancellationToken,
}

/// The process or library that performs the byte transfer.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Start a transfer. Errors here are spawn failures.
    async fn spawn(&self, request: &TransferRequest) -> Result<TransferProcess, TransferFailure>;

    /// Bounded reachability probe.
    async fn check_connectivity(&self, timeout: Duration) -> bool;
}
