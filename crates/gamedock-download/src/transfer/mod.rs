//! Transfer runner.
//!
//! Drives one external transfer per queue entry: spawns the backend,
//! parses its output into throttled progress, and reports exactly one
//! terminal callback unless the transfer was cancelled.

mod backend;
mod observer;
mod parse;
mod registry;
mod steamcmd;

use std::sync::Arc;
use std::time::Duration;

use gamedock_core::{EntryId, TransferFailure, TransferProgress};
use tokio_util::sync::CancellationToken;

pub use backend::{CONNECTIVITY_TIMEOUT, TransferBackend, TransferProcess, TransferRequest};
pub use observer::TransferObserver;
pub use parse::{TransferLine, is_prompt_fragment, parse_line};
pub use registry::{JobRegistry, LeaseId};
pub use steamcmd::{STEAMCMD_ENV, SteamCmdBackend};

use crate::progress::{ProgressThrottle, RateEstimator, TRANSFER_PROGRESS_INTERVAL};

/// Starts, cancels, and signals transfers.
pub struct TransferRunner {
    backend: Arc<dyn TransferBackend>,
    registry: Arc<JobRegistry>,
    progress_interval: Duration,
}

impl TransferRunner {
    pub fn new(backend: Arc<dyn TransferBackend>) -> Self {
        Self {
            backend,
            registry: Arc::new(JobRegistry::new()),
            progress_interval: TRANSFER_PROGRESS_INTERVAL,
        }
    }

    /// Override the minimum interval between progress callbacks.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Register and start a transfer.
    ///
    /// The transfer is findable by `cancel` and `signal_second_factor` as
    /// soon as this returns.
    pub async fn start(&self, request: TransferRequest, observer: Arc<dyn TransferObserver>) {
        let id = request.entry_id;
        let (lease, cancel) = self.registry.register(id).await;
        tracing::info!(
            target: "gamedock.transfer",
            entry_id = %id,
            resource_id = %request.resource_id,
            anonymous = request.credentials.is_none(),
            "Starting transfer"
        );

        let drive = Drive {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            observer,
            request,
            lease,
            cancel,
            progress_interval: self.progress_interval,
        };
        tokio::spawn(drive.run());
    }

    /// Stop a transfer. Returns whether one was running.
    ///
    /// The kill signal is issued before this returns. No terminal callback
    /// follows a cancel.
    pub async fn cancel(&self, id: EntryId) -> bool {
        let stopped = self.registry.cancel(id).await;
        if stopped {
            tracing::info!(target: "gamedock.transfer", entry_id = %id, "Transfer cancelled");
        }
        stopped
    }

    /// Forward a second-factor code to a transfer blocked on one.
    pub async fn signal_second_factor(&self, id: EntryId, code: &str) -> bool {
        self.registry.signal(id, code.trim()).await
    }

    /// Whether a transfer is registered for this entry.
    pub async fn is_running(&self, id: EntryId) -> bool {
        self.registry.contains(id).await
    }

    /// Entries with a registered transfer.
    pub async fn running_ids(&self) -> Vec<EntryId> {
        self.registry.ids().await
    }

    /// Stop every transfer. Returns how many were signalled.
    pub fn shutdown(&self) -> usize {
        let count = self.registry.cancel_all();
        tracing::info!(target: "gamedock.transfer", count, "Shutdown: cancelled transfer tokens");
        count
    }

    /// Bounded reachability probe against the backend.
    pub async fn check_connectivity(&self, timeout: Duration) -> bool {
        self.backend.check_connectivity(timeout).await
    }
}

/// What the output stream told us before the process exited.
#[derive(Debug, Default)]
struct Seen {
    success: bool,
    failure: Option<TransferFailure>,
    /// A code prompt with no output after it.
    unanswered_prompt: bool,
}

struct Drive {
    backend: Arc<dyn TransferBackend>,
    registry: Arc<JobRegistry>,
    observer: Arc<dyn TransferObserver>,
    request: TransferRequest,
    lease: LeaseId,
    cancel: CancellationToken,
    progress_interval: Duration,
}

impl Drive {
    async fn run(self) {
        let id = self.request.entry_id;

        let spawned = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::debug!(target: "gamedock.transfer", entry_id = %id, "Cancelled before spawn");
                return;
            }
            result = self.backend.spawn(&self.request) => result,
        };

        let TransferProcess {
            mut output,
            input,
            exit,
            kill,
        } = match spawned {
            Ok(process) => process,
            Err(failure) => {
                self.finish(Err(failure)).await;
                return;
            }
        };

        if !self.registry.attach(id, self.lease, input, kill.clone()).await {
            // Cancelled between spawn and attach.
            kill.cancel();
            return;
        }

        let mut throttle = ProgressThrottle::new(self.progress_interval);
        let mut rate = RateEstimator::new();
        let mut seen = Seen::default();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    kill.cancel();
                    return;
                }
                line = output.recv() => match line {
                    Some(line) => self.handle_line(&line, &mut throttle, &mut rate, &mut seen).await,
                    None => break,
                }
            }
        }

        let code = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                kill.cancel();
                return;
            }
            code = exit => code.unwrap_or(None),
        };

        self.finish(classify_exit(seen, code)).await;
    }

    async fn handle_line(
        &self,
        line: &str,
        throttle: &mut ProgressThrottle,
        rate: &mut RateEstimator,
        seen: &mut Seen,
    ) {
        let id = self.request.entry_id;
        match parse_line(line) {
            TransferLine::Progress {
                percent,
                downloaded,
                total,
            } => {
                seen.unanswered_prompt = false;
                if !throttle.should_emit() {
                    return;
                }
                let bytes_total = (total > 0).then_some(total);
                let (rate_bps, eta_seconds) = rate.sample(downloaded, bytes_total);
                self.observer
                    .on_progress(
                        id,
                        TransferProgress {
                            percent,
                            bytes_downloaded: downloaded,
                            bytes_total,
                            rate_bps,
                            eta_seconds,
                        },
                    )
                    .await;
            }
            TransferLine::Success => {
                seen.success = true;
                seen.unanswered_prompt = false;
            }
            TransferLine::SecondFactorPrompt => {
                seen.unanswered_prompt = true;
                if self.registry.set_awaiting(id, self.lease).await {
                    tracing::info!(target: "gamedock.transfer", entry_id = %id, "Transfer waiting for second-factor code");
                    self.observer.on_second_factor(id).await;
                }
            }
            TransferLine::Failure(failure) => {
                tracing::debug!(target: "gamedock.transfer", entry_id = %id, error = %failure, "Transfer reported failure");
                seen.failure.get_or_insert(failure);
            }
            TransferLine::Other => {}
        }
    }

    async fn finish(&self, result: Result<(), TransferFailure>) {
        let id = self.request.entry_id;
        if !self.registry.release(id, self.lease).await {
            tracing::debug!(target: "gamedock.transfer", entry_id = %id, "Stale transfer finished, dropping result");
            return;
        }
        match result {
            Ok(()) => {
                tracing::info!(target: "gamedock.transfer", entry_id = %id, "Transfer completed");
                self.observer.on_complete(id).await;
            }
            Err(failure) => {
                tracing::warn!(target: "gamedock.transfer", entry_id = %id, error = %failure, "Transfer failed");
                self.observer.on_error(id, failure).await;
            }
        }
    }
}

/// Decide the terminal outcome once the process has exited.
fn classify_exit(seen: Seen, code: Option<i32>) -> Result<(), TransferFailure> {
    if seen.success {
        return Ok(());
    }
    if let Some(failure) = seen.failure {
        return Err(failure);
    }
    if seen.unanswered_prompt {
        return Err(TransferFailure::SecondFactorRequired);
    }
    match code {
        Some(0) => Ok(()),
        Some(code) => Err(TransferFailure::NonZeroExit { code }),
        None => Err(TransferFailure::unknown("transfer tool terminated by signal")),
    }
}
