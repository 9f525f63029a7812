//! Compression runner.
//!
//! Archives one resource's install directory at a time per resource key,
//! off the request path. Jobs live in an in-memory table keyed by resource
//! id; snapshots are persisted on each state change.

mod archive;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gamedock_core::{
    CompressedArchive, CompressionError, CompressionFormat, CompressionJob, CompressionRepository,
    CompressionStatus, EntryStatus, NoopEmitter, QueueEvent, QueueEventEmitter, QueueRepository,
};
use indexmap::IndexMap;
use tokio::sync::{Mutex, Notify, watch};

pub use archive::{ArchiveBackend, ArchiveError, FsArchiveBackend, dir_size};

use crate::layout::LibraryLayout;
use crate::progress::ProgressThrottle;

/// Minimum interval between compression progress events.
const COMPRESSION_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Single-flight archiver keyed by resource id.
pub struct CompressionRunner {
    jobs: Mutex<IndexMap<String, CompressionJob>>,
    backend: Arc<dyn ArchiveBackend>,
    layout: LibraryLayout,
    queue: Option<Arc<dyn QueueRepository>>,
    store: Option<Arc<dyn CompressionRepository>>,
    emitter: Arc<dyn QueueEventEmitter>,
    /// Signalled whenever a job reaches a terminal status.
    finished: Notify,
}

impl CompressionRunner {
    pub fn new(backend: Arc<dyn ArchiveBackend>, layout: LibraryLayout) -> Self {
        Self {
            jobs: Mutex::new(IndexMap::new()),
            backend,
            layout,
            queue: None,
            store: None,
            emitter: Arc::new(NoopEmitter),
            finished: Notify::new(),
        }
    }

    /// Refuse to archive directories whose download is still open.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn QueueRepository>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Persist job snapshots and compressed-archive records.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CompressionRepository>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn QueueEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Start archiving a resource. Returns whether a job was started.
    pub async fn compress(
        self: &Arc<Self>,
        resource_id: &str,
        format: CompressionFormat,
        level: u32,
    ) -> bool {
        match self.try_compress(resource_id, format, level).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(target: "gamedock.compression", resource_id, reason = %e, "Compression not started");
                false
            }
        }
    }

    /// Start archiving a resource, reporting why it was not started.
    pub async fn try_compress(
        self: &Arc<Self>,
        resource_id: &str,
        format: CompressionFormat,
        level: u32,
    ) -> Result<(), CompressionError> {
        let resource_id = resource_id.trim();
        let source = self.layout.install_dir(resource_id);
        let is_dir = tokio::fs::metadata(&source)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if !is_dir {
            return Err(CompressionError::SourceMissing {
                path: source.display().to_string(),
            });
        }

        let output = self.layout.archive_path(resource_id, format);
        let job = {
            // Admission reads this table, so holding it across the download
            // check keeps a transfer from starting before the job is visible.
            let mut jobs = self.jobs.lock().await;
            if jobs.get(resource_id).is_some_and(|job| !job.status.is_terminal()) {
                return Err(CompressionError::AlreadyInProgress {
                    resource_id: resource_id.to_string(),
                });
            }
            self.ensure_download_completed(resource_id).await?;

            let mut job = CompressionJob::pending(resource_id, format, level.min(9));
            job.output_path = Some(output.display().to_string());
            // A new job goes to the end of the listing.
            jobs.shift_remove(resource_id);
            jobs.insert(resource_id.to_string(), job.clone());
            job
        };

        tracing::info!(
            target: "gamedock.compression",
            resource_id,
            format = %format,
            level = job.level,
            output = %output.display(),
            "Compression queued"
        );
        self.persist(&job).await;

        let runner = Arc::clone(self);
        let resource_id = resource_id.to_string();
        tokio::spawn(async move { runner.run_job(resource_id, source, output).await });
        Ok(())
    }

    /// Whether a non-terminal job exists for this resource.
    pub async fn is_busy(&self, resource_id: &str) -> bool {
        self.jobs
            .lock()
            .await
            .get(resource_id)
            .is_some_and(|job| !job.status.is_terminal())
    }

    /// Wait until no job is running for this resource.
    pub async fn wait_idle(&self, resource_id: &str) {
        loop {
            let finished = self.finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();
            if !self.is_busy(resource_id).await {
                return;
            }
            finished.await;
        }
    }

    /// Snapshot of one job.
    pub async fn status(&self, resource_id: &str) -> Option<CompressionJob> {
        self.jobs.lock().await.get(resource_id).cloned()
    }

    /// Snapshots of every job, oldest first.
    pub async fn all_statuses(&self) -> Vec<CompressionJob> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// Load persisted history. Jobs left running by a previous process are
    /// marked failed.
    pub async fn restore(&self) -> Result<usize, CompressionError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let loaded = store
            .load_jobs()
            .await
            .map_err(|e| CompressionError::Storage {
                message: e.to_string(),
            })?;

        let count = loaded.len();
        for mut job in loaded {
            if !job.status.is_terminal() {
                job.fail("interrupted before completion");
                self.persist(&job).await;
            }
            self.jobs.lock().await.insert(job.resource_id.clone(), job);
        }
        tracing::debug!(target: "gamedock.compression", count, "Restored compression history");
        Ok(count)
    }

    async fn run_job(self: Arc<Self>, resource_id: String, source: PathBuf, output: PathBuf) {
        let size_root = source.clone();
        let total = match tokio::task::spawn_blocking(move || dir_size(&size_root)).await {
            Ok(Ok(total)) => total,
            Ok(Err(e)) => {
                self.finish_failed(&resource_id, &CompressionError::from_io_error(&e))
                    .await;
                return;
            }
            Err(e) => {
                self.finish_failed(&resource_id, &CompressionError::archive(e.to_string()))
                    .await;
                return;
            }
        };

        let Some(job) = self
            .update(&resource_id, |job| {
                job.total_bytes = total;
                job.status = CompressionStatus::Compressing;
            })
            .await
        else {
            return;
        };
        self.persist(&job).await;
        self.emit_progress(&job);

        let (progress_tx, mut progress_rx) = watch::channel(0u64);
        let backend = Arc::clone(&self.backend);
        let (format, level) = (job.format, job.level);
        let mut writer = tokio::task::spawn_blocking(move || {
            let mut report = |processed: u64| {
                let _ = progress_tx.send(processed);
            };
            backend.write_archive(&source, &output, format, level, &mut report)
        });

        let mut throttle = ProgressThrottle::new(COMPRESSION_PROGRESS_INTERVAL);
        let result = loop {
            tokio::select! {
                biased;
                joined = &mut writer => break joined,
                changed = progress_rx.changed() => {
                    if changed.is_err() {
                        break writer.await;
                    }
                    let processed = *progress_rx.borrow_and_update();
                    let job = self.update(&resource_id, |job| job.advance(processed)).await;
                    if let Some(job) = job {
                        if throttle.should_emit() {
                            self.emit_progress(&job);
                        }
                    }
                }
            }
        };

        match result {
            Ok(Ok(size)) => self.finish_completed(&resource_id, size).await,
            Ok(Err(e)) => self.finish_failed(&resource_id, &e.into()).await,
            Err(e) => {
                self.finish_failed(&resource_id, &CompressionError::archive(e.to_string()))
                    .await;
            }
        }
    }

    async fn finish_completed(&self, resource_id: &str, size: u64) {
        let Some(job) = self.update(resource_id, |job| job.complete(size)).await else {
            return;
        };
        tracing::info!(target: "gamedock.compression", resource_id, size, "Compression completed");
        self.persist(&job).await;

        if let (Some(store), Some(path)) = (&self.store, &job.output_path) {
            let archive = CompressedArchive {
                resource_id: resource_id.to_string(),
                archive_path: path.clone(),
                archive_size: size,
                format: job.format,
                compressed_at: job.end_time.unwrap_or_else(Utc::now),
            };
            if let Err(e) = store.mark_compressed(&archive).await {
                tracing::warn!(target: "gamedock.compression", resource_id, error = %e, "Failed to record compressed archive");
            }
        }

        self.emitter.emit(QueueEvent::CompressionFinished {
            resource_id: resource_id.to_string(),
            status: CompressionStatus::Completed,
            error: None,
        });
        self.finished.notify_waiters();
    }

    /// The partial output is left on disk for inspection.
    async fn finish_failed(&self, resource_id: &str, error: &CompressionError) {
        let message = error.to_string();
        let Some(job) = self.update(resource_id, |job| job.fail(message.clone())).await else {
            return;
        };
        tracing::warn!(target: "gamedock.compression", resource_id, error = %message, "Compression failed");
        self.persist(&job).await;
        self.emitter.emit(QueueEvent::CompressionFinished {
            resource_id: resource_id.to_string(),
            status: CompressionStatus::Failed,
            error: Some(message),
        });
        self.finished.notify_waiters();
    }

    async fn update(
        &self,
        resource_id: &str,
        apply: impl FnOnce(&mut CompressionJob),
    ) -> Option<CompressionJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(resource_id)?;
        apply(job);
        Some(job.clone())
    }

    /// The install directory belongs to its download until that download
    /// has completed. A resource never queued here is not guarded.
    async fn ensure_download_completed(&self, resource_id: &str) -> Result<(), CompressionError> {
        let Some(queue) = &self.queue else {
            return Ok(());
        };
        let latest = queue
            .find_latest_by_resource(resource_id)
            .await
            .map_err(|e| CompressionError::Storage {
                message: e.to_string(),
            })?;
        match latest {
            Some(entry) if entry.status != EntryStatus::Completed => {
                Err(CompressionError::SourceBusy {
                    resource_id: resource_id.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn persist(&self, job: &CompressionJob) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_job(job).await {
                tracing::warn!(
                    target: "gamedock.compression",
                    resource_id = %job.resource_id,
                    error = %e,
                    "Failed to persist compression job"
                );
            }
        }
    }

    fn emit_progress(&self, job: &CompressionJob) {
        self.emitter.emit(QueueEvent::CompressionProgress {
            resource_id: job.resource_id.clone(),
            processed_bytes: job.processed_bytes,
            total_bytes: job.total_bytes,
            percent: job.progress_percent,
        });
    }
}
