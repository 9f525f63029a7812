//! Scripted fakes shared by this crate's tests.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gamedock_core::{
    CompressionFormat, EntryId, EntryStatus, QueueEvent, QueueEventEmitter, ResourceMetadata, Settings,
    TransferFailure, TransferProgress,
};
use gamedock_db::TestDb;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::compression::{
    ArchiveBackend, ArchiveError, CompressionRunner, FsArchiveBackend, dir_size,
};
use crate::layout::LibraryLayout;
use crate::scheduler::{QueueScheduler, SchedulerDeps, build_scheduler};
use crate::transfer::{
    TransferBackend, TransferObserver, TransferProcess, TransferRequest, TransferRunner,
};

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Debug, Clone)]
enum Step {
    Line(String),
    AwaitInput,
    AwaitRelease,
}

/// What a scripted transfer does once spawned.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    exit_code: Option<i32>,
    spawn_error: Option<TransferFailure>,
}

impl Script {
    /// Empty script exiting with code 0.
    pub const fn new() -> Self {
        Self {
            steps: Vec::new(),
            exit_code: Some(0),
            spawn_error: None,
        }
    }

    /// Succeeds immediately.
    pub fn succeed(resource_id: &str) -> Self {
        Self::new()
            .line(&format!("Success! App '{resource_id}' fully installed."))
            .exit(0)
    }

    /// Holds until [`ScriptedBackend::release`], then succeeds.
    pub fn held(resource_id: &str) -> Self {
        Self::new().await_release().line(&format!(
            "Success! App '{resource_id}' fully installed."
        ))
    }

    /// Holds until released, then fails with the given output line.
    pub fn held_then_fail(line: &str) -> Self {
        Self::new().await_release().line(line).exit(5)
    }

    pub fn line(mut self, line: &str) -> Self {
        self.steps.push(Step::Line(line.to_string()));
        self
    }

    pub fn await_input(mut self) -> Self {
        self.steps.push(Step::AwaitInput);
        self
    }

    pub fn await_release(mut self) -> Self {
        self.steps.push(Step::AwaitRelease);
        self
    }

    pub const fn exit(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn spawn_error(mut self, failure: TransferFailure) -> Self {
        self.spawn_error = Some(failure);
        self
    }
}

#[derive(Default)]
struct Recorded {
    requests: Vec<TransferRequest>,
    inputs: Vec<(String, String)>,
    killed: Vec<String>,
}

/// Transfer backend replaying per-resource scripts.
///
/// Unscripted resources hold until released and then succeed.
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    recorded: Arc<Mutex<Recorded>>,
    reachable: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            recorded: Arc::new(Mutex::new(Recorded::default())),
            reachable: true,
        }
    }

    #[must_use]
    pub fn with_script(self, resource_id: &str, script: Script) -> Self {
        self.set_script(resource_id, script);
        self
    }

    #[must_use]
    pub const fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn set_script(&self, resource_id: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(resource_id.to_string(), script);
    }

    /// Let the next `await_release` step for this resource proceed.
    pub fn release(&self, resource_id: &str) {
        self.gate(resource_id).notify_one();
    }

    pub fn spawn_count(&self) -> usize {
        self.recorded.lock().unwrap().requests.len()
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.recorded.lock().unwrap().requests.clone()
    }

    pub fn inputs(&self) -> Vec<(String, String)> {
        self.recorded.lock().unwrap().inputs.clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.recorded.lock().unwrap().killed.clone()
    }

    fn gate(&self, resource_id: &str) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .unwrap()
                .entry(resource_id.to_string())
                .or_default(),
        )
    }
}

#[async_trait]
impl TransferBackend for ScriptedBackend {
    async fn spawn(&self, request: &TransferRequest) -> Result<TransferProcess, TransferFailure> {
        self.recorded.lock().unwrap().requests.push(request.clone());
        let resource = request.resource_id.clone();
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| Script::held(&resource));
        if let Some(failure) = script.spawn_error {
            return Err(failure);
        }

        let (output_tx, output_rx) = mpsc::channel(64);
        let (input_tx, mut input_rx) = mpsc::channel::<String>(4);
        let (exit_tx, exit_rx) = oneshot::channel();
        let kill = CancellationToken::new();
        let gate = self.gate(&resource);
        let recorded = Arc::clone(&self.recorded);
        let kill_wait = kill.clone();

        tokio::spawn(async move {
            let play = async {
                for step in script.steps {
                    match step {
                        Step::Line(line) => {
                            let _ = output_tx.send(line).await;
                        }
                        Step::AwaitInput => {
                            if let Some(code) = input_rx.recv().await {
                                recorded.lock().unwrap().inputs.push((resource.clone(), code));
                            }
                        }
                        Step::AwaitRelease => gate.notified().await,
                    }
                }
                drop(output_tx);
                script.exit_code
            };
            let code = tokio::select! {
                biased;
                () = kill_wait.cancelled() => {
                    recorded.lock().unwrap().killed.push(resource.clone());
                    None
                }
                code = play => code,
            };
            let _ = exit_tx.send(code);
        });

        Ok(TransferProcess {
            output: output_rx,
            input: input_tx,
            exit: exit_rx,
            kill,
        })
    }

    async fn check_connectivity(&self, _timeout: Duration) -> bool {
        self.reachable
    }
}

/// Archive backend that reports everything written, then blocks until
/// the paired sender fires.
pub struct GatedArchive {
    close: Mutex<std_mpsc::Receiver<()>>,
}

impl GatedArchive {
    pub fn new() -> (Self, std_mpsc::Sender<()>) {
        let (close_tx, close_rx) = std_mpsc::channel();
        (
            Self {
                close: Mutex::new(close_rx),
            },
            close_tx,
        )
    }
}

impl ArchiveBackend for GatedArchive {
    fn write_archive(
        &self,
        source: &Path,
        _output: &Path,
        _format: CompressionFormat,
        _level: u32,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ArchiveError> {
        on_progress(dir_size(source)?);
        let _ = self.close.lock().unwrap().recv();
        Ok(42)
    }
}

/// A callback seen by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Progress(EntryId, TransferProgress),
    SecondFactor(EntryId),
    Complete(EntryId),
    Error(EntryId, TransferFailure),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Observed::Complete(_) | Observed::Error(..)))
            .count()
    }
}

#[async_trait]
impl TransferObserver for RecordingObserver {
    async fn on_progress(&self, id: EntryId, progress: TransferProgress) {
        self.events
            .lock()
            .unwrap()
            .push(Observed::Progress(id, progress));
    }

    async fn on_second_factor(&self, id: EntryId) {
        self.events.lock().unwrap().push(Observed::SecondFactor(id));
    }

    async fn on_complete(&self, id: EntryId) {
        self.events.lock().unwrap().push(Observed::Complete(id));
    }

    async fn on_error(&self, id: EntryId, failure: TransferFailure) {
        self.events.lock().unwrap().push(Observed::Error(id, failure));
    }
}

/// Emitter that keeps every event.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl QueueEventEmitter for RecordingEmitter {
    fn emit(&self, event: QueueEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A scheduler over an in-memory store and a scripted backend.
pub struct Harness {
    pub db: TestDb,
    pub backend: Arc<ScriptedBackend>,
    pub scheduler: Arc<QueueScheduler>,
    pub compression: Arc<CompressionRunner>,
    pub emitter: Arc<RecordingEmitter>,
    pub layout: LibraryLayout,
    _root: tempfile::TempDir,
}

impl Harness {
    pub async fn new(max_concurrent: u32) -> Self {
        Self::with_backend(max_concurrent, ScriptedBackend::new(), false).await
    }

    pub async fn with_backend(
        max_concurrent: u32,
        backend: ScriptedBackend,
        auto_compress: bool,
    ) -> Self {
        Self::build(max_concurrent, backend, auto_compress, true, Arc::new(FsArchiveBackend)).await
    }

    /// A scheduler that edits the queue but never starts transfers.
    pub async fn queue_only(max_concurrent: u32) -> Self {
        Self::build(
            max_concurrent,
            ScriptedBackend::new(),
            false,
            false,
            Arc::new(FsArchiveBackend),
        )
        .await
    }

    /// A scheduler whose compression runner archives with `archive`.
    pub async fn with_archive(max_concurrent: u32, archive: Arc<dyn ArchiveBackend>) -> Self {
        Self::build(max_concurrent, ScriptedBackend::new(), false, true, archive).await
    }

    async fn build(
        max_concurrent: u32,
        backend: ScriptedBackend,
        auto_compress: bool,
        run_transfers: bool,
        archive: Arc<dyn ArchiveBackend>,
    ) -> Self {
        let db = TestDb::new().await.unwrap();
        let repos = db.repos();
        repos
            .settings
            .save(&Settings {
                max_concurrent_downloads: Some(max_concurrent),
                auto_compress: Some(auto_compress),
                ..Settings::default()
            })
            .await
            .unwrap();

        let root = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(root.path().join("library"), root.path().join("archives"));
        let backend = Arc::new(backend);
        let emitter = Arc::new(RecordingEmitter::default());
        let compression = Arc::new(
            CompressionRunner::new(archive, layout.clone())
                .with_queue(Arc::clone(&repos.queue))
                .with_store(Arc::clone(&repos.compression)),
        );
        let runner = TransferRunner::new(Arc::clone(&backend) as Arc<dyn TransferBackend>)
            .with_progress_interval(Duration::ZERO);

        let scheduler = build_scheduler(SchedulerDeps {
            queue: Arc::clone(&repos.queue),
            settings: Arc::clone(&repos.settings),
            runner: Arc::new(runner),
            layout: layout.clone(),
            credentials: None,
            emitter: Arc::clone(&emitter) as Arc<dyn QueueEventEmitter>,
            metadata: None,
            compression: Some(Arc::clone(&compression)),
            run_transfers,
        });

        Self {
            db,
            backend,
            scheduler,
            compression,
            emitter,
            layout,
            _root: root,
        }
    }

    pub async fn enqueue(&self, resource_id: &str) -> EntryId {
        self.scheduler
            .enqueue(resource_id, ResourceMetadata::titled(resource_id))
            .await
            .unwrap()
            .id
    }

    /// Create a small install directory for a resource.
    pub fn install(&self, resource_id: &str) {
        let dir = self.layout.install_dir(resource_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("game.bin"), vec![7u8; 1024]).unwrap();
    }

    pub async fn status(&self, id: EntryId) -> EntryStatus {
        self.scheduler.get(id).await.unwrap().status
    }

    pub async fn set_limit(&self, max_concurrent: u32) {
        let settings = self.db.repos().settings;
        let mut current = settings.load().await.unwrap();
        current.max_concurrent_downloads = Some(max_concurrent);
        settings.save(&current).await.unwrap();
    }
}
