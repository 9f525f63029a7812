//! SteamCMD transfer backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use gamedock_core::TransferFailure;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::backend::{TransferBackend, TransferProcess, TransferRequest};
use super::parse::is_prompt_fragment;

/// Environment variable overriding the SteamCMD binary.
pub const STEAMCMD_ENV: &str = "GAMEDOCK_STEAMCMD";

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Runs `steamcmd +app_update` for each transfer.
#[derive(Debug, Clone)]
pub struct SteamCmdBackend {
    binary: PathBuf,
}

impl SteamCmdBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve the binary from `GAMEDOCK_STEAMCMD`, then `PATH`.
    ///
    /// Falls back to the bare name so a missing install surfaces as a
    /// spawn failure on the first transfer rather than at startup.
    pub fn locate() -> Self {
        if let Ok(path) = std::env::var(STEAMCMD_ENV) {
            if !path.trim().is_empty() {
                return Self::new(path.trim());
            }
        }
        match which::which("steamcmd") {
            Ok(path) => Self::new(path),
            Err(e) => {
                tracing::debug!(target: "gamedock.transfer", error = %e, "steamcmd not on PATH");
                Self::new("steamcmd")
            }
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn app_update_args(request: &TransferRequest) -> Vec<String> {
        let mut args = vec![
            "+force_install_dir".to_string(),
            request.destination.to_string_lossy().into_owned(),
            "+login".to_string(),
        ];
        match &request.credentials {
            Some(creds) => {
                args.push(creds.username.clone());
                args.push(creds.password.clone());
            }
            None => args.push("anonymous".to_string()),
        }
        args.extend([
            "+app_update".to_string(),
            request.resource_id.clone(),
            "validate".to_string(),
            "+quit".to_string(),
        ]);
        args
    }
}

#[async_trait]
impl TransferBackend for SteamCmdBackend {
    async fn spawn(&self, request: &TransferRequest) -> Result<TransferProcess, TransferFailure> {
        tokio::fs::create_dir_all(&request.destination)
            .await
            .map_err(|e| {
                TransferFailure::spawn_failed(format!(
                    "cannot create {}: {e}",
                    request.destination.display()
                ))
            })?;

        let mut child = Command::new(&self.binary)
            .args(Self::app_update_args(request))
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransferFailure::spawn_failed(format!("{}: {e}", self.binary.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransferFailure::spawn_failed("Missing stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransferFailure::spawn_failed("Missing stderr"))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransferFailure::spawn_failed("Missing stdin"))?;

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        tokio::spawn(forward_output(stdout, output_tx.clone()));
        tokio::spawn(forward_output(stderr, output_tx));

        let (input_tx, mut input_rx) = mpsc::channel::<String>(4);
        tokio::spawn(async move {
            while let Some(code) = input_rx.recv().await {
                let line = format!("{code}\n");
                if stdin.write_all(line.as_bytes()).await.is_err() || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = oneshot::channel();
        let kill_wait = kill.clone();
        tokio::spawn(async move {
            let code = tokio::select! {
                biased;
                () = kill_wait.cancelled() => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(target: "gamedock.transfer", error = %e, "Failed to kill steamcmd");
                    }
                    None
                }
                status = child.wait() => match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        tracing::warn!(target: "gamedock.transfer", error = %e, "Failed to wait for steamcmd");
                        None
                    }
                },
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

    async fn check_connectivity(&self, timeout: Duration) -> bool {
        let status = Command::new(&self.binary)
            .args(["+login", "anonymous", "+quit"])
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match tokio::time::timeout(timeout, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::warn!(target: "gamedock.transfer", error = %e, "Connectivity check could not start steamcmd");
                false
            }
            Err(_) => {
                tracing::warn!(target: "gamedock.transfer", timeout_secs = timeout.as_secs(), "Connectivity check timed out");
                false
            }
        }
    }
}

/// Read a pipe and forward its lines.
async fn forward_output<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 4096];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(target: "gamedock.transfer", error = %e, "Output pipe closed");
                break;
            }
        };
        for line in splitter.push(&buf[..n]) {
            if tx.send(line).await.is_err() {
                return;
            }
        }
    }
    if let Some(rest) = splitter.finish() {
        let _ = tx.send(rest).await;
    }
}

/// Splits a byte stream on `\n` and `\r`.
///
/// SteamCMD redraws progress with carriage returns and leaves code prompts
/// unterminated, so a buffered prompt is released early and its completed
/// line is not repeated.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
    released_prompt: Option<String>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                if let Some(line) = self.complete(line) {
                    lines.push(line);
                }
            } else {
                self.pending.push(b);
            }
        }

        if self.released_prompt.is_none() && !self.pending.is_empty() {
            let fragment = String::from_utf8_lossy(&self.pending).into_owned();
            if is_prompt_fragment(&fragment) {
                self.released_prompt = Some(fragment.clone());
                lines.push(fragment);
            }
        }
        lines
    }

    fn complete(&mut self, line: String) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        match self.released_prompt.take() {
            Some(prompt) if line.starts_with(&prompt) => None,
            _ => Some(line),
        }
    }

    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
        self.complete(rest)
    }
}

#[cfg(test)]
mod tests {
    use gamedock_core::{Credentials, EntryId};

    use super::*;

    fn request(credentials: Option<Credentials>) -> TransferRequest {
        TransferRequest {
            entry_id: EntryId::new(1),
            resource_id: "740".to_string(),
            destination: PathBuf::from("/games/740"),
            credentials,
        }
    }

    #[test]
    fn anonymous_args() {
        let args = SteamCmdBackend::app_update_args(&request(None));
        assert_eq!(
            args,
            vec![
                "+force_install_dir",
                "/games/740",
                "+login",
                "anonymous",
                "+app_update",
                "740",
                "validate",
                "+quit"
            ]
        );
    }

    #[test]
    fn authenticated_args() {
        let args = SteamCmdBackend::app_update_args(&request(Some(Credentials::new("u", "p"))));
        assert_eq!(&args[2..5], ["+login", "u", "p"]);
    }

    #[test]
    fn splitter_handles_carriage_returns() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.push(b"progress: 1.00 (1 / 100)\rprogress: 2.00 (2 / 100)\r\nSucc");
        assert_eq!(
            lines,
            vec!["progress: 1.00 (1 / 100)", "progress: 2.00 (2 / 100)"]
        );
        assert!(splitter.push(b"ess!").is_empty());
        assert_eq!(splitter.finish().as_deref(), Some("Success!"));
    }

    #[test]
    fn splitter_releases_prompt_once() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"Steam Guard code:"), vec!["Steam Guard code:"]);
        assert!(splitter.push(b" ").is_empty());
        assert_eq!(splitter.push(b"\nOK\n"), vec!["OK"]);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SteamCmdBackend::new(dir.path().join("no-such-steamcmd"));
        let mut req = request(None);
        req.destination = dir.path().join("740");
        let err = backend.spawn(&req).await.unwrap_err();
        assert!(matches!(err, TransferFailure::SpawnFailed { .. }));
        assert!(req.destination.is_dir());
    }

    #[tokio::test]
    async fn missing_binary_is_unreachable() {
        let backend = SteamCmdBackend::new("/nonexistent/steamcmd");
        assert!(!backend.check_connectivity(Duration::from_secs(1)).await);
    }
}
