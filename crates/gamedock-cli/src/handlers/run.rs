//! Foreground queue runner.
//!
//! Recovers entries interrupted by a previous run, then keeps admitting
//! and refreshing progress bars from queue snapshots until the queue is
//! idle. Second-factor prompts are answered from stdin. Ctrl-C stops the
//! running transfers; their entries are requeued on the next run.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use gamedock_core::{EntryId, EntryStatus, QueueEntry, QueueEvent, QueueSnapshot};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_bytes, format_eta, format_rate, truncate_string};

/// Bar length; positions are tenths of a percent.
const BAR_SCALE: u64 = 1000;

/// What happened during one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub recovered: usize,
    pub completed: usize,
    pub failed: usize,
    /// Transfers stopped by Ctrl-C.
    pub interrupted: usize,
}

/// Drive the queue until it is idle (or forever with `watch`).
pub async fn execute(ctx: &CliContext, watch: bool, interval: Duration) -> Result<RunSummary> {
    let mut events = ctx.events.subscribe();

    let restored = ctx.compression.restore().await.map_err(CliError::from)?;
    tracing::debug!(restored, "compression history loaded");

    let mut summary = RunSummary {
        recovered: ctx
            .scheduler
            .recover_on_startup()
            .await
            .map_err(CliError::from)?,
        ..RunSummary::default()
    };
    if summary.recovered > 0 {
        println!("Requeued {} interrupted download(s).", summary.recovered);
    }

    let mut bars = Bars::new();
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut awaiting_code: Option<EntryId> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                summary.interrupted = ctx.scheduler.shutdown();
                bars.clear();
                println!(
                    "Stopped {} transfer(s); they resume on the next 'gamedock run'.",
                    summary.interrupted
                );
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(id) = on_event(&event, &bars, &mut summary) {
                        awaiting_code = Some(id);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open && awaiting_code.is_some() => match line {
                Ok(Some(code)) => {
                    if let Some(id) = awaiting_code.take() {
                        submit_code(ctx, id, &code, &bars).await;
                    }
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = ticker.tick() => {
                if let Err(e) = ctx.scheduler.reconcile_stopped().await {
                    tracing::warn!(error = %e, "reconcile failed");
                }
                // Picks up limit changes made from another terminal.
                if let Err(e) = ctx.scheduler.admission_pass().await {
                    tracing::warn!(error = %e, "admission pass failed");
                }
                let snapshot = ctx.scheduler.snapshot().await.map_err(CliError::from)?;
                bars.refresh(&snapshot);

                if !watch && snapshot.is_idle() && !compressing(ctx).await {
                    bars.clear();
                    break;
                }
            }
        }
    }

    println!(
        "Done: {} completed, {} failed.",
        summary.completed, summary.failed
    );
    Ok(summary)
}

/// React to a pushed event. Returns the entry that now wants a code.
fn on_event(event: &QueueEvent, bars: &Bars, summary: &mut RunSummary) -> Option<EntryId> {
    match event {
        QueueEvent::EntryStarted { id, resource_id } => {
            bars.println(format!("→ #{id} started ({resource_id})"));
        }
        QueueEvent::EntryCompleted { id } => {
            summary.completed += 1;
            bars.println(format!("✓ #{id} completed"));
        }
        QueueEvent::EntryFailed { id, error } => {
            summary.failed += 1;
            bars.println(format!("✗ #{id} failed: {error}"));
        }
        QueueEvent::SecondFactorRequired { id } => {
            bars.println(format!("#{id} needs a Steam Guard code. Type it and press Enter:"));
            return Some(*id);
        }
        QueueEvent::CompressionFinished {
            resource_id,
            status,
            error,
        } => match error {
            Some(error) => bars.println(format!("✗ archive of {resource_id} {}: {error}", status.as_str())),
            None => bars.println(format!("✓ archive of {resource_id} {}", status.as_str())),
        },
        _ => {}
    }
    None
}

async fn submit_code(ctx: &CliContext, id: EntryId, code: &str, bars: &Bars) {
    match ctx.scheduler.submit_second_factor(id, code).await {
        Ok(true) => bars.println(format!("Code sent to #{id}.")),
        Ok(false) => bars.println(format!("#{id} is no longer waiting for a code.")),
        Err(e) => bars.println(format!("✗ {}", CliError::from(e))),
    }
}

async fn compressing(ctx: &CliContext) -> bool {
    ctx.compression
        .all_statuses()
        .await
        .iter()
        .any(|job| !job.status.is_terminal())
}

/// One progress bar per active entry.
struct Bars {
    multi: MultiProgress,
    active: HashMap<EntryId, ProgressBar>,
}

impl Bars {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            active: HashMap::new(),
        }
    }

    fn refresh(&mut self, snapshot: &QueueSnapshot) {
        let active: Vec<&QueueEntry> = snapshot
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Active)
            .collect();

        self.active.retain(|id, bar| {
            let keep = active.iter().any(|e| e.id == *id);
            if !keep {
                bar.finish_and_clear();
            }
            keep
        });

        for entry in active {
            let bar = self.active.entry(entry.id).or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(BAR_SCALE));
                bar.set_style(bar_style());
                bar
            });
            bar.set_position(bar_position(entry.progress_percent));
            bar.set_message(bar_message(entry));
        }
    }

    fn println(&self, line: String) {
        if self.multi.println(&line).is_err() {
            println!("{line}");
        }
    }

    fn clear(&mut self) {
        for (_, bar) in self.active.drain() {
            bar.finish_and_clear();
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bar_position(percent: f64) -> u64 {
    ((percent.clamp(0.0, 100.0) * 10.0).round() as u64).min(BAR_SCALE)
}

fn bar_message(entry: &QueueEntry) -> String {
    let title = truncate_string(entry.title(), 24);
    if entry.awaiting_second_factor {
        return format!("#{} {title}  waiting for Steam Guard code", entry.id);
    }
    let bytes = match entry.bytes_total {
        Some(total) => format!(
            "{}/{}",
            format_bytes(entry.bytes_downloaded),
            format_bytes(total)
        ),
        None => format_bytes(entry.bytes_downloaded),
    };
    format!(
        "#{} {title}  {:.1}%  {bytes}  {}  eta {}",
        entry.id,
        entry.progress_percent,
        format_rate(entry.transfer_rate),
        format_eta(entry.eta_seconds)
    )
}
