//! Compression command handlers.

use std::time::Duration;

use anyhow::Result;
use gamedock_core::{CompressionFormat, CompressionJob, CompressionStatus, QueueEvent};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_bytes, format_optional, print_separator, truncate_string};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Archive an installed game and wait for the job to finish.
///
/// Format and level fall back to the configured defaults.
pub async fn compress(
    ctx: &CliContext,
    resource_id: &str,
    format: Option<CompressionFormat>,
    level: Option<u32>,
) -> Result<()> {
    ctx.compression.restore().await.map_err(CliError::from)?;

    let settings = ctx.repos.settings.load().await?;
    let format = format.unwrap_or_else(|| settings.effective_compression_format());
    let level = level.unwrap_or_else(|| settings.effective_compression_level());

    // Subscribe first: the finished event is sent after the archive record
    // is written.
    let mut events = ctx.events.subscribe();
    ctx.compression
        .try_compress(resource_id, format, level)
        .await
        .map_err(CliError::from)?;

    let bar = ProgressBar::new(100);
    bar.set_style(percent_style());
    bar.set_message(format!("{resource_id} -> {format}"));

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let job = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(QueueEvent::CompressionFinished { resource_id: finished, .. })
                    if finished == resource_id =>
                {
                    if let Some(job) = ctx.compression.status(resource_id).await {
                        break job;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => anyhow::bail!("compression events closed"),
            },
            _ = ticker.tick() => {
                if let Some(job) = ctx.compression.status(resource_id).await {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    bar.set_position(job.progress_percent as u64);
                }
            }
        }
    };
    bar.finish_and_clear();

    match job.status {
        CompressionStatus::Completed => {
            println!(
                "✓ Archived {resource_id} to {} ({}).",
                format_optional(job.output_path.as_deref(), "?"),
                format_bytes(job.output_size.unwrap_or_default())
            );
            Ok(())
        }
        _ => {
            let reason = job.error.unwrap_or_else(|| "unknown error".to_string());
            Err(CliError::Compression(reason).into())
        }
    }
}

/// Print stored compression jobs, optionally for one game.
pub async fn status(ctx: &CliContext, resource_id: Option<&str>) -> Result<()> {
    let jobs: Vec<CompressionJob> = ctx
        .repos
        .compression
        .load_jobs()
        .await?
        .into_iter()
        .filter(|job| resource_id.is_none_or(|id| job.resource_id == id))
        .collect();

    if jobs.is_empty() {
        println!("No compression jobs recorded.");
        return Ok(());
    }

    println!(
        "{:<10} {:<12} {:<7} {:<6} {:<9} {:<12} Archive",
        "App", "Status", "Format", "Level", "Progress", "Size"
    );
    print_separator(90);
    for job in &jobs {
        println!(
            "{:<10} {:<12} {:<7} {:<6} {:<9} {:<12} {}",
            truncate_string(&job.resource_id, 10),
            job.status.as_str(),
            job.format,
            job.level,
            format!("{:.0}%", job.progress_percent),
            job.output_size.map_or_else(|| "--".to_string(), format_bytes),
            format_optional(job.output_path.as_deref(), "--"),
        );
    }

    for job in &jobs {
        if let Some(error) = &job.error {
            println!("  {}: {error}", job.resource_id);
        }
        if job.status == CompressionStatus::Completed {
            if let Some(archive) = ctx.repos.compression.get_archive(&job.resource_id).await? {
                println!(
                    "  {} archived {}",
                    archive.resource_id,
                    archive.compressed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

fn percent_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}
