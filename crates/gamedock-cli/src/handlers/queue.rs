//! Queue command handlers.
//!
//! These edit the persistent queue and return. Transfers only start in a
//! process running `gamedock run`.

use anyhow::Result;
use gamedock_core::{EntryId, QueueEntry, ResourceMetadata};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::print_entry_table;

/// Add a game to the back of the queue.
///
/// Without a title the store page is consulted; an unknown app id is
/// rejected, while an unreachable store falls back to the bare id.
pub async fn enqueue(ctx: &CliContext, resource_id: &str, title: Option<String>) -> Result<()> {
    let entry = match title {
        Some(title) => {
            ctx.scheduler
                .enqueue(resource_id, ResourceMetadata::titled(title))
                .await
        }
        None => ctx.scheduler.enqueue_resolved(resource_id).await,
    }
    .map_err(CliError::from)?;

    println!(
        "✓ Queued {} ({}) as entry #{} at position {}.",
        entry.title(),
        entry.resource_id,
        entry.id,
        entry.queue_position.unwrap_or_default()
    );
    println!("Run 'gamedock run' to start downloading.");
    Ok(())
}

/// Print every entry, or the snapshot as JSON.
pub async fn list(ctx: &CliContext, json: bool) -> Result<()> {
    let snapshot = ctx.scheduler.snapshot().await.map_err(CliError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.entries.is_empty() {
        println!("The download queue is empty.");
        println!("Use 'gamedock enqueue <app_id>' to add a game.");
        return Ok(());
    }

    println!(
        "{} active, {} queued, limit {}:\n",
        snapshot.active_count, snapshot.queued_count, snapshot.max_concurrent
    );
    print_entry_table(&snapshot.entries);
    Ok(())
}

pub async fn pause(ctx: &CliContext, id: i64) -> Result<()> {
    let entry = ctx
        .scheduler
        .pause(EntryId::new(id))
        .await
        .map_err(CliError::from)?;
    report("Paused", &entry);
    Ok(())
}

pub async fn resume(ctx: &CliContext, id: i64) -> Result<()> {
    let entry = ctx
        .scheduler
        .resume(EntryId::new(id))
        .await
        .map_err(CliError::from)?;
    report("Requeued", &entry);
    Ok(())
}

pub async fn cancel(ctx: &CliContext, id: i64) -> Result<()> {
    let entry = ctx
        .scheduler
        .cancel(EntryId::new(id))
        .await
        .map_err(CliError::from)?;
    report("Canceled", &entry);
    Ok(())
}

pub async fn remove(ctx: &CliContext, id: i64) -> Result<()> {
    ctx.scheduler
        .remove(EntryId::new(id))
        .await
        .map_err(CliError::from)?;
    println!("✓ Removed entry #{id}.");
    Ok(())
}

/// Apply a new order to the queued entries.
pub async fn reorder(ctx: &CliContext, ids: &[i64]) -> Result<()> {
    let order: Vec<EntryId> = ids.iter().copied().map(EntryId::new).collect();
    let moved = ctx
        .scheduler
        .reorder(&order)
        .await
        .map_err(CliError::from)?;
    println!("✓ Reordered {moved} queued entr{}.", if moved == 1 { "y" } else { "ies" });

    let queued = ctx.scheduler.get_queued().await.map_err(CliError::from)?;
    if !queued.is_empty() {
        println!();
        print_entry_table(&queued);
    }
    Ok(())
}

fn report(verb: &str, entry: &QueueEntry) {
    match entry.queue_position {
        Some(position) => println!(
            "✓ {verb} #{} {} (position {position}).",
            entry.id,
            entry.title()
        ),
        None => println!("✓ {verb} #{} {}.", entry.id, entry.title()),
    }
}
