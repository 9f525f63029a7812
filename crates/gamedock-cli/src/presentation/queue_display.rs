//! Queue entry rendering.

use gamedock_core::{EntryStatus, QueueEntry};

use super::tables::{format_optional, print_separator, truncate_string};

const KIB: f64 = 1024.0;

/// Human-readable byte count using binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= KIB && unit < UNITS.len() - 1 {
        value /= KIB;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Throughput as bytes per second.
pub fn format_rate(rate_bps: Option<f64>) -> String {
    match rate_bps {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(rate) if rate.is_finite() && rate > 0.0 => {
            format!("{}/s", format_bytes(rate as u64))
        }
        _ => "--".to_string(),
    }
}

/// Remaining time as `h:mm:ss` or `m:ss`.
pub fn format_eta(eta_seconds: Option<u64>) -> String {
    let Some(secs) = eta_seconds else {
        return "--".to_string();
    };
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Progress column: percent while it means something, else a status hint.
pub fn progress_cell(entry: &QueueEntry) -> String {
    match entry.status {
        EntryStatus::Active if entry.awaiting_second_factor => "needs code".to_string(),
        EntryStatus::Active | EntryStatus::Paused | EntryStatus::Completed => {
            format!("{:.1}%", entry.progress_percent)
        }
        EntryStatus::Queued => format!("#{}", format_optional(entry.queue_position, "?")),
        EntryStatus::Failed | EntryStatus::Canceled => "--".to_string(),
    }
}

/// Print entries as a table, followed by any failure reasons.
pub fn print_entry_table(entries: &[QueueEntry]) {
    println!(
        "{:<5} {:<10} {:<28} {:<10} {:<10} {:<12} {:<8}",
        "ID", "App", "Title", "Status", "Progress", "Rate", "ETA"
    );
    print_separator(88);

    for entry in entries {
        println!(
            "{:<5} {:<10} {:<28} {:<10} {:<10} {:<12} {:<8}",
            entry.id,
            truncate_string(&entry.resource_id, 10),
            truncate_string(entry.title(), 27),
            entry.status,
            progress_cell(entry),
            format_rate(entry.transfer_rate),
            format_eta(entry.eta_seconds),
        );
    }

    for entry in entries {
        if let Some(error) = &entry.error_message {
            println!("  #{} {}: {error}", entry.id, entry.title());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gamedock_core::{EntryId, ResourceMetadata};

    fn entry(status: EntryStatus) -> QueueEntry {
        QueueEntry {
            id: EntryId::new(1),
            resource_id: "570".into(),
            metadata: ResourceMetadata::titled("Dota 2"),
            status,
            progress_percent: 42.3,
            bytes_downloaded: 0,
            bytes_total: None,
            transfer_rate: None,
            eta_seconds: None,
            queue_position: None,
            error_message: None,
            awaiting_second_factor: false,
            install_dir: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn test_format_rate_and_eta() {
        assert_eq!(format_rate(None), "--");
        assert_eq!(format_rate(Some(0.0)), "--");
        assert_eq!(format_rate(Some(2048.0)), "2.0 KiB/s");
        assert_eq!(format_eta(Some(75)), "1:15");
        assert_eq!(format_eta(Some(3661)), "1:01:01");
        assert_eq!(format_eta(None), "--");
    }

    #[test]
    fn test_progress_cell_by_status() {
        assert_eq!(progress_cell(&entry(EntryStatus::Active)), "42.3%");

        let mut waiting = entry(EntryStatus::Active);
        waiting.awaiting_second_factor = true;
        assert_eq!(progress_cell(&waiting), "needs code");

        let mut queued = entry(EntryStatus::Queued);
        queued.queue_position = Some(3);
        assert_eq!(progress_cell(&queued), "#3");

        assert_eq!(progress_cell(&entry(EntryStatus::Canceled)), "--");
    }
}
