//! Main commands enum.
//!
//! Queue commands edit the persistent queue and return; `run` is the
//! foreground process that admits entries and drives the transfers.

use clap::Subcommand;
use gamedock_core::CompressionFormat;

use crate::settings_commands::SettingsCommand;

/// Available commands for the download queue.
#[derive(Subcommand)]
pub enum Commands {
    /// Add a game to the back of the download queue
    Enqueue {
        /// Store app id of the game (e.g., "570")
        resource_id: String,
        /// Display title; looked up from the store when omitted
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show every queue entry
    List {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop an active download and keep its entry
    Pause {
        /// Queue entry id
        id: i64,
    },

    /// Put a paused or failed entry back at the end of the queue
    Resume {
        /// Queue entry id
        id: i64,
    },

    /// Cancel a queued, active, or paused entry
    Cancel {
        /// Queue entry id
        id: i64,
    },

    /// Delete an entry from the queue, canceling it first if needed
    Remove {
        /// Queue entry id
        id: i64,
    },

    /// Reorder queued entries; ids not listed keep their relative order after these
    Reorder {
        /// Queue entry ids in the desired order
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },

    /// Archive an installed game
    Compress {
        /// Store app id of the installed game
        resource_id: String,
        /// Archive format: zip or tar_gz (defaults to the configured format)
        #[arg(long)]
        format: Option<CompressionFormat>,
        /// Compression level 0-9 (defaults to the configured level)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: Option<u32>,
    },

    /// Show archive jobs and finished archives
    CompressionStatus {
        /// Limit output to one game
        resource_id: Option<String>,
    },

    /// View or change application settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Check that SteamCMD is installed and can reach the network
    Check,

    /// Run the queue in the foreground until it is idle
    Run {
        /// Keep running after the queue drains, waiting for new entries
        #[arg(long)]
        watch: bool,
        /// Seconds between progress refreshes
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
}
