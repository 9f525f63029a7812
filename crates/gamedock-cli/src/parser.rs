//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the gamedock download queue.
#[derive(Parser)]
#[command(name = "gamedock")]
#[command(about = "Queue, download, and archive games with SteamCMD")]
#[command(version)]
pub struct Cli {
    /// Override the library directory for this invocation
    #[arg(long = "library", global = true)]
    pub library_dir: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
