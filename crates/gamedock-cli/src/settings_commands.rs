//! Settings subcommands.

use clap::Subcommand;
use gamedock_core::CompressionFormat;

/// Settings command variants.
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show all current application settings
    Show,
    /// Update application settings
    Set {
        /// Number of simultaneous downloads (1-16)
        #[arg(long)]
        max_concurrent_downloads: Option<u32>,
        /// Default archive format: zip or tar_gz
        #[arg(long)]
        compression_format: Option<CompressionFormat>,
        /// Default compression level (0-9)
        #[arg(long)]
        compression_level: Option<u32>,
        /// Archive each download automatically when it completes
        #[arg(long)]
        auto_compress: Option<bool>,
        /// Directory games are installed into
        #[arg(long)]
        library_dir: Option<String>,
        /// Directory archives are written to
        #[arg(long)]
        archive_dir: Option<String>,
    },
    /// Reset all settings to defaults
    Reset,
}
