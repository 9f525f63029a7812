//! Settings command handler.

use anyhow::Result;
use gamedock_core::{CompressionFormat, Settings, SettingsUpdate, validate_settings};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::format_optional;
use crate::settings_commands::SettingsCommand;

/// Execute a settings subcommand.
pub async fn execute(ctx: &CliContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => show(ctx).await,
        SettingsCommand::Set {
            max_concurrent_downloads,
            compression_format,
            compression_level,
            auto_compress,
            library_dir,
            archive_dir,
        } => {
            let update = SettingsUpdate {
                max_concurrent_downloads: max_concurrent_downloads.map(Some),
                compression_format: compression_format.map(Some),
                compression_level: compression_level.map(Some),
                auto_compress: auto_compress.map(Some),
                library_dir: library_dir.map(Some),
                archive_dir: archive_dir.map(Some),
            };
            set(ctx, &update).await
        }
        SettingsCommand::Reset => {
            ctx.repos.settings.save(&Settings::with_defaults()).await?;
            println!("✓ Settings reset to defaults.");
            Ok(())
        }
    }
}

async fn show(ctx: &CliContext) -> Result<()> {
    let settings = ctx.repos.settings.load().await?;
    println!("Current application settings:");
    println!(
        "  max_concurrent_downloads: {}",
        settings.effective_max_concurrent_downloads()
    );
    println!(
        "  compression_format:       {}",
        settings.effective_compression_format()
    );
    println!(
        "  compression_level:        {}",
        settings.effective_compression_level()
    );
    println!(
        "  auto_compress:            {}",
        settings.effective_auto_compress()
    );
    println!(
        "  library_dir:              {} (in use: {})",
        format_optional(settings.library_dir.as_deref(), "default"),
        ctx.layout.library_dir().display()
    );
    println!(
        "  archive_dir:              {} (in use: {})",
        format_optional(settings.archive_dir.as_deref(), "default"),
        ctx.layout.archive_dir().display()
    );
    Ok(())
}

/// Merge, validate, and save. Nothing is written when validation fails.
async fn set(ctx: &CliContext, update: &SettingsUpdate) -> Result<()> {
    if is_empty(update) {
        println!("No settings provided. Use --help to see available options.");
        return Ok(());
    }

    let mut settings = ctx.repos.settings.load().await?;
    settings.merge(update);
    validate_settings(&settings).map_err(CliError::from)?;
    ctx.repos.settings.save(&settings).await?;

    println!("✓ Settings updated.");
    if update.max_concurrent_downloads.is_some() {
        println!("  A running 'gamedock run' picks up the new limit on its next refresh.");
    }
    if update.library_dir.is_some() || update.archive_dir.is_some() {
        println!("  New directories apply to the next command.");
    }
    if let Some(Some(format)) = update.compression_format {
        if format == CompressionFormat::TarGz {
            println!("  New archives will be written as .tar.gz.");
        }
    }
    Ok(())
}

const fn is_empty(update: &SettingsUpdate) -> bool {
    update.max_concurrent_downloads.is_none()
        && update.compression_format.is_none()
        && update.compression_level.is_none()
        && update.auto_compress.is_none()
        && update.library_dir.is_none()
        && update.archive_dir.is_none()
}
