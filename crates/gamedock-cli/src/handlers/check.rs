//! Environment check: SteamCMD install, account mode, and connectivity.

use anyhow::Result;

use crate::bootstrap::{CliContext, STEAM_USER_ENV};
use crate::error::CliError;

/// Run the checks and print a report. Fails when SteamCMD cannot log in.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    println!("SteamCMD:   {}", ctx.steamcmd.display());
    println!(
        "Account:    {}",
        if ctx.authenticated {
            "credentials from environment"
        } else {
            "anonymous"
        }
    );
    println!("Library:    {}", ctx.layout.library_dir().display());
    println!("Archives:   {}", ctx.layout.archive_dir().display());

    if !ctx.steamcmd.is_file() {
        println!("\n✗ SteamCMD was not found.");
        println!("  Install it and put it on PATH, or set GAMEDOCK_STEAMCMD to its location.");
        return Err(CliError::Transfer(format!("{} not found", ctx.steamcmd.display())).into());
    }

    println!("\nChecking connectivity (anonymous login)...");
    if ctx.scheduler.check_connectivity().await {
        println!("✓ SteamCMD reached the content service.");
        if !ctx.authenticated {
            println!("  Set {STEAM_USER_ENV} to download games that need an account.");
        }
        Ok(())
    } else {
        println!("✗ SteamCMD could not log in.");
        Err(CliError::Transfer("connectivity check failed".to_string()).into())
    }
}
