use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use gamedock_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            eprintln!("Error: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let runs_transfers = matches!(command, Commands::Run { .. });
    let config = CliConfig::with_defaults()?
        .with_library_override(cli.library_dir)
        .running_transfers(runs_transfers);
    let ctx = bootstrap(config).await?;

    match command {
        Commands::Enqueue { resource_id, title } => {
            handlers::queue::enqueue(&ctx, &resource_id, title).await?;
        }
        Commands::List { json } => handlers::queue::list(&ctx, json).await?,
        Commands::Pause { id } => handlers::queue::pause(&ctx, id).await?,
        Commands::Resume { id } => handlers::queue::resume(&ctx, id).await?,
        Commands::Cancel { id } => handlers::queue::cancel(&ctx, id).await?,
        Commands::Remove { id } => handlers::queue::remove(&ctx, id).await?,
        Commands::Reorder { ids } => handlers::queue::reorder(&ctx, &ids).await?,
        Commands::Compress {
            resource_id,
            format,
            level,
        } => {
            handlers::compression::compress(&ctx, &resource_id, format, level).await?;
        }
        Commands::CompressionStatus { resource_id } => {
            handlers::compression::status(&ctx, resource_id.as_deref()).await?;
        }
        Commands::Settings { command } => handlers::settings::execute(&ctx, command).await?,
        Commands::Check => handlers::check::execute(&ctx).await?,
        Commands::Run { watch, interval } => {
            let summary =
                handlers::run::execute(&ctx, watch, Duration::from_secs(interval)).await?;
            if summary.failed > 0 {
                return Err(CliError::Queue(format!("{} download(s) failed", summary.failed)).into());
            }
        }
    }

    Ok(())
}
