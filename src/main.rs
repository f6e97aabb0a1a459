//! Finsight CLI entry point.

use anyhow::Result;
use clap::Parser;
use finsight::cli::{commands, Cli, Commands};
use finsight::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("finsight={log_level}")),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Analyze { input, force } => {
            commands::run_analyze(input, *force, settings).await?;
        }

        Commands::Extract { transcript, title, id, date } => {
            commands::run_extract(transcript, title.clone(), id.clone(), date.clone(), settings)
                .await?;
        }

        Commands::Reprocess { id, date } => {
            commands::run_reprocess(id, date, settings).await?;
        }

        Commands::Batch { input, playlist, limit, force } => {
            commands::run_batch(input, *playlist, *limit, *force, settings).await?;
        }

        Commands::Aggregate { date } => {
            commands::run_aggregate(date.as_deref(), settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
