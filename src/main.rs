//! Refdata Indexer
//!
//! Usage: refdata-indexer [--config <path>] <command>
//!
//! `serve` runs the startup load and the rebuild schedules until Ctrl-C; the
//! other commands run one operation against the configured stores and exit.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use refdata_indexer::{Indexer, IndexerConfig, RebuildStatus, StartupMode};

#[derive(Parser)]
#[command(name = "refdata-indexer")]
#[command(about = "Search index maintenance for the reference-data catalog")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "REFDATA_INDEXER_CONFIG", default_value = "config/indexer.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run startup loads, then rebuild on schedule until interrupted
    Serve,

    /// Rebuild one alias now
    Rebuild {
        /// Alias to rebuild
        alias: String,
    },

    /// Rebuild every configured alias now
    ReindexAll,

    /// Show alias resolution and rebuild state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,refdata_indexer=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(path = %cli.config, "Loading configuration");
    let config = IndexerConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    let indexer = Indexer::connect(config).await?;

    match cli.command {
        Command::Serve => serve(indexer).await,
        Command::Rebuild { alias } => {
            let outcome = indexer.builder.rebuild(&alias).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.status == RebuildStatus::Failed {
                anyhow::bail!("rebuild of {alias} failed");
            }
            Ok(())
        }
        Command::ReindexAll => {
            let outcomes = indexer.builder.reindex_everything().await;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            let failed = outcomes
                .iter()
                .filter(|o| o.status == RebuildStatus::Failed)
                .count();
            if failed > 0 {
                anyhow::bail!("{failed} of {} rebuilds failed", outcomes.len());
            }
            Ok(())
        }
        Command::Status => status(&indexer).await,
    }
}

async fn serve(indexer: Indexer) -> Result<()> {
    let Indexer {
        config,
        builder,
        orchestrator,
        scheduler,
        ..
    } = indexer;

    tracing::info!(aliases = ?builder.aliases(), "Starting refdata indexer");

    let initialization = match config.scheduler.startup_mode {
        StartupMode::Sync => {
            tracing::info!("Performing synchronous initialization");
            let report = orchestrator.initialize().await?;
            tracing::info!(success = report.is_success(), "Initialization finished");
            None
        }
        StartupMode::Async => {
            tracing::info!("Starting asynchronous initialization");
            Some(tokio::spawn(async move {
                match orchestrator.initialize().await {
                    Ok(report) => {
                        tracing::info!(success = report.is_success(), "Initialization finished")
                    }
                    Err(e) => tracing::error!(error = %e, "Initialization failed"),
                }
            }))
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = if config.scheduler.enabled {
        scheduler.spawn(shutdown_rx)
    } else {
        tracing::info!("Schedules disabled");
        Vec::new()
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "schedule task ended abnormally");
        }
    }
    if let Some(initialization) = initialization {
        if !initialization.is_finished() {
            tracing::info!("Waiting for initialization to finish");
        }
        if let Err(e) = initialization.await {
            tracing::warn!(error = %e, "initialization task ended abnormally");
        }
    }

    Ok(())
}

async fn status(indexer: &Indexer) -> Result<()> {
    let mut aliases = Vec::new();
    for alias in indexer.builder.aliases() {
        aliases.push(indexer.builder.alias_status(alias).await?);
    }

    let report = serde_json::json!({
        "initializing": indexer.orchestrator.is_initializing().await?,
        "aliases": aliases,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
