//! yvp-pipeline - Precinct reconciliation and scoring
//!
//! Resolves configuration, opens the precinct store and dispatches one
//! subcommand. Configuration is validated before anything touches the store,
//! so a bad config never leaves a ledger row behind.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yvp_common::config::resolve_database_path;
use yvp_common::db::{init_database, DistrictSummary};
use yvp_common::PipelineConfig;
use yvp_pipeline::db::runs;
use yvp_pipeline::{export, PipelineOrchestrator};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting yvp-pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let db_path = resolve_database_path(cli.database.as_deref(), &config);

    if let Command::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config.snapshot())?);
        return Ok(());
    }

    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Command::Run(_) => {
            let orchestrator = PipelineOrchestrator::new(pool.clone(), config);
            let summary = orchestrator.run().await.context("Pipeline run failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Runs { limit } => {
            let threshold = config.ledger.suspect_after_minutes;
            let now = Utc::now();
            for run in runs::list_runs(&pool, limit).await? {
                let suspect = if run.is_suspect(now, threshold) { "  [suspect: still running]" } else { "" };
                println!(
                    "#{:<5} {:<8} started {}  finished {}  scored {}{}{}",
                    run.id,
                    run.status.as_str(),
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.finished_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    run.precincts_scored
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    run.error_message
                        .as_deref()
                        .map(|m| format!("  error: {}", m))
                        .unwrap_or_default(),
                    suspect,
                );
            }
        }
        Command::Export { path } => {
            let written = export::export_scored_precincts(&pool, &path).await?;
            println!("Wrote {} precincts to {}", written, path.display());
        }
        Command::Districts => {
            let summaries = DistrictSummary::fetch_all(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Config => {}
    }

    pool.close().await;
    Ok(())
}

/// Resolve, apply `run` overrides, then validate
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::read(cli.config.as_deref())?;

    if let Command::Run(overrides) = &cli.command {
        overrides.clone().apply(&mut config);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
