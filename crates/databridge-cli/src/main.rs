use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use databridge_core::SystemClock;
use databridge_insights::{HealthWeights, Insights};
use databridge_sync::{BridgeConfig, Notifier, SyncEngine};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "databridge")]
#[command(about = "Agency data bridge: cross-collection sync and client insights")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Commands {
    /// Run every sync rule once and print the report.
    Sync,
    /// Everything known about one client, with its health score.
    Overview { client: String },
    Dashboard,
    /// Sorted list of every known client name.
    Clients,
    Notifications {
        #[arg(long)]
        unread: bool,
    },
    /// Serve the JSON API (and the cron sync when enabled).
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DATABRIDGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let format = env::var("DATABRIDGE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("encoding output")?;
    println!("{text}");
    Ok(())
}

fn insights(config: &BridgeConfig) -> Result<Insights> {
    let weights = HealthWeights::from_yaml_file(&config.health_rules_path())?;
    Ok(Insights::new(config.open_store()?).with_weights(weights))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = BridgeConfig::from_env();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let engine = SyncEngine::new(config.open_store()?);
            let report = engine.run_all();
            info!(total = report.total(), data_dir = %config.data_dir.display(), "sync complete");
            print_json(&report)?;
        }
        Commands::Overview { client } => {
            print_json(&insights(&config)?.client_overview(&client))?;
        }
        Commands::Dashboard => {
            print_json(&insights(&config)?.dashboard_stats())?;
        }
        Commands::Clients => {
            print_json(&insights(&config)?.all_client_names())?;
        }
        Commands::Notifications { unread } => {
            let notifier = Notifier::new(config.open_store()?, Arc::new(SystemClock));
            let list = notifier
                .list()
                .into_iter()
                .filter(|n| !unread || !n.read)
                .collect::<Vec<_>>();
            print_json(&list)?;
        }
        Commands::Serve => {
            databridge_web::serve_from_env().await?;
        }
    }

    Ok(())
}
