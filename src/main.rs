// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use clap::{Parser, Subcommand};
use pool_disputer::app::config::GlobalSettings;
use pool_disputer::app::logging::setup_logging;
use pool_disputer::domain::error::AppError;
use pool_disputer::infrastructure::data::snapshot::{self, SnapshotStore};
use pool_disputer::infrastructure::network::augur::{AugurAddresses, AugurChain};
use pool_disputer::infrastructure::network::price_feed::PriceFeed;
use pool_disputer::infrastructure::network::provider::ConnectionFactory;
use pool_disputer::services::dispute::Policy;
use pool_disputer::services::dispute::scheduler::Scheduler;
use pool_disputer::services::dispute::window::WindowClock;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Funds profitable dispute pools and collects their fees")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,json})
    #[arg(long, global = true)]
    config: Option<String>,

    /// Path to the state file (overrides config/env)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the iteration loop until interrupted
    Run,
    /// Print the effective configuration with secrets redacted
    PrintConfig,
    /// Print a summary and the serialized state
    PrintState,
    /// Replace the state file with an empty snapshot
    ResetState,
}

fn state_path(cli: &Cli, settings: Option<&GlobalSettings>) -> Result<PathBuf, AppError> {
    if let Some(path) = &cli.state {
        return Ok(path.clone());
    }
    match settings {
        Some(settings) => Ok(settings.state_path()),
        None => GlobalSettings::locate_state(cli.config.as_deref()),
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(settings.log_level(), settings.log_json);

    let path = state_path(cli, Some(&settings))?;
    let (store, loaded) = SnapshotStore::open(path).await?;

    let provider = ConnectionFactory::from_url(&settings.http_provider).await?;
    let chain = AugurChain::new(
        provider,
        settings.signer()?,
        AugurAddresses {
            universe: settings.universe_address,
            crowdsourcer_factory: settings.crowdsourcer_factory_address,
            fee_recipient: settings.fee_recipient(),
        },
        settings.dispute_gas_units,
        settings.max_concurrent_queries,
        settings.receipt_timeout(),
    )
    .await?;
    let prices = PriceFeed::new(&settings.price_api_url, &settings.price_symbol)?;
    let policy = Policy::from_settings(&settings)?;
    tracing::info!(
        target: "config",
        wallet = %settings.wallet_address,
        fee_recipient = %policy.fee_recipient,
        min_gas_gwei = settings.min_gas_price_gwei,
        max_gas_gwei = settings.max_gas_price_gwei,
        aggressiveness = settings.aggressiveness,
        "Policy loaded"
    );

    let scheduler = Scheduler::new(
        Arc::new(chain),
        Arc::new(prices),
        policy,
        WindowClock::system(settings.window_end_override),
        store,
        loaded,
    );

    tokio::select! {
        _ = scheduler.run_forever() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| AppError::Initialization(format!("signal handler: {e}")))?;
            tracing::info!(target: "scheduler", "Interrupted, shutting down");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run => run(&cli).await,
        Command::PrintConfig => {
            let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
            println!("{}", settings.redacted_json()?);
            Ok(())
        }
        Command::PrintState => {
            setup_logging("warn", false);
            let path = state_path(&cli, None)?;
            let state = snapshot::load(&path).await?;
            println!("{}", state.summary());
            println!("{}", snapshot::serialize(&state)?);
            Ok(())
        }
        Command::ResetState => {
            setup_logging("info", false);
            let path = state_path(&cli, None)?;
            let state = SnapshotStore::reset(&path).await?;
            println!("{}", state.summary());
            Ok(())
        }
    }
}
