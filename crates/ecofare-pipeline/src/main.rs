//! `ecofare`: run one ticket through the pipeline against in-memory backends
//!
//! ```text
//! ecofare <ticket> [rider]
//! echo 'TRANSIT:CAI:ORI:1778576400' | ecofare
//! ```
//!
//! `ECOFARE_CONFIG` points at a YAML config, `ECOFARE_STATIONS` at a station
//! catalog. The outcome or the error body is printed as JSON on stdout.

use anyhow::Context;
use ecofare_core::PipelineConfig;
use ecofare_fraud::{AccountSnapshot, InMemoryAccountHistory};
use ecofare_pipeline::{JourneyPipeline, BUILTIN_STATIONS, DEFAULT_RIDER};
use ecofare_rewards::{InMemoryContractExecutor, InMemoryLedger, InMemoryTokenIssuer};
use ecofare_ticket::{RawTicket, StationCatalog};
use std::io::Read;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecofare=info,ecofare_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::var("ECOFARE_CONFIG") {
        Ok(path) => PipelineConfig::load(&path).with_context(|| format!("loading config {}", path))?,
        Err(_) => PipelineConfig::default(),
    };
    let stations = match std::env::var("ECOFARE_STATIONS") {
        Ok(path) => StationCatalog::load(&path).with_context(|| format!("loading stations {}", path))?,
        Err(_) => StationCatalog::from_yaml_str(BUILTIN_STATIONS).context("built-in station catalog")?,
    };
    tracing::info!(
        version = ecofare_core::ECOFARE_VERSION,
        stations = stations.len(),
        "ecofare starting"
    );

    let mut args = std::env::args().skip(1);
    let ticket = match args.next() {
        Some(ticket) => ticket,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading ticket from stdin")?;
            buf
        }
    };
    let rider = args.next().unwrap_or_else(|| DEFAULT_RIDER.to_string());

    let accounts = InMemoryAccountHistory::new()
        .with_account(rider.as_str(), AccountSnapshot::new(365, 25.0, 3));

    let pipeline = JourneyPipeline::builder()
        .config(config)
        .stations(Arc::new(stations))
        .accounts(Arc::new(accounts))
        .ledger(Arc::new(InMemoryLedger::new()))
        .contract(Arc::new(InMemoryContractExecutor::new()))
        .token_issuer(Arc::new(InMemoryTokenIssuer::new()))
        .build()?;

    match pipeline.process_journey(&RawTicket::from(ticket), &rider).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.to_json())?);
            std::process::exit(if err.is_client_error() { 2 } else { 1 });
        }
    }
}
