//! Flotilla daemon - registers a fleet of clusters and runs the sync loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flotilla::config::FleetConfig;
use flotilla_common::store::MemoryStore;
use flotilla_common::DEFAULT_SYNC_INTERVAL_SECS;
use flotilla_engine::Engine;

/// Flotilla - aggregate Flux state across a fleet of Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "flotilla", version, about, long_about = None)]
struct Cli {
    /// Path to the fleet configuration file
    #[arg(short = 'f', long = "config", env = "FLOTILLA_CONFIG")]
    config_file: PathBuf,

    /// Process-wide sync interval in seconds
    #[arg(
        long,
        env = "FLOTILLA_SYNC_INTERVAL",
        default_value_t = DEFAULT_SYNC_INTERVAL_SECS
    )]
    sync_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let fleet = FleetConfig::load(&cli.config_file)?;

    let engine = Engine::builder(Arc::new(MemoryStore::new()))
        .sync_interval(Duration::from_secs(cli.sync_interval))
        .build();

    // Register the fleet. A cluster that fails registration is skipped, not
    // fatal: it can be re-registered once its credential or network is fixed.
    let credentials = fleet.credential_source();
    let mut registered = 0usize;
    for entry in &fleet.clusters {
        match engine
            .register_from(&credentials, &entry.id, entry.sync_interval())
            .await
        {
            Ok(()) => registered += 1,
            Err(e) => {
                warn!(cluster = %entry.id, error = %e, "Failed to register cluster, skipping");
            }
        }
    }

    if registered == 0 {
        error!("No cluster could be registered, exiting");
        anyhow::bail!("no registerable clusters in fleet config");
    }
    info!(registered, total = fleet.clusters.len(), "Fleet registered");

    let worker = engine.worker();
    tokio::select! {
        _ = worker.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c, shutting down");
        }
    }

    Ok(())
}
