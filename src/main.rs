//! Connection group monitor.
//!
//! Loads a client configuration, seeds the configured connection groups and
//! keeps them reconciled with the file while publishing group gauges.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ loader ──▶ SharedConfig ──▶ reconcile ──▶ ConnectionGroupRegistry
//!        │                          ▲                               │
//!        ▼                          │                               ▼
//!   ConfigWatcher ── updates ───────┘                      MetricsPublisher
//!                                                                   │
//!                                                                   ▼
//!                                                        Prometheus endpoint
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};

use conngroup::config::{load_config, ClientConfig, ConfigWatcher, SharedConfig};
use conngroup::group::{reconcile, ConnectionGroupRegistry};
use conngroup::monitor::MetricsPublisher;
use conngroup::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "conngroup-monitor")]
#[command(about = "Seeds connection groups from config and publishes their metrics", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print group snapshots as JSON and exit
    #[arg(long)]
    dump: bool,
}

async fn next_update(updates: &mut Option<mpsc::UnboundedReceiver<ClientConfig>>) -> Option<ClientConfig> {
    match updates.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    logging::init_logging(&config.observability)?;

    tracing::info!(
        groups = config.groups.len(),
        pin_global_tx = config.xa.pin_global_tx_to_physical_connection,
        "conngroup-monitor v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let registry = Arc::new(ConnectionGroupRegistry::new());
    reconcile(&registry, &config.groups);

    if cli.dump {
        println!("{}", serde_json::to_string_pretty(&registry.snapshot(None))?);
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let interval = Duration::from_secs(config.observability.publish_interval_secs);
    let shared = SharedConfig::new(config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let publisher = tokio::spawn(
        MetricsPublisher::new(Arc::clone(&registry), interval).run(shutdown_tx.subscribe()),
    );

    let mut updates = None;
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            updates = Some(rx);
            Some(watcher.run()?)
        }
        None => None,
    };

    loop {
        tokio::select! {
            Some(next) = next_update(&mut updates) => {
                let previous = shared.replace(next);
                let current = shared.current();
                if previous.xa != current.xa {
                    tracing::info!("XA settings changed; applies to connections opened from now on");
                }
                let report = reconcile(&registry, &current.groups);
                for failure in &report.failures {
                    tracing::warn!(group = %failure.group, host = %failure.host, reason = %failure.reason, "Reconcile failure");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    let _ = publisher.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
