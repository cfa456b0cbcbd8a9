//! Periodic publication of group gauges.
//!
//! # Responsibilities
//! - Refresh per-group gauges on a fixed interval
//! - Stop on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::group::ConnectionGroupRegistry;
use crate::observability::metrics;

pub struct MetricsPublisher {
    registry: Arc<ConnectionGroupRegistry>,
    interval: Duration,
}

impl MetricsPublisher {
    pub fn new(registry: Arc<ConnectionGroupRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Publish until shutdown. Returns the number of publish rounds run.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        tracing::info!(interval_secs = self.interval.as_secs(), "Metrics publisher starting");

        let mut ticker = time::interval(self.interval);
        let mut rounds = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let groups = metrics::publish_group_metrics(&self.registry);
                    rounds += 1;
                    tracing::trace!(groups, "Published group metrics");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Metrics publisher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
        rounds
    }
}
