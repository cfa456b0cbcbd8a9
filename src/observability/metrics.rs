//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define connection-layer metrics (hosts, connections, transactions, XA calls)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-group gauges
//!
//! # Metrics
//! - `conngroup_active_hosts` (gauge, `group`)
//! - `conngroup_total_hosts` (gauge, `group`)
//! - `conngroup_active_logical_connections` (gauge, `group`)
//! - `conngroup_total_logical_connections` (gauge, `group`)
//! - `conngroup_active_physical_connections` (gauge, `group`)
//! - `conngroup_total_physical_connections` (gauge, `group`)
//! - `conngroup_total_transactions` (gauge, `group`)
//! - `conngroup_xa_operations_total` (counter, `op`, `outcome`)
//! - `conngroup_logical_handles_total` (counter, `kind`)
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Group gauges are refreshed from snapshots, not updated inline

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::group::{ConnectionGroupRegistry, GroupSnapshot};

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn publish_snapshot(snapshot: &GroupSnapshot) {
    let group = snapshot.name.clone();
    metrics::gauge!("conngroup_active_hosts", "group" => group.clone())
        .set(snapshot.active_host_count as f64);
    metrics::gauge!("conngroup_total_hosts", "group" => group.clone())
        .set(snapshot.total_host_count() as f64);
    metrics::gauge!("conngroup_active_logical_connections", "group" => group.clone())
        .set(snapshot.active_logical_connections as f64);
    metrics::gauge!("conngroup_total_logical_connections", "group" => group.clone())
        .set(snapshot.total_logical_connections as f64);
    metrics::gauge!("conngroup_active_physical_connections", "group" => group.clone())
        .set(snapshot.active_physical_connections as f64);
    metrics::gauge!("conngroup_total_physical_connections", "group" => group.clone())
        .set(snapshot.total_physical_connections as f64);
    metrics::gauge!("conngroup_total_transactions", "group" => group)
        .set(snapshot.total_transactions as f64);
}

/// Refresh every group's gauges. Returns the number of groups published.
pub fn publish_group_metrics(registry: &ConnectionGroupRegistry) -> usize {
    let snapshots = registry.snapshot(None);
    for snapshot in &snapshots {
        publish_snapshot(snapshot);
    }
    snapshots.len()
}

/// Record an XA call routed through a multiplexer.
pub fn record_xa_operation(op: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("conngroup_xa_operations_total", "op" => op, "outcome" => outcome).increment(1);
}

/// Record a logical handle handed out by a pooled connection.
pub fn record_handle_issued(for_xa: bool) {
    let kind = if for_xa { "xa" } else { "plain" };
    metrics::counter!("conngroup_logical_handles_total", "kind" => kind).increment(1);
}
