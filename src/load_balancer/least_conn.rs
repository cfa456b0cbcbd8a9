//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::HostEndpoint, BalanceStrategy};

/// Least connections selector.
/// Selects the host with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl BalanceStrategy for LeastConnections {
    fn select(&self, hosts: &[Arc<HostEndpoint>]) -> Option<Arc<HostEndpoint>> {
        // In case of tie, the first one is selected (stability)
        hosts
            .iter()
            .filter(|h| !h.is_draining())
            .min_by_key(|h| h.active_connections())
            .cloned()
    }
}
