//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::HostEndpoint, BalanceStrategy};

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceStrategy for RoundRobin {
    fn select(&self, hosts: &[Arc<HostEndpoint>]) -> Option<Arc<HostEndpoint>> {
        if hosts.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = hosts.len();
        (0..len)
            .map(|i| &hosts[(start + i) % len])
            .find(|h| !h.is_draining())
            .cloned()
    }
}
