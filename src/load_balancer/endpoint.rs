//! Host endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend host known to a proxy
//! - Track active connections (for Least Connections LB)
//! - Track draining state for graceful removal

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// A single backend host.
#[derive(Debug)]
pub struct HostEndpoint {
    host: String,
    /// Number of currently active connections.
    active_connections: AtomicUsize,
    /// Set once the host is being removed; no new work is routed to it.
    draining: AtomicBool,
}

impl HostEndpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            active_connections: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub(crate) fn set_draining(&self, draining: bool) {
        self.draining.store(draining, Ordering::SeqCst);
    }

    pub(crate) fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement and return the remaining count.
    pub(crate) fn dec_connections(&self) -> usize {
        self.active_connections.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

impl fmt::Display for HostEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// Counters and host list shared between a proxy and its guards.
#[derive(Debug, Default)]
pub(crate) struct ProxyShared {
    pub(crate) hosts: RwLock<Vec<Arc<HostEndpoint>>>,
    pub(crate) active: AtomicU64,
    pub(crate) total: AtomicU64,
    pub(crate) transactions: AtomicU64,
}

impl ProxyShared {
    /// Drop `endpoint` from the host list if it is still listed.
    pub(crate) fn forget(&self, endpoint: &Arc<HostEndpoint>) -> bool {
        let mut hosts = self.hosts.write();
        let before = hosts.len();
        hosts.retain(|h| !Arc::ptr_eq(h, endpoint));
        before != hosts.len()
    }
}

/// A RAII guard for one physical connection to a host.
///
/// Dropping the last guard of a draining host removes the host.
#[derive(Debug)]
pub struct HostGuard {
    endpoint: Arc<HostEndpoint>,
    shared: Arc<ProxyShared>,
}

impl HostGuard {
    /// Caller must have incremented `endpoint` already.
    pub(crate) fn new(endpoint: Arc<HostEndpoint>, shared: Arc<ProxyShared>) -> Self {
        shared.active.fetch_add(1, Ordering::SeqCst);
        shared.total.fetch_add(1, Ordering::SeqCst);
        Self { endpoint, shared }
    }
}

impl Deref for HostGuard {
    type Target = HostEndpoint;
    fn deref(&self) -> &Self::Target {
        &self.endpoint
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        self.shared.active.fetch_sub(1, Ordering::SeqCst);
        let remaining = self.endpoint.dec_connections();
        if remaining == 0 && self.endpoint.is_draining() && self.shared.forget(&self.endpoint) {
            tracing::debug!(host = %self.endpoint, "Drained host released");
        }
    }
}
