//! Load-balancing proxy that takes part in a connection group.
//!
//! # Responsibilities
//! - Pick a host per physical connection using a [`BalanceStrategy`]
//! - Follow group membership changes pushed by the group
//! - Report connection and transaction counters to the group
//!
//! # Design Decisions
//! - Selection and draining serialize on the host list lock, so a draining
//!   host never gets a new connection
//! - `close` unregisters; the group keeps this proxy's lifetime totals

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::group::{ConnectionGroup, ConnectionGroupRegistry, ConnectionId, LoadBalancedProxy};
use crate::load_balancer::endpoint::{HostEndpoint, HostGuard, ProxyShared};
use crate::load_balancer::BalanceStrategy;

pub struct BalancedProxy {
    shared: Arc<ProxyShared>,
    strategy: Box<dyn BalanceStrategy>,
    membership: Mutex<Option<(Arc<ConnectionGroup>, ConnectionId)>>,
}

impl BalancedProxy {
    /// A proxy over `hosts` that is not part of any group.
    pub fn new(strategy: Box<dyn BalanceStrategy>, hosts: &[String]) -> Self {
        let proxy = Self {
            shared: Arc::new(ProxyShared::default()),
            strategy,
            membership: Mutex::new(None),
        };
        proxy.replace_hosts(hosts);
        proxy
    }

    /// Create a proxy and register it with the group `group`.
    ///
    /// `hosts` seed the group if it has no membership yet; the proxy then
    /// adopts whatever membership the group has.
    pub fn join(
        registry: &ConnectionGroupRegistry,
        group: &str,
        hosts: &[String],
        strategy: Box<dyn BalanceStrategy>,
    ) -> Arc<Self> {
        let group = registry.get_or_create(group);
        let proxy = Arc::new(Self::new(strategy, &[]));
        let id = group.register(Arc::clone(&proxy) as Arc<dyn LoadBalancedProxy>, hosts);
        proxy.replace_hosts(&group.initial_hosts());
        tracing::info!(group = %group.name(), connection_id = %id, "Proxy joined group");
        *proxy.membership.lock() = Some((group, id));
        proxy
    }

    fn replace_hosts(&self, hosts: &[String]) {
        let mut current = self.shared.hosts.write();
        for host in hosts {
            if !current.iter().any(|h| h.host() == host) {
                current.push(Arc::new(HostEndpoint::new(host.as_str())));
            }
        }
    }

    /// Id assigned by the group, if joined and not closed.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.membership.lock().as_ref().map(|(_, id)| *id)
    }

    /// Hosts new connections may be routed to.
    pub fn hosts(&self) -> Vec<String> {
        self.shared
            .hosts
            .read()
            .iter()
            .filter(|h| !h.is_draining())
            .map(|h| h.host().to_string())
            .collect()
    }

    /// Open a connection slot on the next host, or `None` if no host is usable.
    pub fn acquire(&self) -> Option<HostGuard> {
        let hosts = self.shared.hosts.read();
        let endpoint = self.strategy.select(&hosts)?;
        endpoint.inc_connections();
        Some(HostGuard::new(endpoint, Arc::clone(&self.shared)))
    }

    pub fn record_transaction(&self) {
        self.shared.transactions.fetch_add(1, Ordering::SeqCst);
    }

    /// Leave the group. Later calls do nothing.
    pub fn close(&self) {
        if let Some((group, id)) = self.membership.lock().take() {
            group.unregister(id);
            tracing::info!(group = %group.name(), connection_id = %id, "Proxy left group");
        }
    }
}

impl LoadBalancedProxy for BalancedProxy {
    fn add_host(&self, host: &str) -> Result<()> {
        let mut hosts = self.shared.hosts.write();
        if let Some(existing) = hosts.iter().find(|h| h.host() == host) {
            existing.set_draining(false);
            return Ok(());
        }
        hosts.push(Arc::new(HostEndpoint::new(host)));
        Ok(())
    }

    fn remove_host(&self, host: &str) -> Result<()> {
        let mut hosts = self.shared.hosts.write();
        hosts.retain(|h| {
            if h.host() == host {
                h.set_draining(true);
                false
            } else {
                true
            }
        });
        Ok(())
    }

    fn remove_host_when_not_in_use(&self, host: &str) -> Result<()> {
        let mut hosts = self.shared.hosts.write();
        if let Some(endpoint) = hosts.iter().find(|h| h.host() == host).cloned() {
            endpoint.set_draining(true);
            if endpoint.active_connections() == 0 {
                hosts.retain(|h| h.host() != host);
            } else {
                tracing::debug!(host = %host, active = endpoint.active_connections(), "Draining host");
            }
        }
        Ok(())
    }

    fn active_physical_connection_count(&self) -> u64 {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn total_physical_connection_count(&self) -> u64 {
        self.shared.total.load(Ordering::SeqCst)
    }

    fn transaction_count(&self) -> u64 {
        self.shared.transactions.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for BalancedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancedProxy")
            .field("hosts", &self.hosts())
            .field("connection_id", &self.connection_id())
            .finish()
    }
}
