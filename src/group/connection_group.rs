//! A named group of backend hosts and the proxies using it.
//!
//! # Responsibilities
//! - Own host membership (active and ever-removed hosts)
//! - Register / unregister load-balancing proxies under increasing ids
//! - Keep lifetime statistics of closed proxies (carry-forward totals)
//! - Propagate host changes to registered proxies
//!
//! # Design Decisions
//! - Membership and carry-forward counters share one lock; the proxy
//!   registry has its own. When both are held, membership is taken first.
//! - Proxy callbacks run on a snapshot, outside both locks

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::group::member::{ConnectionId, LoadBalancedProxy};

#[derive(Debug, Default)]
struct Membership {
    seeded: bool,
    hosts: BTreeSet<String>,
    closed_hosts: BTreeSet<String>,
    active_host_count: usize,
    total_logical: u64,
    active_logical: u64,
    closed_proxy_physical: u64,
    closed_proxy_transactions: u64,
}

impl Membership {
    /// Seed membership once. Returns true if this call did the seeding.
    fn seed(&mut self, hosts: &[String]) -> bool {
        if self.seeded {
            return false;
        }
        self.hosts.extend(hosts.iter().cloned());
        self.active_host_count = self.hosts.len();
        self.seeded = true;
        true
    }
}

/// One named collection of backend hosts.
pub struct ConnectionGroup {
    name: String,
    membership: Mutex<Membership>,
    proxies: Mutex<HashMap<ConnectionId, Arc<dyn LoadBalancedProxy>>>,
}

impl ConnectionGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            membership: Mutex::new(Membership::default()),
            proxies: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seed membership if no proxy or earlier call has done so yet.
    ///
    /// Returns true if this call seeded the group.
    pub fn initialize_hosts(&self, hosts: &[String]) -> bool {
        let seeded = self.membership.lock().seed(hosts);
        if seeded {
            tracing::debug!(group = %self.name, hosts = hosts.len(), "Seeded group membership");
        }
        seeded
    }

    /// True once membership has been seeded.
    pub fn is_initialized(&self) -> bool {
        self.membership.lock().seeded
    }

    /// Register a proxy. The first registration seeds membership from `initial_hosts`.
    pub fn register(&self, proxy: Arc<dyn LoadBalancedProxy>, initial_hosts: &[String]) -> ConnectionId {
        let mut membership = self.membership.lock();
        membership.seed(initial_hosts);
        membership.total_logical += 1;
        membership.active_logical += 1;
        let id = ConnectionId::new(membership.total_logical);
        self.proxies.lock().insert(id, proxy);
        drop(membership);

        tracing::debug!(group = %self.name, connection_id = %id, "Proxy registered");
        id
    }

    /// Unregister a proxy, folding its lifetime totals into the group's.
    ///
    /// Returns false if `id` was not registered.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut membership = self.membership.lock();
        let Some(proxy) = self.proxies.lock().remove(&id) else {
            return false;
        };
        membership.active_logical -= 1;
        membership.closed_proxy_physical += proxy.total_physical_connection_count();
        membership.closed_proxy_transactions += proxy.transaction_count();
        drop(membership);

        tracing::debug!(group = %self.name, connection_id = %id, "Proxy unregistered");
        true
    }

    fn proxy_snapshot(&self) -> Vec<Arc<dyn LoadBalancedProxy>> {
        self.proxies.lock().values().cloned().collect()
    }

    /// Run `action` on every registered proxy; report the first failure.
    fn propagate(
        &self,
        host: &str,
        action: &str,
        f: impl Fn(&dyn LoadBalancedProxy) -> Result<()>,
    ) -> Result<()> {
        let mut first_err = None;
        for proxy in self.proxy_snapshot() {
            if let Err(err) = f(proxy.as_ref()) {
                tracing::warn!(group = %self.name, host = %host, action, error = %err, "Proxy rejected host change");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Add `host` to the group (no-op if present), optionally pushing it to
    /// every registered proxy.
    pub fn add_host(&self, host: &str, apply_to_existing: bool) -> Result<()> {
        let added = {
            let mut membership = self.membership.lock();
            let added = membership.hosts.insert(host.to_string());
            if added {
                membership.active_host_count += 1;
            }
            added
        };
        if added {
            tracing::info!(group = %self.name, host = %host, "Host added");
        }

        if !apply_to_existing {
            return Ok(());
        }
        self.propagate(host, "add", |proxy| proxy.add_host(host))
    }

    /// Remove `host` from the group.
    ///
    /// Fails with [`Error::LastActiveHost`] when it is the only active host and
    /// with [`Error::HostNotFound`] when it is not a member. With
    /// `remove_from_existing`, proxies drop the host immediately, or once it
    /// is idle when `graceful` is set.
    pub fn remove_host(&self, host: &str, remove_from_existing: bool, graceful: bool) -> Result<()> {
        {
            let mut membership = self.membership.lock();
            if membership.active_host_count == 1 {
                return Err(Error::LastActiveHost {
                    group: self.name.clone(),
                    host: host.to_string(),
                });
            }
            if !membership.hosts.remove(host) {
                return Err(Error::HostNotFound {
                    group: self.name.clone(),
                    host: host.to_string(),
                });
            }
            membership.active_host_count -= 1;
            membership.closed_hosts.insert(host.to_string());
        }
        tracing::info!(group = %self.name, host = %host, graceful, "Host removed");

        if !remove_from_existing {
            return Ok(());
        }
        if graceful {
            self.propagate(host, "drain", |proxy| proxy.remove_host_when_not_in_use(host))
        } else {
            self.propagate(host, "remove", |proxy| proxy.remove_host(host))
        }
    }

    pub fn active_host_count(&self) -> usize {
        self.membership.lock().active_host_count
    }

    /// Current membership, sorted.
    pub fn initial_hosts(&self) -> Vec<String> {
        self.membership.lock().hosts.iter().cloned().collect()
    }

    pub fn has_host(&self, host: &str) -> bool {
        self.membership.lock().hosts.contains(host)
    }

    /// Every host ever removed from the group, sorted.
    pub fn closed_hosts(&self) -> Vec<String> {
        self.membership.lock().closed_hosts.iter().cloned().collect()
    }

    pub fn total_logical_connection_count(&self) -> u64 {
        self.membership.lock().total_logical
    }

    pub fn active_logical_connection_count(&self) -> u64 {
        self.membership.lock().active_logical
    }

    /// Ids of the currently registered proxies, sorted.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.proxies.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn active_physical_connection_count(&self) -> u64 {
        self.proxy_snapshot()
            .iter()
            .map(|p| p.active_physical_connection_count())
            .sum()
    }

    /// Carry-forward totals and live proxies, captured together.
    fn totals_snapshot(&self) -> (u64, u64, Vec<Arc<dyn LoadBalancedProxy>>) {
        let membership = self.membership.lock();
        let proxies = self.proxy_snapshot();
        (
            membership.closed_proxy_physical,
            membership.closed_proxy_transactions,
            proxies,
        )
    }

    pub fn total_physical_connection_count(&self) -> u64 {
        let (closed, _, proxies) = self.totals_snapshot();
        closed
            + proxies
                .iter()
                .map(|p| p.total_physical_connection_count())
                .sum::<u64>()
    }

    pub fn total_transaction_count(&self) -> u64 {
        let (_, closed, proxies) = self.totals_snapshot();
        closed + proxies.iter().map(|p| p.transaction_count()).sum::<u64>()
    }
}

impl fmt::Debug for ConnectionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let membership = self.membership.lock();
        f.debug_struct("ConnectionGroup")
            .field("name", &self.name)
            .field("hosts", &membership.hosts)
            .field("closed_hosts", &membership.closed_hosts)
            .field("active_logical", &membership.active_logical)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::StubProxy;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_remove_down_to_last_host() {
        let group = ConnectionGroup::new("G");
        group.register(Arc::new(StubProxy::default()), &hosts(&["h1", "h2", "h3"]));

        group.remove_host("h1", false, false).unwrap();
        group.remove_host("h2", false, false).unwrap();
        assert_eq!(group.active_host_count(), 1);

        let err = group.remove_host("h3", false, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(group.initial_hosts(), hosts(&["h3"]));
        assert_eq!(group.closed_hosts(), hosts(&["h1", "h2"]));
    }

    #[test]
    fn test_remove_unknown_host() {
        let group = ConnectionGroup::new("G");
        group.initialize_hosts(&hosts(&["h1", "h2"]));

        let err = group.remove_host("h9", true, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(group.active_host_count(), 2);
    }

    #[test]
    fn test_seeding_happens_once() {
        let group = ConnectionGroup::new("G");
        let first = group.register(Arc::new(StubProxy::default()), &hosts(&["h1", "h2"]));
        let second = group.register(Arc::new(StubProxy::default()), &hosts(&["h7"]));

        assert!(second > first);
        assert_eq!(group.initial_hosts(), hosts(&["h1", "h2"]));
        assert!(!group.initialize_hosts(&hosts(&["h8"])));
    }

    #[test]
    fn test_add_host_is_idempotent_for_membership() {
        let group = ConnectionGroup::new("G");
        group.initialize_hosts(&hosts(&["h1"]));

        group.add_host("h2", false).unwrap();
        group.add_host("h2", false).unwrap();
        assert_eq!(group.active_host_count(), 2);
    }

    #[test]
    fn test_add_host_propagates_to_existing() {
        let group = ConnectionGroup::new("G");
        let a = Arc::new(StubProxy::default());
        let b = Arc::new(StubProxy::default());
        group.register(a.clone(), &hosts(&["h1"]));
        group.register(b.clone(), &hosts(&["h1"]));

        group.add_host("h2", true).unwrap();
        assert_eq!(a.calls(), vec!["add h2"]);
        assert_eq!(b.calls(), vec!["add h2"]);

        group.add_host("h3", false).unwrap();
        assert_eq!(a.calls().len(), 1);
    }

    #[test]
    fn test_remove_host_graceful_and_immediate() {
        let group = ConnectionGroup::new("G");
        let proxy = Arc::new(StubProxy::default());
        group.register(proxy.clone(), &hosts(&["h1", "h2", "h3"]));

        group.remove_host("h1", true, true).unwrap();
        group.remove_host("h2", true, false).unwrap();
        assert_eq!(proxy.calls(), vec!["drain h1", "remove h2"]);
    }

    #[test]
    fn test_proxy_failure_is_reported_after_membership_change() {
        let group = ConnectionGroup::new("G");
        let failing = Arc::new(StubProxy::default());
        failing.fail_host_changes(true);
        let healthy = Arc::new(StubProxy::default());
        group.register(failing.clone(), &hosts(&["h1", "h2"]));
        group.register(healthy.clone(), &hosts(&["h1", "h2"]));

        assert!(group.remove_host("h1", true, false).is_err());
        assert_eq!(group.initial_hosts(), hosts(&["h2"]));
        assert_eq!(healthy.calls(), vec!["remove h1"]);
    }

    #[test]
    fn test_carry_forward_is_lossless() {
        let group = ConnectionGroup::new("G");
        let a = Arc::new(StubProxy::with_counts(1, 5, 3));
        let b = Arc::new(StubProxy::with_counts(2, 4, 1));
        let id_a = group.register(a, &hosts(&["h1"]));
        group.register(b, &hosts(&["h1"]));

        assert_eq!(group.total_logical_connection_count(), 2);
        assert_eq!(group.active_logical_connection_count(), 2);
        let physical_before = group.total_physical_connection_count();
        let tx_before = group.total_transaction_count();
        assert_eq!(physical_before, 9);
        assert_eq!(tx_before, 4);

        assert!(group.unregister(id_a));
        assert!(!group.unregister(id_a));

        assert_eq!(group.total_physical_connection_count(), physical_before);
        assert_eq!(group.total_transaction_count(), tx_before);
        assert_eq!(group.active_physical_connection_count(), 2);
        assert_eq!(group.active_logical_connection_count(), 1);
        assert_eq!(group.total_logical_connection_count(), 2);
    }

    #[test]
    fn test_concurrent_registration_ids_are_unique() {
        let group = Arc::new(ConnectionGroup::new("G"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let group = Arc::clone(&group);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| group.register(Arc::new(StubProxy::default()), &hosts(&["h1", "h2"])))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(group.total_logical_connection_count(), 400);
        assert_eq!(group.active_host_count(), 2);
    }
}
