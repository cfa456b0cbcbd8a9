//! Serializable point-in-time view of a group.

use serde::{Deserialize, Serialize};

use crate::group::connection_group::ConnectionGroup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub name: String,
    pub hosts: Vec<String>,
    pub closed_hosts: Vec<String>,
    pub active_host_count: usize,
    pub total_logical_connections: u64,
    pub active_logical_connections: u64,
    pub active_physical_connections: u64,
    pub total_physical_connections: u64,
    pub total_transactions: u64,
}

impl GroupSnapshot {
    pub fn capture(group: &ConnectionGroup) -> Self {
        Self {
            name: group.name().to_string(),
            hosts: group.initial_hosts(),
            closed_hosts: group.closed_hosts(),
            active_host_count: group.active_host_count(),
            total_logical_connections: group.total_logical_connection_count(),
            active_logical_connections: group.active_logical_connection_count(),
            active_physical_connections: group.active_physical_connection_count(),
            total_physical_connections: group.total_physical_connection_count(),
            total_transactions: group.total_transaction_count(),
        }
    }

    /// Distinct hosts that were ever members.
    pub fn total_host_count(&self) -> usize {
        self.hosts
            .iter()
            .chain(&self.closed_hosts)
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }
}
