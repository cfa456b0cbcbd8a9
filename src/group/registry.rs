//! Name-keyed registry of connection groups.
//!
//! # Responsibilities
//! - Create groups on first reference, keep them for the registry's lifetime
//! - Answer aggregate queries over one group or all of them
//! - Apply host changes by group name
//!
//! # Design Decisions
//! - A name filter of `None` or `""` selects every group
//! - Unknown names read as zero or empty; mutators on them do nothing
//! - Host counts across groups count distinct hosts; connection and
//!   transaction counts are summed

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::group::connection_group::ConnectionGroup;
use crate::group::report::GroupSnapshot;

/// Shared registry of [`ConnectionGroup`]s.
#[derive(Debug, Default)]
pub struct ConnectionGroupRegistry {
    groups: DashMap<String, Arc<ConnectionGroup>>,
}

impl ConnectionGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The group called `name`, created if this is its first reference.
    pub fn get_or_create(&self, name: &str) -> Arc<ConnectionGroup> {
        let entry = self.groups.entry(name.to_string()).or_insert_with(|| {
            tracing::info!(group = %name, "Connection group created");
            Arc::new(ConnectionGroup::new(name))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ConnectionGroup>> {
        self.groups.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups selected by `filter`, sorted by name.
    fn matching(&self, filter: Option<&str>) -> Vec<Arc<ConnectionGroup>> {
        match filter.filter(|name| !name.is_empty()) {
            Some(name) => self.get(name).into_iter().collect(),
            None => {
                let mut groups: Vec<_> = self
                    .groups
                    .iter()
                    .map(|entry| Arc::clone(entry.value()))
                    .collect();
                groups.sort_by(|a, b| a.name().cmp(b.name()));
                groups
            }
        }
    }

    fn sum(&self, filter: Option<&str>, f: impl Fn(&ConnectionGroup) -> u64) -> u64 {
        self.matching(filter).iter().map(|g| f(g)).sum()
    }

    /// Add `host` to the selected groups.
    ///
    /// Every group is attempted; the first failure is returned.
    pub fn add_host(&self, filter: Option<&str>, host: &str, apply_to_existing: bool) -> Result<()> {
        let mut first_err = None;
        for group in self.matching(filter) {
            if let Err(err) = group.add_host(host, apply_to_existing) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Remove `host` from the selected groups, letting proxies drain it.
    pub fn remove_host(&self, filter: Option<&str>, host: &str, remove_from_existing: bool) -> Result<()> {
        self.remove_host_with(filter, host, remove_from_existing, true)
    }

    /// Remove `host` from the selected groups.
    ///
    /// When every group is selected, groups that do not contain `host` are
    /// skipped, and `HostNotFound` is reported only if none of them has it.
    /// A named group that lacks it reports `HostNotFound`.
    pub fn remove_host_with(
        &self,
        filter: Option<&str>,
        host: &str,
        remove_from_existing: bool,
        graceful: bool,
    ) -> Result<()> {
        let all = filter.map_or(true, str::is_empty);
        let groups = self.matching(filter);
        let mut members = 0;
        let mut first_err = None;
        for group in &groups {
            if all && !group.has_host(host) {
                continue;
            }
            members += 1;
            if let Err(err) = group.remove_host(host, remove_from_existing, graceful) {
                first_err.get_or_insert(err);
            }
        }
        if all && members == 0 && !groups.is_empty() {
            return Err(Error::HostNotFound {
                group: "*".to_string(),
                host: host.to_string(),
            });
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Distinct active hosts across the selected groups.
    pub fn active_host_count(&self, filter: Option<&str>) -> usize {
        self.matching(filter)
            .iter()
            .flat_map(|g| g.initial_hosts())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct hosts that were ever members of the selected groups.
    pub fn total_host_count(&self, filter: Option<&str>) -> usize {
        self.matching(filter)
            .iter()
            .flat_map(|g| {
                let mut hosts = g.initial_hosts();
                hosts.extend(g.closed_hosts());
                hosts
            })
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn total_logical_connection_count(&self, filter: Option<&str>) -> u64 {
        self.sum(filter, ConnectionGroup::total_logical_connection_count)
    }

    pub fn active_logical_connection_count(&self, filter: Option<&str>) -> u64 {
        self.sum(filter, ConnectionGroup::active_logical_connection_count)
    }

    pub fn active_physical_connection_count(&self, filter: Option<&str>) -> u64 {
        self.sum(filter, ConnectionGroup::active_physical_connection_count)
    }

    pub fn total_physical_connection_count(&self, filter: Option<&str>) -> u64 {
        self.sum(filter, ConnectionGroup::total_physical_connection_count)
    }

    pub fn total_transaction_count(&self, filter: Option<&str>) -> u64 {
        self.sum(filter, ConnectionGroup::total_transaction_count)
    }

    /// `host(n)` entries joined by commas, where `n` is the number of
    /// selected groups that currently contain `host`.
    pub fn active_host_lists(&self, filter: Option<&str>) -> String {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for group in self.matching(filter) {
            for host in group.initial_hosts() {
                *counts.entry(host).or_default() += 1;
            }
        }
        counts
            .iter()
            .map(|(host, count)| format!("{host}({count})"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Sorted group names.
    pub fn group_names(&self) -> Vec<String> {
        self.matching(None)
            .iter()
            .map(|g| g.name().to_string())
            .collect()
    }

    /// Group names joined by commas.
    pub fn registered_groups(&self) -> String {
        self.group_names().join(",")
    }

    pub fn snapshot(&self, filter: Option<&str>) -> Vec<GroupSnapshot> {
        self.matching(filter)
            .iter()
            .map(|g| GroupSnapshot::capture(g))
            .collect()
    }
}
