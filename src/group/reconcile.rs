//! Bring registry membership in line with configured groups.
//!
//! Groups never seeded are seeded from configuration. Seeded groups get
//! missing hosts added (and pushed to their proxies) and unlisted hosts
//! drained. A failed change is recorded and the pass continues.

use std::collections::BTreeSet;

use crate::config::GroupConfig;
use crate::group::registry::ConnectionGroupRegistry;

/// A host change that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileFailure {
    pub group: String,
    pub host: String,
    pub reason: String,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub seeded: Vec<String>,
    pub added: Vec<(String, String)>,
    pub removed: Vec<(String, String)>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.seeded.is_empty() && self.added.is_empty() && self.removed.is_empty() && self.is_clean()
    }
}

pub fn reconcile(registry: &ConnectionGroupRegistry, groups: &[GroupConfig]) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for config in groups {
        let group = registry.get_or_create(&config.name);
        if group.initialize_hosts(&config.hosts) {
            report.seeded.push(config.name.clone());
            continue;
        }

        let wanted: BTreeSet<&str> = config.hosts.iter().map(String::as_str).collect();
        let current = group.initial_hosts();

        for host in wanted.iter().filter(|h| !group.has_host(h)) {
            match group.add_host(host, true) {
                Ok(()) => report.added.push((config.name.clone(), host.to_string())),
                Err(err) => report.failures.push(ReconcileFailure {
                    group: config.name.clone(),
                    host: host.to_string(),
                    reason: err.to_string(),
                }),
            }
        }

        for host in current.iter().filter(|h| !wanted.contains(h.as_str())) {
            match group.remove_host(host, true, true) {
                Ok(()) => report.removed.push((config.name.clone(), host.clone())),
                Err(err) => {
                    tracing::warn!(group = %config.name, host = %host, error = %err, "Could not remove host during reconcile");
                    report.failures.push(ReconcileFailure {
                        group: config.name.clone(),
                        host: host.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    tracing::info!(
        seeded = report.seeded.len(),
        added = report.added.len(),
        removed = report.removed.len(),
        failures = report.failures.len(),
        "Group reconciliation finished"
    );
    report
}
