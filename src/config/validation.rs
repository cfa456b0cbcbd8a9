//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check group names and host lists
//! - Validate value ranges (interval > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("group #{index} has an empty name")]
    EmptyGroupName { index: usize },

    #[error("group '{0}' is defined more than once")]
    DuplicateGroup(String),

    #[error("group '{0}' has no hosts")]
    NoHosts(String),

    #[error("group '{group}': '{host}' is not host:port")]
    MalformedHost { group: String, host: String },

    #[error("group '{group}': host '{host}' listed twice")]
    DuplicateHost { group: String, host: String },

    #[error("publish_interval_secs must be greater than zero")]
    ZeroPublishInterval,

    #[error("metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("log_format '{0}' must be \"pretty\" or \"json\"")]
    UnknownLogFormat(String),
}

/// True if `host` looks like `host:port` with a non-empty host and a u16 port.
fn is_host_port(host: &str) -> bool {
    match host.rsplit_once(':') {
        Some((name, port)) => !name.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for (index, group) in config.groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            errors.push(ValidationError::EmptyGroupName { index });
        } else if !names.insert(group.name.as_str()) {
            errors.push(ValidationError::DuplicateGroup(group.name.clone()));
        }

        if group.hosts.is_empty() {
            errors.push(ValidationError::NoHosts(group.name.clone()));
        }

        let mut seen = HashSet::new();
        for host in &group.hosts {
            if !is_host_port(host) {
                errors.push(ValidationError::MalformedHost {
                    group: group.name.clone(),
                    host: host.clone(),
                });
            }
            if !seen.insert(host.as_str()) {
                errors.push(ValidationError::DuplicateHost {
                    group: group.name.clone(),
                    host: host.clone(),
                });
            }
        }
    }

    let obs = &config.observability;
    if obs.publish_interval_secs == 0 {
        errors.push(ValidationError::ZeroPublishInterval);
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::UnknownLogFormat(obs.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
