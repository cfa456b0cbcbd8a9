//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the connection layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection groups seeded at startup and reconciled on reload.
    pub groups: Vec<GroupConfig>,

    /// Two-phase-commit settings.
    pub xa: XaConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A named set of backend hosts.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GroupConfig {
    /// Group name, unique within the file.
    pub name: String,

    /// Backend hosts as `host:port`.
    pub hosts: Vec<String>,
}

/// XA behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct XaConfig {
    /// Pin each global transaction to one physical connection, multiplexing
    /// branches over the shared branch registry. When false every XA
    /// connection drives its own physical connection directly.
    pub pin_global_tx_to_physical_connection: bool,

    /// Log every XA command at debug level.
    pub log_xa_commands: bool,
}

impl Default for XaConfig {
    fn default() -> Self {
        Self {
            pin_global_tx_to_physical_connection: true,
            log_xa_commands: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Seconds between gauge refreshes.
    pub publish_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            publish_interval_secs: 15,
        }
    }
}
