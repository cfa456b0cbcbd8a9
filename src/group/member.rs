//! Group member abstraction and connection ids.

use std::fmt;

use crate::error::Result;

/// Identifier of a proxy registered with a connection group.
///
/// Ids are assigned per group, strictly increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A load-balancing client that takes part in a connection group.
///
/// The group calls these from outside its locks; implementations may block.
pub trait LoadBalancedProxy: Send + Sync {
    /// Start using `host`.
    fn add_host(&self, host: &str) -> Result<()>;

    /// Stop using `host` now, closing any connection to it.
    fn remove_host(&self, host: &str) -> Result<()>;

    /// Stop routing new work to `host`; drop it once in-flight work completes.
    fn remove_host_when_not_in_use(&self, host: &str) -> Result<()>;

    /// Physical connections currently open.
    fn active_physical_connection_count(&self) -> u64;

    /// Physical connections opened over the proxy's lifetime.
    fn total_physical_connection_count(&self) -> u64;

    /// Transactions completed over the proxy's lifetime.
    fn transaction_count(&self) -> u64;
}
