//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! BalancedProxy::join(group) → registered with the ConnectionGroup
//!     → acquire()
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through hosts)
//!         - least_conn.rs (pick host with fewest connections)
//!     → endpoint.rs (HostGuard counts the connection until dropped)
//!
//! Group host changes → LoadBalancedProxy impl → host list updated / drained
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from their own cursor; endpoints track connections
//! - Draining hosts are excluded from selection

pub mod endpoint;
pub mod least_conn;
pub mod proxy;
pub mod round_robin;

use std::sync::Arc;

pub use endpoint::{HostEndpoint, HostGuard};
pub use least_conn::LeastConnections;
pub use proxy::BalancedProxy;
pub use round_robin::RoundRobin;

/// Host selection algorithm.
pub trait BalanceStrategy: Send + Sync {
    /// Pick a non-draining host, or `None` if there is none.
    fn select(&self, hosts: &[Arc<HostEndpoint>]) -> Option<Arc<HostEndpoint>>;
}
