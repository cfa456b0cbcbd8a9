//! Client-side connection layer: connection groups, XA branch multiplexing
//! and pooled connection lifecycle.

pub mod config;
pub mod error;
pub mod group;
pub mod load_balancer;
pub mod monitor;
pub mod observability;
pub mod pool;
pub mod xa;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result};
pub use group::{ConnectionGroup, ConnectionGroupRegistry, LoadBalancedProxy};
pub use pool::{LogicalConnection, PhysicalConnection, PooledConnection};
pub use xa::{BranchRegistry, XaConnection, XaResource, Xid};
