//! Connection groups: named host sets shared by load-balancing proxies.
//!
//! # Data Flow
//! ```text
//! BalancedProxy::join(name)
//!     → ConnectionGroupRegistry::get_or_create(name)
//!     → ConnectionGroup::register (seeds membership once, assigns id)
//!
//! admin / reconcile
//!     → registry.add_host / remove_host (by name or all)
//!     → ConnectionGroup membership change
//!     → snapshot of proxies → LoadBalancedProxy::{add_host, remove_host*}
//!
//! BalancedProxy::close
//!     → ConnectionGroup::unregister (totals carried forward)
//! ```
//!
//! # Design Decisions
//! - A group can never lose its last active host
//! - Counters of closed proxies survive in the group so lifetime totals stay
//!   monotonic

pub mod connection_group;
pub mod member;
pub mod reconcile;
pub mod registry;
pub mod report;

pub use connection_group::ConnectionGroup;
pub use member::{ConnectionId, LoadBalancedProxy};
pub use reconcile::{reconcile, ReconcileFailure, ReconcileReport};
pub use registry::ConnectionGroupRegistry;
pub use report::GroupSnapshot;
