//! Two-phase-commit (XA) subsystem.
//!
//! # Data Flow
//! ```text
//! Transaction manager
//!     → XaConnection::open (config decides the mode)
//!         → Direct:      direct.rs → PhysicalConnection::xa()
//!         → Multiplexed: multiplexer.rs
//!             → branch_registry.rs (xid → BranchBinding, create on demand)
//!             → state.rs (transition table, JOIN → RESUME)
//!             → binding's DirectXaConnection → PhysicalConnection::xa()
//! ```
//!
//! # Design Decisions
//! - Xid equality covers all components; hashing only the global id
//! - Terminal calls release the binding even if the resource manager failed
//! - The branch registry is an explicit shared service, passed by `Arc`

pub mod branch_registry;
pub mod direct;
pub mod multiplexer;
pub mod resource;
pub mod state;
pub mod types;
pub mod xid;

use std::sync::Arc;

use crate::config::XaConfig;
use crate::error::Result;
use crate::pool::{LogicalConnection, PhysicalConnection, PooledConnection};

pub use branch_registry::{BranchBinding, BranchRegistry};
pub use direct::DirectXaConnection;
pub use multiplexer::XaBranchMultiplexer;
pub use resource::XaResource;
pub use state::{BranchOp, BranchState};
pub use types::{Vote, XaError, XaErrorCode, XaFlags, XaResult};
pub use xid::Xid;

/// An XA-capable pooled connection in the mode chosen by configuration.
#[derive(Debug)]
pub enum XaConnection {
    /// Every branch runs on this connection's own physical connection.
    Direct(DirectXaConnection),
    /// Branches are pinned per xid through a shared registry.
    Multiplexed(XaBranchMultiplexer),
}

impl XaConnection {
    /// Wrap `physical` according to `config`.
    pub fn open(
        physical: Arc<dyn PhysicalConnection>,
        config: &XaConfig,
        registry: &Arc<BranchRegistry>,
    ) -> Self {
        if config.pin_global_tx_to_physical_connection {
            XaConnection::Multiplexed(XaBranchMultiplexer::new(
                physical,
                Arc::clone(registry),
                config.log_xa_commands,
            ))
        } else {
            XaConnection::Direct(DirectXaConnection::new(physical, config.log_xa_commands))
        }
    }

    pub fn is_multiplexed(&self) -> bool {
        matches!(self, XaConnection::Multiplexed(_))
    }

    fn resource(&self) -> &dyn XaResource {
        match self {
            XaConnection::Direct(conn) => conn,
            XaConnection::Multiplexed(mux) => mux,
        }
    }

    pub fn pooled(&self) -> &PooledConnection {
        match self {
            XaConnection::Direct(conn) => conn.pooled(),
            XaConnection::Multiplexed(mux) => mux.pooled(),
        }
    }

    /// A logical handle suitable for work inside the current branch.
    pub fn connection(&self) -> Result<LogicalConnection> {
        match self {
            XaConnection::Direct(conn) => conn.connection(),
            XaConnection::Multiplexed(mux) => mux.connection(),
        }
    }

    pub fn close(&self) -> Result<()> {
        match self {
            XaConnection::Direct(conn) => conn.close(),
            XaConnection::Multiplexed(mux) => mux.close(),
        }
    }
}

impl XaResource for XaConnection {
    fn start(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.resource().start(xid, flags)
    }

    fn end(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.resource().end(xid, flags)
    }

    fn prepare(&self, xid: &Xid) -> XaResult<Vote> {
        self.resource().prepare(xid)
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        self.resource().commit(xid, one_phase)
    }

    fn rollback(&self, xid: &Xid) -> XaResult<()> {
        self.resource().rollback(xid)
    }

    fn forget(&self, xid: &Xid) -> XaResult<()> {
        self.resource().forget(xid)
    }

    fn recover(&self, flags: XaFlags) -> XaResult<Vec<Xid>> {
        self.resource().recover(flags)
    }

    fn transaction_timeout(&self) -> XaResult<u32> {
        self.resource().transaction_timeout()
    }

    fn set_transaction_timeout(&self, seconds: u32) -> XaResult<bool> {
        self.resource().set_transaction_timeout(seconds)
    }

    fn resource_manager(&self) -> Option<String> {
        self.resource().resource_manager()
    }

    fn is_same_rm(&self, other: &dyn XaResource) -> XaResult<bool> {
        if std::ptr::addr_eq(self as *const Self, other as *const dyn XaResource) {
            return Ok(true);
        }
        self.resource().is_same_rm(other)
    }
}
