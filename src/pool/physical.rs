//! The physical connection capability consumed by this crate.

use std::fmt;

use crate::error::Result;
use crate::xa::XaResource;

/// A live database connection owned by the driver.
///
/// This crate never speaks the wire protocol; it only drives the connection
/// through this trait.
pub trait PhysicalConnection: Send + Sync + fmt::Debug {
    /// The connection's two-phase-commit view.
    fn xa(&self) -> &dyn XaResource;

    /// Close the connection. Later calls must be harmless.
    fn close(&self) -> Result<()>;

    /// Reset server-side session state (variables, temp tables, locks).
    fn reset_server_state(&self) -> Result<()>;

    /// True while a global transaction branch is associated with this connection.
    fn in_global_transaction(&self) -> bool;

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    /// Commit the local transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the local transaction.
    fn rollback(&self) -> Result<()>;
}
