//! The two-phase-commit resource interface.

use crate::xa::types::{Vote, XaFlags, XaResult};
use crate::xa::xid::Xid;

/// A resource manager that can take part in a two-phase commit.
///
/// Implemented by physical connections (the driver side) and by the wrappers
/// in this module that route calls to them.
pub trait XaResource: Send + Sync {
    /// Associate the caller's unit of work with the branch `xid`.
    fn start(&self, xid: &Xid, flags: XaFlags) -> XaResult<()>;

    /// Dissociate the caller's unit of work from the branch `xid`.
    fn end(&self, xid: &Xid, flags: XaFlags) -> XaResult<()>;

    /// Ask the resource manager to prepare the branch for commit.
    fn prepare(&self, xid: &Xid) -> XaResult<Vote>;

    fn commit(&self, xid: &Xid, one_phase: bool) -> XaResult<()>;

    fn rollback(&self, xid: &Xid) -> XaResult<()>;

    /// Discard knowledge of a heuristically completed branch.
    fn forget(&self, xid: &Xid) -> XaResult<()>;

    /// List branches that are prepared or heuristically completed.
    fn recover(&self, flags: XaFlags) -> XaResult<Vec<Xid>>;

    /// Transaction timeout in seconds (0 = resource manager default).
    fn transaction_timeout(&self) -> XaResult<u32>;

    /// Returns false if the resource manager does not support timeouts.
    fn set_transaction_timeout(&self, seconds: u32) -> XaResult<bool>;

    /// Identity of the backing resource manager, if known.
    fn resource_manager(&self) -> Option<String> {
        None
    }

    /// True if `other` talks to the same resource manager as `self`.
    fn is_same_rm(&self, other: &dyn XaResource) -> XaResult<bool> {
        Ok(match (self.resource_manager(), other.resource_manager()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        })
    }
}
