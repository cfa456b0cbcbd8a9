//! XA connection bound to its own physical connection.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::pool::{LogicalConnection, PhysicalConnection, PooledConnection};
use crate::xa::resource::XaResource;
use crate::xa::state::BranchOp;
use crate::xa::types::{Vote, XaError, XaErrorCode, XaFlags, XaResult};
use crate::xa::xid::Xid;

/// A pooled connection whose XA calls go straight to its physical connection.
///
/// Used when global transactions are not multiplexed, and as the resource
/// behind every branch binding of an [`XaBranchMultiplexer`](crate::xa::XaBranchMultiplexer).
pub struct DirectXaConnection {
    pooled: PooledConnection,
    log_xa_commands: bool,
}

impl DirectXaConnection {
    pub fn new(physical: Arc<dyn PhysicalConnection>, log_xa_commands: bool) -> Self {
        Self {
            pooled: PooledConnection::new(physical),
            log_xa_commands,
        }
    }

    pub fn pooled(&self) -> &PooledConnection {
        &self.pooled
    }

    /// A logical handle for XA work: session state is preserved.
    pub fn connection(&self) -> Result<LogicalConnection> {
        self.pooled.logical_handle_for(false, true)
    }

    pub fn close(&self) -> Result<()> {
        self.pooled.close()
    }

    fn resource(&self) -> XaResult<Arc<dyn PhysicalConnection>> {
        self.pooled.physical().ok_or_else(|| {
            XaError::new(
                XaErrorCode::ResourceManagerFailure,
                "physical connection has been released",
            )
        })
    }

    fn log_command(&self, command: impl FnOnce() -> String) {
        if self.log_xa_commands {
            tracing::debug!(command = %command(), "Issuing XA command");
        }
    }

    /// Dispatch a branch-scoped call. `prepare` yields its vote.
    pub(crate) fn apply(&self, xid: &Xid, op: BranchOp) -> XaResult<Option<Vote>> {
        match op {
            BranchOp::Start(flags) => self.start(xid, flags).map(|_| None),
            BranchOp::End(flags) => self.end(xid, flags).map(|_| None),
            BranchOp::Prepare => self.prepare(xid).map(Some),
            BranchOp::Commit { one_phase } => self.commit(xid, one_phase).map(|_| None),
            BranchOp::Rollback => self.rollback(xid).map(|_| None),
            BranchOp::Forget => self.forget(xid).map(|_| None),
        }
    }
}

fn start_suffix(flags: XaFlags) -> &'static str {
    if flags.contains(XaFlags::JOIN) {
        " JOIN"
    } else if flags.contains(XaFlags::RESUME) {
        " RESUME"
    } else {
        ""
    }
}

fn end_suffix(flags: XaFlags) -> &'static str {
    if flags.contains(XaFlags::SUSPEND) {
        " SUSPEND"
    } else {
        ""
    }
}

impl XaResource for DirectXaConnection {
    fn start(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.log_command(|| format!("XA START {}{}", xid, start_suffix(flags)));
        self.resource()?.xa().start(xid, flags)
    }

    fn end(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.log_command(|| format!("XA END {}{}", xid, end_suffix(flags)));
        self.resource()?.xa().end(xid, flags)
    }

    fn prepare(&self, xid: &Xid) -> XaResult<Vote> {
        self.log_command(|| format!("XA PREPARE {}", xid));
        self.resource()?.xa().prepare(xid)
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        self.log_command(|| {
            let suffix = if one_phase { " ONE PHASE" } else { "" };
            format!("XA COMMIT {}{}", xid, suffix)
        });
        self.resource()?.xa().commit(xid, one_phase)
    }

    fn rollback(&self, xid: &Xid) -> XaResult<()> {
        self.log_command(|| format!("XA ROLLBACK {}", xid));
        self.resource()?.xa().rollback(xid)
    }

    fn forget(&self, xid: &Xid) -> XaResult<()> {
        self.log_command(|| format!("XA FORGET {}", xid));
        self.resource()?.xa().forget(xid)
    }

    /// Only a scan that includes `START_RSCAN` reaches the resource manager;
    /// the resource manager returns every in-doubt branch in one pass.
    fn recover(&self, flags: XaFlags) -> XaResult<Vec<Xid>> {
        let start_scan = flags.contains(XaFlags::START_RSCAN);
        let end_scan = flags.contains(XaFlags::END_RSCAN);

        if !start_scan && !end_scan && !flags.is_empty() {
            return Err(XaError::new(
                XaErrorCode::Invalid,
                format!("invalid recover flags {}: use NO_FLAGS or START_RSCAN/END_RSCAN", flags),
            ));
        }
        if !start_scan {
            return Ok(Vec::new());
        }

        self.log_command(|| "XA RECOVER".to_string());
        self.resource()?.xa().recover(flags)
    }

    fn transaction_timeout(&self) -> XaResult<u32> {
        self.resource()?.xa().transaction_timeout()
    }

    fn set_transaction_timeout(&self, seconds: u32) -> XaResult<bool> {
        self.resource()?.xa().set_transaction_timeout(seconds)
    }

    fn resource_manager(&self) -> Option<String> {
        self.pooled.physical().and_then(|p| p.xa().resource_manager())
    }
}

impl fmt::Debug for DirectXaConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectXaConnection")
            .field("pooled", &self.pooled)
            .field("log_xa_commands", &self.log_xa_commands)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{xid, MockPhysical, XaCall};

    #[test]
    fn test_delegates_to_physical() {
        let physical = Arc::new(MockPhysical::new("rm-1"));
        let conn = DirectXaConnection::new(physical.clone(), true);
        let x = xid("g1", "b1");

        conn.start(&x, XaFlags::NO_FLAGS).unwrap();
        conn.end(&x, XaFlags::SUCCESS).unwrap();
        assert_eq!(conn.prepare(&x).unwrap(), Vote::Ok);
        conn.commit(&x, false).unwrap();

        assert_eq!(
            physical.calls(),
            vec![
                XaCall::Start(x.clone(), XaFlags::NO_FLAGS),
                XaCall::End(x.clone(), XaFlags::SUCCESS),
                XaCall::Prepare(x.clone()),
                XaCall::Commit(x.clone(), false),
            ]
        );
    }

    #[test]
    fn test_recover_flag_validation() {
        let physical = Arc::new(MockPhysical::new("rm-1"));
        physical.add_in_doubt(xid("g1", "b1"));
        let conn = DirectXaConnection::new(physical.clone(), false);

        let err = conn.recover(XaFlags::SUCCESS).unwrap_err();
        assert_eq!(err.code, XaErrorCode::Invalid);

        assert!(conn.recover(XaFlags::NO_FLAGS).unwrap().is_empty());
        assert!(conn.recover(XaFlags::END_RSCAN).unwrap().is_empty());
        assert!(physical.calls().is_empty());

        let found = conn.recover(XaFlags::START_RSCAN | XaFlags::END_RSCAN).unwrap();
        assert_eq!(found, vec![xid("g1", "b1")]);
    }

    #[test]
    fn test_released_connection_reports_rmfail() {
        let conn = DirectXaConnection::new(Arc::new(MockPhysical::new("rm-1")), false);
        conn.close().unwrap();

        let err = conn.start(&xid("g1", "b1"), XaFlags::NO_FLAGS).unwrap_err();
        assert_eq!(err.code, XaErrorCode::ResourceManagerFailure);
        assert_eq!(conn.resource_manager(), None);
    }

    #[test]
    fn test_same_rm() {
        let a = DirectXaConnection::new(Arc::new(MockPhysical::new("rm-1")), false);
        let b = DirectXaConnection::new(Arc::new(MockPhysical::new("rm-1")), false);
        let c = DirectXaConnection::new(Arc::new(MockPhysical::new("rm-2")), false);

        assert!(a.is_same_rm(&b).unwrap());
        assert!(!a.is_same_rm(&c).unwrap());
    }

    #[test]
    fn test_connection_preserves_session_state() {
        let physical = Arc::new(MockPhysical::new("rm-1"));
        let conn = DirectXaConnection::new(physical.clone(), false);

        let handle = conn.connection().unwrap();
        assert!(handle.is_for_xa());
        assert_eq!(physical.reset_count(), 0);
    }
}
