//! In-memory collaborators used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::group::LoadBalancedProxy;
use crate::pool::PhysicalConnection;
use crate::xa::{Vote, XaError, XaErrorCode, XaFlags, XaResource, XaResult, Xid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XaCall {
    Start(Xid, XaFlags),
    End(Xid, XaFlags),
    Prepare(Xid),
    Commit(Xid, bool),
    Rollback(Xid),
    Forget(Xid),
    Recover(XaFlags),
}

#[derive(Debug)]
pub struct MockPhysical {
    rm: String,
    calls: Mutex<Vec<XaCall>>,
    in_doubt: Mutex<Vec<Xid>>,
    closes: AtomicUsize,
    resets: AtomicUsize,
    in_global_tx: AtomicBool,
    fail_reset: AtomicBool,
    fail_terminal: AtomicBool,
    read_only: AtomicBool,
}

impl MockPhysical {
    pub fn new(rm: &str) -> Self {
        Self {
            rm: rm.to_string(),
            calls: Mutex::new(Vec::new()),
            in_doubt: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            in_global_tx: AtomicBool::new(false),
            fail_reset: AtomicBool::new(false),
            fail_terminal: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<XaCall> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) > 0
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn fail_reset(&self, fail: bool) {
        self.fail_reset.store(fail, Ordering::SeqCst);
    }

    /// Make commit, rollback and forget fail with XAER_RMFAIL.
    pub fn fail_terminal(&self, fail: bool) {
        self.fail_terminal.store(fail, Ordering::SeqCst);
    }

    pub fn vote_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn set_in_global_transaction(&self, active: bool) {
        self.in_global_tx.store(active, Ordering::SeqCst);
    }

    pub fn add_in_doubt(&self, xid: Xid) {
        self.in_doubt.lock().push(xid);
    }

    fn record(&self, call: XaCall) {
        self.calls.lock().push(call);
    }

    fn terminal(&self, call: XaCall) -> XaResult<()> {
        self.record(call);
        if self.fail_terminal.load(Ordering::SeqCst) {
            return Err(XaError::new(XaErrorCode::ResourceManagerFailure, "connection lost"));
        }
        Ok(())
    }
}

impl XaResource for MockPhysical {
    fn start(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.record(XaCall::Start(xid.clone(), flags));
        self.in_global_tx.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn end(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.record(XaCall::End(xid.clone(), flags));
        self.in_global_tx.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn prepare(&self, xid: &Xid) -> XaResult<Vote> {
        self.record(XaCall::Prepare(xid.clone()));
        if self.read_only.load(Ordering::SeqCst) {
            Ok(Vote::ReadOnly)
        } else {
            Ok(Vote::Ok)
        }
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        self.terminal(XaCall::Commit(xid.clone(), one_phase))
    }

    fn rollback(&self, xid: &Xid) -> XaResult<()> {
        self.terminal(XaCall::Rollback(xid.clone()))
    }

    fn forget(&self, xid: &Xid) -> XaResult<()> {
        self.terminal(XaCall::Forget(xid.clone()))
    }

    fn recover(&self, flags: XaFlags) -> XaResult<Vec<Xid>> {
        self.record(XaCall::Recover(flags));
        Ok(self.in_doubt.lock().clone())
    }

    fn transaction_timeout(&self) -> XaResult<u32> {
        Ok(0)
    }

    fn set_transaction_timeout(&self, _seconds: u32) -> XaResult<bool> {
        Ok(false)
    }

    fn resource_manager(&self) -> Option<String> {
        Some(self.rm.clone())
    }
}

impl PhysicalConnection for MockPhysical {
    fn xa(&self) -> &dyn XaResource {
        self
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset_server_state(&self) -> Result<()> {
        if self.fail_reset.load(Ordering::SeqCst) {
            return Err(Error::Backend("reset failed".into()));
        }
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn in_global_transaction(&self) -> bool {
        self.in_global_tx.load(Ordering::SeqCst)
    }

    fn set_auto_commit(&self, _auto_commit: bool) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

/// Shorthand for a test xid.
pub fn xid(gtrid: &str, bqual: &str) -> Xid {
    Xid::new(1, gtrid.as_bytes().to_vec(), bqual.as_bytes().to_vec()).expect("valid test xid")
}

/// Proxy with fixed counters that records host changes as "add h", "remove h", "drain h".
#[derive(Debug, Default)]
pub struct StubProxy {
    active_physical: AtomicU64,
    total_physical: AtomicU64,
    transactions: AtomicU64,
    calls: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl StubProxy {
    pub fn with_counts(active_physical: u64, total_physical: u64, transactions: u64) -> Self {
        let proxy = Self::default();
        proxy.active_physical.store(active_physical, Ordering::SeqCst);
        proxy.total_physical.store(total_physical, Ordering::SeqCst);
        proxy.transactions.store(transactions, Ordering::SeqCst);
        proxy
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn fail_host_changes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn change(&self, action: &str, host: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!("{action} {host} refused")));
        }
        self.calls.lock().push(format!("{action} {host}"));
        Ok(())
    }
}

impl LoadBalancedProxy for StubProxy {
    fn add_host(&self, host: &str) -> Result<()> {
        self.change("add", host)
    }

    fn remove_host(&self, host: &str) -> Result<()> {
        self.change("remove", host)
    }

    fn remove_host_when_not_in_use(&self, host: &str) -> Result<()> {
        self.change("drain", host)
    }

    fn active_physical_connection_count(&self) -> u64 {
        self.active_physical.load(Ordering::SeqCst)
    }

    fn total_physical_connection_count(&self) -> u64 {
        self.total_physical.load(Ordering::SeqCst)
    }

    fn transaction_count(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }
}
