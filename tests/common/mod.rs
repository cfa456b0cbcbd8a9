//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use conngroup::error::{Error, Result};
use conngroup::group::LoadBalancedProxy;
use conngroup::pool::{ConnectionEvent, ConnectionEventListener, PhysicalConnection};
use conngroup::xa::{Vote, XaError, XaErrorCode, XaFlags, XaResource, XaResult, Xid};

/// In-memory XA-capable connection that records the commands it receives.
#[derive(Debug, Default)]
pub struct FakeConnection {
    pub id: usize,
    log: Mutex<Vec<String>>,
    in_doubt: Mutex<Vec<Xid>>,
    closes: AtomicUsize,
    in_global_tx: AtomicBool,
    fail_commit: AtomicBool,
}

impl FakeConnection {
    pub fn new(id: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            ..Self::default()
        })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn add_in_doubt(&self, xid: Xid) {
        self.in_doubt.lock().push(xid);
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }
}

fn gtrid(xid: &Xid) -> String {
    String::from_utf8_lossy(xid.global_transaction_id()).into_owned()
}

impl XaResource for FakeConnection {
    fn start(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        let verb = if flags.contains(XaFlags::RESUME) { "resume" } else { "start" };
        self.record(format!("{verb} {}", gtrid(xid)));
        self.in_global_tx.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn end(&self, xid: &Xid, _flags: XaFlags) -> XaResult<()> {
        self.record(format!("end {}", gtrid(xid)));
        self.in_global_tx.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn prepare(&self, xid: &Xid) -> XaResult<Vote> {
        self.record(format!("prepare {}", gtrid(xid)));
        Ok(Vote::Ok)
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        self.record(format!("commit {} {one_phase}", gtrid(xid)));
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(XaError::new(XaErrorCode::ResourceManagerFailure, "lost connection"));
        }
        Ok(())
    }

    fn rollback(&self, xid: &Xid) -> XaResult<()> {
        self.record(format!("rollback {}", gtrid(xid)));
        Ok(())
    }

    fn forget(&self, xid: &Xid) -> XaResult<()> {
        self.record(format!("forget {}", gtrid(xid)));
        Ok(())
    }

    fn recover(&self, _flags: XaFlags) -> XaResult<Vec<Xid>> {
        Ok(self.in_doubt.lock().clone())
    }

    fn transaction_timeout(&self) -> XaResult<u32> {
        Ok(0)
    }

    fn set_transaction_timeout(&self, _seconds: u32) -> XaResult<bool> {
        Ok(false)
    }

    fn resource_manager(&self) -> Option<String> {
        Some("fake-rm".to_string())
    }
}

impl PhysicalConnection for FakeConnection {
    fn xa(&self) -> &dyn XaResource {
        self
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset_server_state(&self) -> Result<()> {
        self.record("reset".to_string());
        Ok(())
    }

    fn in_global_transaction(&self) -> bool {
        self.in_global_tx.load(Ordering::SeqCst)
    }

    fn set_auto_commit(&self, _auto_commit: bool) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.record("local commit".to_string());
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Err(Error::Backend("socket closed".to_string()))
    }
}

/// Connection listener counting the events it sees.
#[derive(Debug, Default)]
pub struct CountingListener {
    pub closed: AtomicUsize,
    pub errors: AtomicUsize,
}

impl ConnectionEventListener for CountingListener {
    fn on_closed(&self, _event: &ConnectionEvent<'_>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _event: &ConnectionEvent<'_>) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Proxy with settable lifetime counters.
#[derive(Debug, Default)]
pub struct CountingProxy {
    pub active_physical: AtomicU64,
    pub total_physical: AtomicU64,
    pub transactions: AtomicU64,
    pub hosts: Mutex<Vec<String>>,
}

impl CountingProxy {
    pub fn with_totals(total_physical: u64, transactions: u64) -> Arc<Self> {
        let proxy = Self::default();
        proxy.total_physical.store(total_physical, Ordering::SeqCst);
        proxy.transactions.store(transactions, Ordering::SeqCst);
        Arc::new(proxy)
    }
}

impl LoadBalancedProxy for CountingProxy {
    fn add_host(&self, host: &str) -> Result<()> {
        self.hosts.lock().push(host.to_string());
        Ok(())
    }

    fn remove_host(&self, host: &str) -> Result<()> {
        self.hosts.lock().retain(|h| h != host);
        Ok(())
    }

    fn remove_host_when_not_in_use(&self, host: &str) -> Result<()> {
        self.remove_host(host)
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

pub fn xid(gtrid: &str, bqual: &str) -> Xid {
    Xid::new(1, gtrid.as_bytes().to_vec(), bqual.as_bytes().to_vec()).unwrap()
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}
