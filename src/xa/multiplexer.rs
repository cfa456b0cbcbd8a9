//! XA branch multiplexer.
//!
//! # Responsibilities
//! - Implement `XaResource` on top of one pooled connection
//! - Resolve the branch binding for every call through the shared `BranchRegistry`
//! - Emulate JOIN by resuming the suspended branch bound to an equal xid
//! - Release bindings on commit / rollback / forget, whatever the outcome

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::observability::metrics;
use crate::pool::{LogicalConnection, PhysicalConnection, PooledConnection};
use crate::xa::branch_registry::{BranchBinding, BranchRegistry};
use crate::xa::direct::DirectXaConnection;
use crate::xa::resource::XaResource;
use crate::xa::state::{self, BranchOp, BranchState};
use crate::xa::types::{Vote, XaError, XaErrorCode, XaFlags, XaResult};
use crate::xa::xid::Xid;

/// Routes XA calls for many global transactions over pooled connections.
///
/// Each xid is pinned to the binding the registry holds for it. Two
/// multiplexers presenting equal xids drive the same binding.
pub struct XaBranchMultiplexer {
    base: DirectXaConnection,
    registry: Arc<BranchRegistry>,
    current: Mutex<Option<Arc<BranchBinding>>>,
    log_xa_commands: bool,
}

impl XaBranchMultiplexer {
    pub fn new(
        physical: Arc<dyn PhysicalConnection>,
        registry: Arc<BranchRegistry>,
        log_xa_commands: bool,
    ) -> Self {
        Self {
            base: DirectXaConnection::new(physical, log_xa_commands),
            registry,
            current: Mutex::new(None),
            log_xa_commands,
        }
    }

    /// The pooled connection this multiplexer was built on.
    pub fn pooled(&self) -> &PooledConnection {
        self.base.pooled()
    }

    pub fn registry(&self) -> &Arc<BranchRegistry> {
        &self.registry
    }

    /// The binding this multiplexer last switched to, if still live.
    pub fn current_binding(&self) -> Option<Arc<BranchBinding>> {
        self.current.lock().clone()
    }

    pub fn current_xid(&self) -> Option<Xid> {
        self.current.lock().as_ref().map(|b| b.xid().clone())
    }

    /// Resolve (or create) the binding for `xid` and make it current.
    fn switch_to(&self, xid: &Xid) -> XaResult<Arc<BranchBinding>> {
        if xid.is_null() {
            return Err(XaError::new(XaErrorCode::Invalid, "cannot switch to the null xid"));
        }
        let physical = self.base.pooled().physical().ok_or_else(|| {
            XaError::new(
                XaErrorCode::ResourceManagerFailure,
                "multiplexer connection has been released",
            )
        })?;

        let log_xa_commands = self.log_xa_commands;
        let binding = self
            .registry
            .bind(xid, || DirectXaConnection::new(physical, log_xa_commands));

        let mut current = self.current.lock();
        if !current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &binding)) {
            tracing::trace!(xid = %xid, "Switching to branch");
            *current = Some(Arc::clone(&binding));
        }
        Ok(binding)
    }

    fn release(&self, binding: &Arc<BranchBinding>) {
        self.registry.release(binding);
        binding.set_state(BranchState::Completed);

        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, binding)) {
            *current = None;
        }
    }

    /// Switch, plan, delegate, then update state or release the binding.
    fn drive(&self, xid: &Xid, op: BranchOp) -> XaResult<Option<Vote>> {
        let binding = self.switch_to(xid)?;
        let from = binding.state();
        let transition = state::plan(from, op);
        if !transition.expected {
            tracing::debug!(
                xid = %xid,
                op = op.name(),
                state = ?from,
                "XA call outside the usual protocol order"
            );
        }

        let result = binding.connection().apply(xid, transition.delegate);

        // Terminal outcomes release the binding even when the delegate failed.
        if op.is_terminal() {
            self.release(&binding);
        } else if result.is_ok() {
            binding.set_state(transition.next);
        }

        if let Err(err) = &result {
            tracing::warn!(xid = %xid, op = op.name(), error = %err, "XA call failed");
        }
        metrics::record_xa_operation(op.name(), result.is_ok());
        result
    }

    /// A logical handle for the current branch, or for this multiplexer's own
    /// pooled connection when no branch is current. Session state is kept.
    ///
    /// A branch completed through another multiplexer is no longer current.
    pub fn connection(&self) -> Result<LogicalConnection> {
        match self.live_binding() {
            Some(binding) => binding.connection().connection(),
            None => self.base.connection(),
        }
    }

    /// The current binding if the registry still holds it for its xid.
    fn live_binding(&self) -> Option<Arc<BranchBinding>> {
        let mut current = self.current.lock();
        let binding = current.as_ref()?;
        match self.registry.lookup(binding.xid()) {
            Some(registered) if Arc::ptr_eq(&registered, binding) => Some(registered),
            _ => {
                tracing::trace!(xid = %binding.xid(), "Current branch was released elsewhere");
                *current = None;
                None
            }
        }
    }

    /// Close this multiplexer's pooled connection.
    ///
    /// Bindings created over this physical connection are dropped from the
    /// registry, so later calls for their xids start on a live connection.
    pub fn close(&self) -> Result<()> {
        self.current.lock().take();
        if let Some(physical) = self.base.pooled().physical() {
            let released = self.registry.release_bound_to(&physical);
            if released > 0 {
                tracing::debug!(released, "Dropped branch bindings of closed connection");
            }
        }
        self.base.close()
    }
}

impl XaResource for XaBranchMultiplexer {
    fn start(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.drive(xid, BranchOp::Start(flags)).map(|_| ())
    }

    fn end(&self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        self.drive(xid, BranchOp::End(flags)).map(|_| ())
    }

    fn prepare(&self, xid: &Xid) -> XaResult<Vote> {
        self.drive(xid, BranchOp::Prepare)
            .map(|vote| vote.unwrap_or(Vote::Ok))
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        self.drive(xid, BranchOp::Commit { one_phase }).map(|_| ())
    }

    fn rollback(&self, xid: &Xid) -> XaResult<()> {
        self.drive(xid, BranchOp::Rollback).map(|_| ())
    }

    fn forget(&self, xid: &Xid) -> XaResult<()> {
        self.drive(xid, BranchOp::Forget).map(|_| ())
    }

    fn recover(&self, flags: XaFlags) -> XaResult<Vec<Xid>> {
        self.base.recover(flags)
    }

    fn transaction_timeout(&self) -> XaResult<u32> {
        Ok(0)
    }

    fn set_transaction_timeout(&self, _seconds: u32) -> XaResult<bool> {
        Ok(false)
    }

    fn resource_manager(&self) -> Option<String> {
        self.base.resource_manager()
    }

    /// Only the multiplexer itself counts as the same resource manager.
    fn is_same_rm(&self, other: &dyn XaResource) -> XaResult<bool> {
        Ok(std::ptr::addr_eq(self as *const Self, other as *const dyn XaResource))
    }
}

impl fmt::Debug for XaBranchMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XaBranchMultiplexer")
            .field("base", &self.base)
            .field("current", &self.current_xid().map(|x| x.to_string()))
            .finish()
    }
}
