//! Logical connection handles.
//!
//! # Responsibilities
//! - Give callers a revocable view of a pooled physical connection
//! - Reject use after the handle is closed or superseded
//! - Report closure and fatal failures to the owning pool's listeners

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::pool::events::EventDispatcher;
use crate::pool::physical::PhysicalConnection;

/// Identifier of a logical handle, unique within its pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

struct HandleInner {
    id: HandleId,
    physical: Arc<dyn PhysicalConnection>,
    for_xa: bool,
    closed: AtomicBool,
    events: Arc<EventDispatcher>,
}

/// The user-visible connection issued by a [`PooledConnection`](crate::pool::PooledConnection).
///
/// Clones share state: closing one clone closes them all.
#[derive(Clone)]
pub struct LogicalConnection {
    inner: Arc<HandleInner>,
}

impl LogicalConnection {
    pub(crate) fn new(
        id: HandleId,
        physical: Arc<dyn PhysicalConnection>,
        for_xa: bool,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                physical,
                for_xa,
                closed: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// True if this handle was issued for XA work.
    pub fn is_for_xa(&self) -> bool {
        self.inner.for_xa
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::HandleClosed(self.inner.id));
        }
        Ok(())
    }

    /// Run `f` against the physical connection.
    ///
    /// Backend and fatal failures are reported to the connection listeners
    /// before being returned.
    pub fn run<T>(&self, f: impl FnOnce(&dyn PhysicalConnection) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        f(self.inner.physical.as_ref()).map_err(|err| {
            if matches!(err.kind(), ErrorKind::Backend | ErrorKind::Fatal) {
                self.inner.events.notify_error(Some(self.inner.id), &err);
            }
            err
        })
    }

    /// Local transaction controls are off-limits while an XA branch is active.
    fn ensure_not_in_global_tx(&self, operation: &'static str) -> Result<()> {
        if self.inner.for_xa && self.inner.physical.in_global_transaction() {
            return Err(Error::InGlobalTransaction { operation });
        }
        Ok(())
    }

    pub fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.ensure_open()?;
        if auto_commit {
            self.ensure_not_in_global_tx("set_auto_commit(true)")?;
        }
        self.run(|conn| conn.set_auto_commit(auto_commit))
    }

    pub fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        self.ensure_not_in_global_tx("commit")?;
        self.run(|conn| conn.commit())
    }

    pub fn rollback(&self) -> Result<()> {
        self.ensure_open()?;
        self.ensure_not_in_global_tx("rollback")?;
        self.run(|conn| conn.rollback())
    }

    /// Forward a statement-closed notification to the statement listeners.
    pub fn statement_closed(&self, statement_id: u64) {
        self.inner.events.notify_statement_closed(statement_id);
    }

    /// Forward a statement error to the statement listeners.
    pub fn statement_error(&self, statement_id: u64, cause: &Error) {
        self.inner.events.notify_statement_error(statement_id, cause);
    }

    /// Close the handle and fire the closed event. Later calls do nothing.
    ///
    /// The physical connection stays open; it belongs to the pool.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(handle = %self.inner.id, "Logical handle closed");
        self.inner.events.notify_closed(Some(self.inner.id));
    }

    /// Mark the handle closed without firing events.
    pub(crate) fn invalidate(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for LogicalConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalConnection")
            .field("id", &self.inner.id)
            .field("for_xa", &self.inner.for_xa)
            .field("closed", &self.is_closed())
            .finish()
    }
}
