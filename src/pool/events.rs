//! Connection and statement event fan-out.
//!
//! # Design Decisions
//! - Connection and statement listeners live behind separate locks
//! - Dispatch copies the listener list, then calls listeners unlocked
//! - A cleared registry (`None`) turns every dispatch into a no-op

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::pool::logical::HandleId;

/// Payload of a connection event.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEvent<'a> {
    /// Handle that was current when the event fired, if any.
    pub handle: Option<HandleId>,
    /// Cause, for error events.
    pub error: Option<&'a Error>,
}

/// Payload of a statement event.
#[derive(Debug, Clone, Copy)]
pub struct StatementEvent<'a> {
    /// Driver-assigned statement id.
    pub statement_id: u64,
    /// Cause, for error events.
    pub error: Option<&'a Error>,
}

/// Observer of logical-handle closure and fatal errors (typically a pool).
pub trait ConnectionEventListener: Send + Sync {
    fn on_closed(&self, event: &ConnectionEvent<'_>);
    fn on_error(&self, event: &ConnectionEvent<'_>);
}

/// Observer of statement closure and errors (typically a statement cache).
pub trait StatementEventListener: Send + Sync {
    fn on_statement_closed(&self, event: &StatementEvent<'_>);
    fn on_statement_error(&self, event: &StatementEvent<'_>);
}

/// Type-erased pointer comparison for listener removal.
fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Listener registries for one pooled connection.
pub struct EventDispatcher {
    connection: Mutex<Option<Vec<Arc<dyn ConnectionEventListener>>>>,
    statement: Mutex<Option<Vec<Arc<dyn StatementEventListener>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            connection: Mutex::new(Some(Vec::new())),
            statement: Mutex::new(Some(Vec::new())),
        }
    }

    /// Register a connection listener. Ignored once the registry is cleared.
    pub fn add_connection_listener(&self, listener: Arc<dyn ConnectionEventListener>) {
        if let Some(listeners) = self.connection.lock().as_mut() {
            listeners.push(listener);
        }
    }

    pub fn remove_connection_listener(&self, listener: &Arc<dyn ConnectionEventListener>) {
        if let Some(listeners) = self.connection.lock().as_mut() {
            listeners.retain(|l| !same_listener(l, listener));
        }
    }

    /// Register a statement listener. Ignored once the registry is cleared.
    pub fn add_statement_listener(&self, listener: Arc<dyn StatementEventListener>) {
        if let Some(listeners) = self.statement.lock().as_mut() {
            listeners.push(listener);
        }
    }

    pub fn remove_statement_listener(&self, listener: &Arc<dyn StatementEventListener>) {
        if let Some(listeners) = self.statement.lock().as_mut() {
            listeners.retain(|l| !same_listener(l, listener));
        }
    }

    pub fn connection_listener_count(&self) -> usize {
        self.connection.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn statement_listener_count(&self) -> usize {
        self.statement.lock().as_ref().map_or(0, Vec::len)
    }

    /// Drop every listener. Later registrations and dispatches are no-ops.
    pub fn clear(&self) {
        self.connection.lock().take();
        self.statement.lock().take();
    }

    fn connection_snapshot(&self) -> Vec<Arc<dyn ConnectionEventListener>> {
        self.connection.lock().clone().unwrap_or_default()
    }

    fn statement_snapshot(&self) -> Vec<Arc<dyn StatementEventListener>> {
        self.statement.lock().clone().unwrap_or_default()
    }

    pub fn notify_closed(&self, handle: Option<HandleId>) {
        let event = ConnectionEvent { handle, error: None };
        for listener in self.connection_snapshot() {
            listener.on_closed(&event);
        }
    }

    pub fn notify_error(&self, handle: Option<HandleId>, cause: &Error) {
        let event = ConnectionEvent {
            handle,
            error: Some(cause),
        };
        for listener in self.connection_snapshot() {
            listener.on_error(&event);
        }
    }

    pub fn notify_statement_closed(&self, statement_id: u64) {
        let event = StatementEvent {
            statement_id,
            error: None,
        };
        for listener in self.statement_snapshot() {
            listener.on_statement_closed(&event);
        }
    }

    pub fn notify_statement_error(&self, statement_id: u64, cause: &Error) {
        let event = StatementEvent {
            statement_id,
            error: Some(cause),
        };
        for listener in self.statement_snapshot() {
            listener.on_statement_error(&event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("connection_listeners", &self.connection_listener_count())
            .field("statement_listeners", &self.statement_listener_count())
            .finish()
    }
}
