//! Pooled physical connection.
//!
//! # Responsibilities
//! - Own exactly one physical connection until `close`
//! - Issue at most one live logical handle at a time
//! - Fan out closure/error events to registered listeners

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::pool::events::{ConnectionEventListener, EventDispatcher, StatementEventListener};
use crate::pool::logical::{HandleId, LogicalConnection};
use crate::pool::physical::PhysicalConnection;

struct PooledState {
    physical: Option<Arc<dyn PhysicalConnection>>,
    handle: Option<LogicalConnection>,
}

/// A physical connection managed by a connection pool.
pub struct PooledConnection {
    state: Mutex<PooledState>,
    events: Arc<EventDispatcher>,
    handles_issued: AtomicU64,
}

impl PooledConnection {
    pub fn new(physical: Arc<dyn PhysicalConnection>) -> Self {
        Self {
            state: Mutex::new(PooledState {
                physical: Some(physical),
                handle: None,
            }),
            events: Arc::new(EventDispatcher::new()),
            handles_issued: AtomicU64::new(0),
        }
    }

    /// Issue a fresh logical handle, resetting server session state.
    pub fn logical_handle(&self) -> Result<LogicalConnection> {
        self.logical_handle_for(true, false)
    }

    /// Issue a fresh logical handle.
    ///
    /// The previous handle, if any, is invalidated without a closed event.
    /// Fails with [`Error::PhysicalReleased`] after `close`, after notifying
    /// the connection listeners.
    pub fn logical_handle_for(&self, reset_server_state: bool, for_xa: bool) -> Result<LogicalConnection> {
        let mut state = self.state.lock();

        let Some(physical) = state.physical.clone() else {
            drop(state);
            let err = Error::PhysicalReleased;
            tracing::error!("Logical handle requested from a released pooled connection");
            self.events.notify_error(None, &err);
            return Err(err);
        };

        if let Some(previous) = state.handle.take() {
            tracing::trace!(handle = %previous.id(), "Invalidating superseded logical handle");
            previous.invalidate();
        }

        if reset_server_state {
            if let Err(err) = physical.reset_server_state() {
                drop(state);
                self.events.notify_error(None, &err);
                return Err(err);
            }
        }

        let id = HandleId::new(self.handles_issued.fetch_add(1, Ordering::Relaxed) + 1);
        let handle = LogicalConnection::new(id, physical, for_xa, Arc::clone(&self.events));
        state.handle = Some(handle.clone());
        metrics::record_handle_issued(for_xa);
        Ok(handle)
    }

    /// The physical connection, unless released.
    pub fn physical(&self) -> Option<Arc<dyn PhysicalConnection>> {
        self.state.lock().physical.clone()
    }

    /// The currently issued handle, if any (it may have been closed by its user).
    pub fn current_handle(&self) -> Option<LogicalConnection> {
        self.state.lock().handle.clone()
    }

    /// True once the physical connection has been released.
    pub fn is_closed(&self) -> bool {
        self.state.lock().physical.is_none()
    }

    /// Release the physical connection and drop every listener.
    ///
    /// Idempotent. Listeners are cleared even if closing the physical
    /// connection fails.
    pub fn close(&self) -> Result<()> {
        let physical = {
            let mut state = self.state.lock();
            if let Some(handle) = state.handle.take() {
                handle.invalidate();
            }
            state.physical.take()
        };
        self.events.clear();

        match physical {
            Some(physical) => {
                tracing::debug!("Releasing pooled physical connection");
                physical.close()
            }
            None => Ok(()),
        }
    }

    pub fn add_connection_listener(&self, listener: Arc<dyn ConnectionEventListener>) {
        self.events.add_connection_listener(listener);
    }

    pub fn remove_connection_listener(&self, listener: &Arc<dyn ConnectionEventListener>) {
        self.events.remove_connection_listener(listener);
    }

    pub fn add_statement_listener(&self, listener: Arc<dyn StatementEventListener>) {
        self.events.add_statement_listener(listener);
    }

    pub fn remove_statement_listener(&self, listener: &Arc<dyn StatementEventListener>) {
        self.events.remove_statement_listener(listener);
    }

    fn current_handle_id(&self) -> Option<HandleId> {
        self.state.lock().handle.as_ref().map(LogicalConnection::id)
    }

    /// Fire the closed event. No-op after `close`.
    pub fn notify_closed(&self) {
        self.events.notify_closed(self.current_handle_id());
    }

    /// Fire the error event. No-op after `close`.
    pub fn notify_error(&self, cause: &Error) {
        self.events.notify_error(self.current_handle_id(), cause);
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("closed", &self.is_closed())
            .field("handles_issued", &self.handles_issued.load(Ordering::Relaxed))
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pool::events::ConnectionEvent;
    use crate::test_support::MockPhysical;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recorder {
        closed: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConnectionEventListener for Recorder {
        fn on_closed(&self, _event: &ConnectionEvent<'_>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _event: &ConnectionEvent<'_>) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_second_handle_invalidates_first() {
        let physical = Arc::new(MockPhysical::new("rm"));
        let pooled = PooledConnection::new(physical.clone());

        let first = pooled.logical_handle().unwrap();
        let second = pooled.logical_handle().unwrap();

        assert!(first.is_closed());
        assert!(!second.is_closed());
        let err = first.commit().unwrap_err();
        assert!(matches!(err, Error::HandleClosed(id) if id == first.id()));
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        second.commit().unwrap();
        assert_eq!(physical.reset_count(), 2);
    }

    #[test]
    fn test_invalidation_does_not_fire_closed_event() {
        let pooled = PooledConnection::new(Arc::new(MockPhysical::new("rm")));
        let recorder = Arc::new(Recorder::default());
        pooled.add_connection_listener(recorder.clone());

        let first = pooled.logical_handle().unwrap();
        let _second = pooled.logical_handle().unwrap();
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 0);

        // Closing a superseded handle is silent too.
        first.close();
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handle_close_fires_once() {
        let pooled = PooledConnection::new(Arc::new(MockPhysical::new("rm")));
        let recorder = Arc::new(Recorder::default());
        pooled.add_connection_listener(recorder.clone());

        let handle = pooled.logical_handle().unwrap();
        handle.close();
        handle.close();
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_after_close_is_fatal_and_notifies() {
        let physical = Arc::new(MockPhysical::new("rm"));
        let pooled = PooledConnection::new(physical.clone());
        let recorder = Arc::new(Recorder::default());
        pooled.add_connection_listener(recorder.clone());

        pooled.close().unwrap();
        assert!(physical.is_closed());

        // Listeners were cleared by close, so the error event reaches nobody.
        let err = pooled.logical_handle().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handle_on_released_physical_notifies_listeners() {
        let pooled = PooledConnection::new(Arc::new(MockPhysical::new("rm")));
        let recorder = Arc::new(Recorder::default());
        pooled.add_connection_listener(recorder.clone());

        // Simulate a release that leaves listeners in place.
        pooled.state.lock().physical = None;

        let err = pooled.logical_handle().unwrap_err();
        assert!(matches!(err, Error::PhysicalReleased));
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let physical = Arc::new(MockPhysical::new("rm"));
        let pooled = PooledConnection::new(physical.clone());
        let handle = pooled.logical_handle().unwrap();

        pooled.close().unwrap();
        pooled.close().unwrap();

        assert!(pooled.is_closed());
        assert!(handle.is_closed());
        assert_eq!(physical.close_count(), 1);
        pooled.notify_closed();
        pooled.notify_error(&Error::Backend("late".into()));
    }

    #[test]
    fn test_reset_failure_notifies_and_propagates() {
        let physical = Arc::new(MockPhysical::new("rm"));
        physical.fail_reset(true);
        let pooled = PooledConnection::new(physical.clone());
        let recorder = Arc::new(Recorder::default());
        pooled.add_connection_listener(recorder.clone());

        let err = pooled.logical_handle().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);

        // The XA path skips the reset.
        let handle = pooled.logical_handle_for(false, true).unwrap();
        assert!(handle.is_for_xa());
    }

    #[test]
    fn test_backend_failure_during_run_fires_error_event() {
        let physical = Arc::new(MockPhysical::new("rm"));
        let pooled = PooledConnection::new(physical.clone());
        let recorder = Arc::new(Recorder::default());
        pooled.add_connection_listener(recorder.clone());

        let handle = pooled.logical_handle().unwrap();
        let err = handle
            .run(|_| -> Result<()> { Err(Error::Backend("connection reset".into())) })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_xa_handle_rejects_local_commit_in_global_tx() {
        let physical = Arc::new(MockPhysical::new("rm"));
        let pooled = PooledConnection::new(physical.clone());
        let handle = pooled.logical_handle_for(false, true).unwrap();

        physical.set_in_global_transaction(true);
        let err = handle.commit().unwrap_err();
        assert!(matches!(err, Error::InGlobalTransaction { operation: "commit" }));
        assert!(handle.set_auto_commit(true).is_err());
        handle.set_auto_commit(false).unwrap();

        physical.set_in_global_transaction(false);
        handle.rollback().unwrap();
    }
}
