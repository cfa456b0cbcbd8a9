//! Pooled connection lifecycle.
//!
//! # Data Flow
//! ```text
//! Pool container
//!     → pooled.rs (PooledConnection owns one PhysicalConnection)
//!     → logical_handle(): invalidate previous handle
//!         → reset server session state
//!         → logical.rs (new LogicalConnection)
//!
//! LogicalConnection::close / backend failure
//!     → events.rs (snapshot listeners, dispatch on_closed / on_error)
//! ```
//!
//! # Design Decisions
//! - At most one live handle per pooled connection; superseded handles fail on use
//! - `close` releases the physical connection and clears listeners, idempotently
//! - Statement and connection listeners are independent registries

pub mod events;
pub mod logical;
pub mod physical;
pub mod pooled;

pub use events::{ConnectionEvent, ConnectionEventListener, StatementEvent, StatementEventListener};
pub use logical::{HandleId, LogicalConnection};
pub use physical::PhysicalConnection;
pub use pooled::PooledConnection;
