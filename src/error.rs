//! Error definitions shared by every subsystem.
//!
//! # Design Decisions
//! - One crate-wide `Error` enum; callers branch on `ErrorKind`, not on variants
//! - XA protocol failures keep their own type (`XaError`) so `XaResource`
//!   implementations can return the XA error code unchanged
//! - Nothing in this crate retries; every error is either a precondition
//!   violation or a pass-through of a collaborator failure

use thiserror::Error;

use crate::pool::HandleId;
use crate::xa::XaError;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// XA protocol failure (unknown/malformed xid, resource fault).
    Protocol,
    /// Operation not valid in the current state.
    IllegalState,
    /// Referenced entity does not exist.
    NotFound,
    /// The physical connection is gone; the pooled connection is unusable.
    Fatal,
    /// Failure reported by the physical connection itself.
    Backend,
}

/// Errors produced by connection groups, pooled connections and XA wrappers.
#[derive(Debug, Error)]
pub enum Error {
    /// XA protocol-level failure.
    #[error(transparent)]
    Xa(#[from] XaError),

    /// Removing the host would leave the group without an active host.
    #[error("cannot remove host {host} from group {group}: it is the only active host")]
    LastActiveHost { group: String, host: String },

    /// The host is not a member of the group.
    #[error("host {host} is not configured in group {group}")]
    HostNotFound { group: String, host: String },

    /// A logical handle was used after it was closed or superseded.
    #[error("logical handle {0} is no longer valid")]
    HandleClosed(HandleId),

    /// The pooled connection's physical connection was already released.
    #[error("physical connection has already been released")]
    PhysicalReleased,

    /// A local transaction control was used while a global transaction is active.
    #[error("cannot call {operation} while in a global transaction")]
    InGlobalTransaction { operation: &'static str },

    /// Failure reported by the physical connection.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Xa(_) => ErrorKind::Protocol,
            Error::LastActiveHost { .. } => ErrorKind::IllegalState,
            Error::HostNotFound { .. } => ErrorKind::NotFound,
            Error::HandleClosed(_) => ErrorKind::IllegalState,
            Error::PhysicalReleased => ErrorKind::Fatal,
            Error::InGlobalTransaction { .. } => ErrorKind::IllegalState,
            Error::Backend(_) => ErrorKind::Backend,
        }
    }
}

/// Result type for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
