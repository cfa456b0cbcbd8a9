//! XA flags, prepare votes and error definitions.

use std::fmt;
use std::ops::BitOr;

use thiserror::Error;

/// Flags passed to `start`, `end` and `recover`.
///
/// Values match the X/Open XA constants so they can cross process boundaries
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct XaFlags(u32);

impl XaFlags {
    pub const NO_FLAGS: XaFlags = XaFlags(0);
    pub const END_RSCAN: XaFlags = XaFlags(0x0080_0000);
    pub const START_RSCAN: XaFlags = XaFlags(0x0100_0000);
    pub const SUSPEND: XaFlags = XaFlags(0x0200_0000);
    pub const SUCCESS: XaFlags = XaFlags(0x0400_0000);
    pub const RESUME: XaFlags = XaFlags(0x0800_0000);
    pub const FAIL: XaFlags = XaFlags(0x2000_0000);
    pub const ONE_PHASE: XaFlags = XaFlags(0x4000_0000);
    pub const JOIN: XaFlags = XaFlags(0x0020_0000);

    /// Build from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: XaFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// True if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `self` with the bits of `other` cleared.
    pub const fn without(self, other: XaFlags) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for XaFlags {
    type Output = XaFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        XaFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for XaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Outcome of `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Branch is prepared and must be committed or rolled back.
    Ok,
    /// Branch did no work; it is already complete.
    ReadOnly,
}

/// XA error codes (`XA_*` and `XAER_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XaErrorCode {
    /// XA_RBROLLBACK: rolled back for an unspecified reason.
    RolledBack,
    /// XA_RBTIMEOUT: rolled back after taking too long.
    RolledBackTimeout,
    /// XA_HEURMIX: partially committed and partially rolled back.
    HeuristicMixed,
    /// XA_HEURRB: heuristically rolled back.
    HeuristicRollback,
    /// XA_HEURCOM: heuristically committed.
    HeuristicCommit,
    /// XA_RETRY: routine returned with no effect and may be reissued.
    Retry,
    /// XAER_RMERR: resource manager error.
    ResourceManagerError,
    /// XAER_NOTA: the xid is not valid.
    NotA,
    /// XAER_INVAL: invalid arguments.
    Invalid,
    /// XAER_PROTO: routine invoked in an improper context.
    Protocol,
    /// XAER_RMFAIL: resource manager unavailable.
    ResourceManagerFailure,
    /// XAER_DUPID: the xid already exists.
    DuplicateId,
    /// XAER_OUTSIDE: resource manager doing work outside a global transaction.
    Outside,
}

impl XaErrorCode {
    /// The numeric X/Open code.
    pub fn as_i32(self) -> i32 {
        match self {
            XaErrorCode::RolledBack => 100,
            XaErrorCode::RolledBackTimeout => 106,
            XaErrorCode::HeuristicMixed => 5,
            XaErrorCode::HeuristicRollback => 6,
            XaErrorCode::HeuristicCommit => 7,
            XaErrorCode::Retry => 4,
            XaErrorCode::ResourceManagerError => -3,
            XaErrorCode::NotA => -4,
            XaErrorCode::Invalid => -5,
            XaErrorCode::Protocol => -6,
            XaErrorCode::ResourceManagerFailure => -7,
            XaErrorCode::DuplicateId => -8,
            XaErrorCode::Outside => -9,
        }
    }
}

impl fmt::Display for XaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            XaErrorCode::RolledBack => "XA_RBROLLBACK",
            XaErrorCode::RolledBackTimeout => "XA_RBTIMEOUT",
            XaErrorCode::HeuristicMixed => "XA_HEURMIX",
            XaErrorCode::HeuristicRollback => "XA_HEURRB",
            XaErrorCode::HeuristicCommit => "XA_HEURCOM",
            XaErrorCode::Retry => "XA_RETRY",
            XaErrorCode::ResourceManagerError => "XAER_RMERR",
            XaErrorCode::NotA => "XAER_NOTA",
            XaErrorCode::Invalid => "XAER_INVAL",
            XaErrorCode::Protocol => "XAER_PROTO",
            XaErrorCode::ResourceManagerFailure => "XAER_RMFAIL",
            XaErrorCode::DuplicateId => "XAER_DUPID",
            XaErrorCode::Outside => "XAER_OUTSIDE",
        };
        f.write_str(name)
    }
}

/// Protocol-level XA failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("XA error {code} ({}): {message}", code.as_i32())]
pub struct XaError {
    pub code: XaErrorCode,
    pub message: String,
}

impl XaError {
    pub fn new(code: XaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for XA operations.
pub type XaResult<T> = Result<T, XaError>;
