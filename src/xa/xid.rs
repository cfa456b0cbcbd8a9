//! Global transaction identifier.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::xa::types::{XaError, XaErrorCode, XaResult};

/// Maximum size of the global transaction id, in bytes.
pub const MAX_GTRID_SIZE: usize = 64;
/// Maximum size of the branch qualifier, in bytes.
pub const MAX_BQUAL_SIZE: usize = 64;
/// Format id reserved for the null xid.
pub const NULL_FORMAT_ID: i32 = -1;

/// Identifies one branch of a distributed transaction.
///
/// Equality covers all three components. Hashing only looks at the global
/// transaction id, so every branch of one global transaction lands in the
/// same bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xid {
    format_id: i32,
    gtrid: Vec<u8>,
    bqual: Vec<u8>,
}

impl Xid {
    /// Create an xid, rejecting oversized components.
    pub fn new(format_id: i32, gtrid: impl Into<Vec<u8>>, bqual: impl Into<Vec<u8>>) -> XaResult<Self> {
        let gtrid = gtrid.into();
        let bqual = bqual.into();
        if gtrid.len() > MAX_GTRID_SIZE {
            return Err(XaError::new(
                XaErrorCode::Invalid,
                format!("global transaction id is {} bytes, limit is {}", gtrid.len(), MAX_GTRID_SIZE),
            ));
        }
        if bqual.len() > MAX_BQUAL_SIZE {
            return Err(XaError::new(
                XaErrorCode::Invalid,
                format!("branch qualifier is {} bytes, limit is {}", bqual.len(), MAX_BQUAL_SIZE),
            ));
        }
        Ok(Self {
            format_id,
            gtrid,
            bqual,
        })
    }

    /// The null xid.
    pub fn null() -> Self {
        Self {
            format_id: NULL_FORMAT_ID,
            gtrid: Vec::new(),
            bqual: Vec::new(),
        }
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_transaction_id(&self) -> &[u8] {
        &self.gtrid
    }

    pub fn branch_qualifier(&self) -> &[u8] {
        &self.bqual
    }

    /// True for the null xid, which names no transaction.
    pub fn is_null(&self) -> bool {
        self.format_id == NULL_FORMAT_ID
    }
}

impl Hash for Xid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.gtrid.hash(state);
    }
}

/// Renders as `0x<gtrid>,0x<bqual>,<format id>`, the form used in `XA` commands.
impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{},", hex::encode(&self.gtrid))?;
        if !self.bqual.is_empty() {
            write!(f, "0x{}", hex::encode(&self.bqual))?;
        }
        write!(f, ",{}", self.format_id)
    }
}
