//! Shared xid → branch binding registry.
//!
//! # Responsibilities
//! - Bind each xid to one `DirectXaConnection`, created on first reference
//! - Hand the same binding to every multiplexer presenting an equal xid
//! - Drop bindings once a terminal outcome was requested
//!
//! # Design Decisions
//! - One lock for the whole map; bindings are cheap to create so creation
//!   happens under it
//! - Constructed explicitly and shared via `Arc`, not a hidden static

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::pool::PhysicalConnection;
use crate::xa::direct::DirectXaConnection;
use crate::xa::state::BranchState;
use crate::xa::xid::Xid;

/// One xid's assigned resource plus its tracked state.
pub struct BranchBinding {
    xid: Xid,
    connection: DirectXaConnection,
    state: Mutex<BranchState>,
}

impl BranchBinding {
    fn new(xid: Xid, connection: DirectXaConnection) -> Self {
        Self {
            xid,
            connection,
            state: Mutex::new(BranchState::Unassigned),
        }
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    pub fn connection(&self) -> &DirectXaConnection {
        &self.connection
    }

    pub fn state(&self) -> BranchState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: BranchState) {
        *self.state.lock() = state;
    }
}

impl fmt::Debug for BranchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchBinding")
            .field("xid", &self.xid.to_string())
            .field("state", &self.state())
            .finish()
    }
}

/// Registry of live branch bindings.
#[derive(Default)]
pub struct BranchRegistry {
    bindings: Mutex<HashMap<Xid, Arc<BranchBinding>>>,
}

impl BranchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The binding for `xid`, creating it with `create` if absent.
    pub fn bind(&self, xid: &Xid, create: impl FnOnce() -> DirectXaConnection) -> Arc<BranchBinding> {
        let mut bindings = self.bindings.lock();
        if let Some(existing) = bindings.get(xid) {
            return Arc::clone(existing);
        }
        tracing::trace!(xid = %xid, "Creating branch binding");
        let binding = Arc::new(BranchBinding::new(xid.clone(), create()));
        bindings.insert(xid.clone(), Arc::clone(&binding));
        binding
    }

    pub fn lookup(&self, xid: &Xid) -> Option<Arc<BranchBinding>> {
        self.bindings.lock().get(xid).cloned()
    }

    /// Remove `binding` if it is still the one registered for its xid.
    ///
    /// Returns true if an entry was removed.
    pub fn release(&self, binding: &Arc<BranchBinding>) -> bool {
        let mut bindings = self.bindings.lock();
        match bindings.get(binding.xid()) {
            Some(current) if Arc::ptr_eq(current, binding) => {
                bindings.remove(binding.xid());
                true
            }
            _ => false,
        }
    }

    /// Remove every binding whose connection runs on `physical`.
    ///
    /// Returns the number of bindings removed.
    pub fn release_bound_to(&self, physical: &Arc<dyn PhysicalConnection>) -> usize {
        let mut bindings = self.bindings.lock();
        let before = bindings.len();
        bindings.retain(|_, binding| {
            let bound_here = binding
                .connection()
                .pooled()
                .physical()
                .is_some_and(|p| std::ptr::addr_eq(Arc::as_ptr(&p), Arc::as_ptr(physical)));
            if bound_here {
                binding.set_state(BranchState::Completed);
            }
            !bound_here
        });
        before - bindings.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }

    /// Xids that currently have a binding.
    pub fn bound_xids(&self) -> Vec<Xid> {
        self.bindings.lock().keys().cloned().collect()
    }
}

impl fmt::Debug for BranchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchRegistry")
            .field("bindings", &self.len())
            .finish()
    }
}
