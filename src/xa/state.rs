//! Per-branch state machine.
//!
//! # States
//! ```text
//! Unassigned ──start──▶ Active ──end──▶ Ended ──prepare──▶ Prepared
//!                         ▲               │                   │
//!                         └─start(JOIN)───┘                   │
//!                           (as RESUME)                       │
//! Active / Ended / Prepared ──commit / rollback / forget──▶ Completed
//! ```
//!
//! # Design Decisions
//! - `plan` never rejects a call; the resource manager is the authority on
//!   protocol order. Calls outside the usual order are flagged, not refused.
//! - JOIN is emulated by RESUME: this is the only rewrite rule and it applies
//!   in every state
//! - `Completed` releases the registry binding; the xid starts over as `Unassigned`

use crate::xa::types::XaFlags;

/// Lifecycle state of one branch binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Unassigned,
    Active,
    Ended,
    Prepared,
    Completed,
}

/// A branch-scoped XA call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    Start(XaFlags),
    End(XaFlags),
    Prepare,
    Commit { one_phase: bool },
    Rollback,
    Forget,
}

impl BranchOp {
    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            BranchOp::Start(_) => "start",
            BranchOp::End(_) => "end",
            BranchOp::Prepare => "prepare",
            BranchOp::Commit { .. } => "commit",
            BranchOp::Rollback => "rollback",
            BranchOp::Forget => "forget",
        }
    }

    /// True for calls that finish the branch and release its binding.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BranchOp::Commit { .. } | BranchOp::Rollback | BranchOp::Forget)
    }
}

/// What to send to the resource manager, and where the branch goes on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The call to delegate (after rewrite rules).
    pub delegate: BranchOp,
    /// State after the delegate call succeeds.
    pub next: BranchState,
    /// False when the call is outside the usual XA order for `from`.
    pub expected: bool,
}

/// Rewrite `start(JOIN)` into `start(RESUME)`.
fn rewrite(op: BranchOp) -> BranchOp {
    match op {
        BranchOp::Start(flags) if flags.contains(XaFlags::JOIN) => {
            BranchOp::Start(flags.without(XaFlags::JOIN) | XaFlags::RESUME)
        }
        other => other,
    }
}

/// The transition table.
pub fn plan(from: BranchState, op: BranchOp) -> Transition {
    use BranchState::*;

    let delegate = rewrite(op);
    let (next, expected) = match delegate {
        BranchOp::Start(flags) if flags.contains(XaFlags::RESUME) => (Active, matches!(from, Active | Ended)),
        BranchOp::Start(_) => (Active, matches!(from, Unassigned | Completed)),
        BranchOp::End(_) => (Ended, from == Active),
        BranchOp::Prepare => (Prepared, from == Ended),
        BranchOp::Commit { one_phase: true } => (Completed, matches!(from, Active | Ended)),
        BranchOp::Commit { one_phase: false } => (Completed, matches!(from, Prepared | Unassigned)),
        BranchOp::Rollback => (Completed, from != Completed),
        BranchOp::Forget => (Completed, from != Active),
    };

    Transition {
        delegate,
        next,
        expected,
    }
}
