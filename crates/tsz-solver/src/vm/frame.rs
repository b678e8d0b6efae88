//! The VM's per-call and per-loop bookkeeping records (spec §3, §4.6).

use crate::types::TypeId;

/// Per-call VM record demarcating the stack region a call (or a compound
/// constructor) owns.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    /// Stack pointer at the moment this frame was pushed; `Loads(0, idx)`
    /// reads `stack[initial_sp + idx]`.
    pub initial_sp: usize,
    /// Number of `TypeArgument`/`Slots`-reserved variable slots.
    pub slot_count: u16,
    /// The active `Distribute` loop over this frame, if any.
    pub loop_cursor: Option<u32>,
}

impl Frame {
    #[must_use]
    pub fn new(initial_sp: usize) -> Self {
        Frame {
            initial_sp,
            slot_count: 0,
            loop_cursor: None,
        }
    }
}

/// Per-call VM record tracking bytecode position and call depth.
#[derive(Clone, Copy, Debug)]
pub struct ActiveSubroutine {
    pub ip: u32,
    pub subroutine: u32,
    pub depth: u32,
    pub type_arguments_supplied: u16,
}

/// Cursor state for one `Distribute` loop, pushed on the loop stack
/// alongside an owning [`Frame`] (spec §4.6, "Distribute").
#[derive(Clone, Debug)]
pub struct LoopHelper {
    /// Remaining union members to iterate, outermost first.
    pub remaining: Vec<TypeId>,
    /// Results accumulated from each iteration so far, unioned at the end.
    pub results: Vec<TypeId>,
    /// The frame slot the current iteration's bound value lives in.
    pub slot_idx: u16,
    /// Absolute ip just past the loop body, to resume at once exhausted.
    pub end_ip: u32,
}
