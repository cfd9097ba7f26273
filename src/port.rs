//! # Host Port
//!
//! The sporadic server is not a scheduler. It rides on a host RTOS that
//! owns the ready set, the context-switch path and the deadline timers.
//! `Port` is the full list of services the server consumes from it.
//!
//! ## Calling contract
//!
//! ```text
//!  host scheduler                      sporadic server
//!  ──────────────                      ───────────────
//!  every context switch ─────────────► on_context_switch(next, prev)
//!  timer armed via arm_timer expires ─► on_timer(timer)
//!  scheduler tick / preemption check ─► preemption_required()
//!                         ◄─────────── ready / unready / switch_out
//!                         ◄─────────── arm_timer / disarm_timer
//! ```
//!
//! Every method is called with interrupts disabled (inside the host's
//! critical section) and must not block. `ready`, `unready`, `arm_timer`
//! and `disarm_timer` must not call back into the server. `switch_out`
//! performs a context switch and therefore runs the switch hook.

use crate::time::{Priority, Ticks};
use crate::timer::TimerId;

/// Identifier of a host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u32);

/// A thread as seen by the switch hook: its identity and its priority at
/// the time of the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: ThreadId,
    pub priority: Priority,
}

impl ThreadRef {
    pub const fn new(id: ThreadId, priority: Priority) -> Self {
        Self { id, priority }
    }
}

/// Services the sporadic server needs from the host RTOS.
///
/// Methods take `&self`: a port is a handle onto kernel services whose
/// state lives in the host.
pub trait Port {
    /// Read the bounded system clock.
    fn now(&self) -> Ticks;

    /// Create the (not yet runnable) server thread with a stack of
    /// `stack_size` bytes. Called once, from `init()`.
    fn create_thread(&self, name: &'static str, priority: Priority, stack_size: usize) -> ThreadId;

    /// Insert `thread` into the ready set.
    fn ready(&self, thread: ThreadId);

    /// Remove `thread` from the ready set.
    fn unready(&self, thread: ThreadId);

    /// Switch away from the running server thread. Whether the thread is
    /// still in the ready set was decided by the caller before the call.
    fn switch_out(&self);

    /// Priority of the best thread in the ready set, if any.
    fn highest_ready_priority(&self) -> Option<Priority>;

    /// Arm the one-shot timer `timer` to expire `delay` ticks from now.
    /// On expiry the host calls `on_timer(timer)`.
    fn arm_timer(&self, timer: TimerId, delay: Ticks);

    /// Cancel `timer`. It must not fire afterwards.
    fn disarm_timer(&self, timer: TimerId);
}
