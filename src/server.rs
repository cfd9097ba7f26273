//! # Sporadic Server
//!
//! The schedulable entity that serves aperiodic requests under a
//! replenished budget.
//!
//! ## State machine
//!
//! ```text
//!                  enqueue (queue was empty, capacity > 0)
//!   ┌──────────┐ ───────────────────────────────────────► ┌─────────┐
//!   │ Sleeping │                                          │  Ready  │ ◄──┐
//!   └──────────┘ ◄────────┐                               └─────────┘    │
//!                         │ queue drained                      │         │ preempted /
//!                         │                      switched in   ▼         │ yield to higher
//!                         │                               ┌─────────┐    │
//!                         └────────────────────────────── │ Running │ ───┘
//!                                                         └─────────┘
//!   ┌───────────┐    capacity hits 0 while leaving             │
//!   │ Suspended │ ◄────────────────────────────────────────────┘
//!   └───────────┘ ──► Ready once a replenishment restores capacity
//!                     and requests are pending
//! ```
//!
//! The context-switch hook that drives `Running` in and out lives in
//! `accountant.rs`; this file holds the state, the lifecycle API, the body
//! transitions and the timer callbacks.

use log::{debug, trace, warn};

use crate::config::{ServerConfig, SERVER_STACK_SIZE, SERVER_THREAD_NAME};
use crate::diag::Diagnostics;
use crate::error::SporadicError;
use crate::ledger::{ReplenishmentLedger, SlotId};
use crate::port::{Port, ThreadId};
use crate::request::{AperiodicRequest, RequestFn, RequestHandle, RequestQueue};
use crate::time::{Priority, Ticks};
use crate::timer::{Expiry, TimerBridge, TimerId};

/// Scheduling state of the server thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// In the host's ready set.
    Ready,
    /// Holding the processor.
    Running,
    /// Queue empty; waiting for a request.
    Sleeping,
    /// Capacity exhausted; out of the ready set until replenished.
    Suspended,
}

/// What the server body must do after finishing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStep {
    /// Run the next request right away.
    Continue,
    /// Queue drained: block until a new request arrives.
    Sleep,
    /// A higher-priority thread is ready: the server has been re-queued,
    /// switch away.
    Yield,
}

/// The sporadic server.
///
/// Exactly one instance exists per system; `kernel::init()` enforces this
/// for the global instance. Every method runs inside the critical section.
pub struct SporadicServer {
    pub(crate) thread: ThreadId,
    pub(crate) priority: Priority,
    pub(crate) period: Ticks,
    pub(crate) capacity: Ticks,
    pub(crate) maximum_capacity: Ticks,

    /// Time used by the instance being accounted; folded into
    /// `time_to_replenish` and reset on every leave.
    pub(crate) consumed_time: Ticks,
    pub(crate) instance_start: Ticks,
    pub(crate) instance_end: Ticks,

    /// Activation time (TA): replenishments fall due at `activation + period`.
    pub(crate) activation: Ticks,
    /// Consumed time not yet handed to the ledger.
    pub(crate) time_to_replenish: Ticks,
    /// Set while the server is ineligible, so `activation` moves exactly
    /// once per eligibility transition.
    pub(crate) must_update_activation: bool,
    /// Set by the reservation timer: the running instance's budget is spent.
    pub(crate) ending: bool,

    pub(crate) state: ServerState,
    pub(crate) requests: RequestQueue,
    pub(crate) ledger: ReplenishmentLedger,
    pub(crate) timers: TimerBridge,
    pub(crate) diag: Diagnostics,
}

impl SporadicServer {
    /// Create the server and its thread.
    ///
    /// The thread starts out sleeping with a full budget; the first
    /// request makes it ready.
    pub fn new<P: Port>(config: ServerConfig, port: &P) -> Result<Self, SporadicError> {
        config.validate()?;

        let thread = port.create_thread(SERVER_THREAD_NAME, config.priority, SERVER_STACK_SIZE);
        debug!(
            "sporadic server created: thread={:?} period={} capacity={} prio={}",
            thread, config.period, config.capacity, config.priority
        );

        Ok(Self {
            thread,
            priority: config.priority,
            period: config.period,
            capacity: config.capacity,
            maximum_capacity: config.capacity,
            consumed_time: 0,
            instance_start: 0,
            instance_end: 0,
            activation: 0,
            time_to_replenish: 0,
            must_update_activation: true,
            ending: false,
            state: ServerState::Sleeping,
            requests: RequestQueue::new(),
            ledger: ReplenishmentLedger::new(),
            timers: TimerBridge::new(),
            diag: Diagnostics::new(),
        })
    }

    // -- Queries --------------------------------------------------------------

    #[inline]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    pub fn period(&self) -> Ticks {
        self.period
    }

    /// Remaining budget.
    #[inline]
    pub fn capacity(&self) -> Ticks {
        self.capacity
    }

    #[inline]
    pub fn maximum_capacity(&self) -> Ticks {
        self.maximum_capacity
    }

    #[inline]
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Current activation time (TA).
    #[inline]
    pub fn activation_time(&self) -> Ticks {
        self.activation
    }

    /// Consumed time waiting to be scheduled for replenishment.
    #[inline]
    pub fn staged_replenishment(&self) -> Ticks {
        self.time_to_replenish
    }

    pub fn ledger(&self) -> &ReplenishmentLedger {
        &self.ledger
    }

    pub fn timers(&self) -> &TimerBridge {
        &self.timers
    }

    pub fn requests(&self) -> &RequestQueue {
        &self.requests
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// True unless the server is already in the ready set.
    #[inline]
    pub fn needs_wakeup(&self) -> bool {
        self.state != ServerState::Ready
    }

    /// True when the running instance has spent its budget. The host must
    /// then switch to another thread; the switch hook suspends the server.
    #[inline]
    pub fn preemption_required(&self) -> bool {
        self.ending && self.state == ServerState::Running
    }

    // -- Requests -------------------------------------------------------------

    /// Allocate a request for `fun(arg)` and queue it.
    pub fn create_aperiodic<P: Port>(
        &mut self,
        fun: RequestFn,
        arg: usize,
        port: &P,
    ) -> Result<RequestHandle, SporadicError> {
        let handle = self.requests.allocate(fun, arg)?;
        if let Err(err) = self.enqueue(handle, port) {
            // Fresh slot, cannot be queued: hand it back
            let _ = self.requests.release(handle);
            return Err(err);
        }
        Ok(handle)
    }

    /// Queue an allocated request behind the ones already waiting.
    ///
    /// If the queue was empty the server has work again and is made ready,
    /// unless its budget is exhausted, in which case the next replenishment
    /// readies it.
    pub fn enqueue<P: Port>(
        &mut self,
        handle: RequestHandle,
        port: &P,
    ) -> Result<RequestHandle, SporadicError> {
        let was_empty = self.requests.push_back(handle)?;
        trace!("aperiodic request {} queued", handle.index());

        if was_empty {
            match self.state {
                ServerState::Sleeping | ServerState::Suspended if self.capacity > 0 => {
                    self.make_ready(port)
                }
                ServerState::Sleeping => self.state = ServerState::Suspended,
                _ => {}
            }
        }
        Ok(handle)
    }

    /// Free an allocated request that is not queued.
    pub fn release(&mut self, handle: RequestHandle) -> Result<(), SporadicError> {
        self.requests.release(handle)
    }

    // -- Server body ------------------------------------------------------------

    /// The request the body should execute next.
    pub fn next_request(&self) -> Option<AperiodicRequest> {
        self.requests.front().copied()
    }

    /// Advance the queue past the request just executed and decide whether
    /// the body keeps running, sleeps or yields.
    pub fn finish_request<P: Port>(&mut self, port: &P) -> BodyStep {
        self.requests.pop_front();

        if self.requests.is_empty() {
            self.state = ServerState::Sleeping;
            BodyStep::Sleep
        } else if port
            .highest_ready_priority()
            .is_some_and(|prio| prio > self.priority)
        {
            self.make_ready(port);
            BodyStep::Yield
        } else {
            BodyStep::Continue
        }
    }

    /// Body woke up with nothing to do.
    pub fn idle(&mut self) -> BodyStep {
        self.state = ServerState::Sleeping;
        BodyStep::Sleep
    }

    // -- Timer callbacks --------------------------------------------------------

    /// Handle the expiry of one of the server's timers.
    pub fn on_timer<P: Port>(&mut self, timer: TimerId, port: &P) {
        match self.timers.expire(timer) {
            Some(Expiry::BudgetSpent) => self.reservation_expired(),
            Some(Expiry::Replenish(slot)) => self.replenish(slot, port),
            None => warn!("stale expiry of {:?} ignored", timer),
        }
    }

    fn reservation_expired(&mut self) {
        self.ending = true;
        self.diag.record_reservation_expired();
        trace!("reservation expired, capacity={}", self.capacity);
    }

    fn replenish<P: Port>(&mut self, slot: SlotId, port: &P) {
        let Some(amount) = self.ledger.take(slot) else {
            warn!("replenishment timer bound to empty slot {}", slot.index());
            return;
        };

        let old = self.capacity;
        self.capacity = self
            .capacity
            .saturating_add(amount)
            .min(self.maximum_capacity);
        self.diag.record_replenishment(amount);
        debug!(
            "replenished {} ticks, capacity {} -> {}",
            amount, old, self.capacity
        );

        // Only a server suspended at zero with work pending goes back to the
        // ready set; anything else would insert it a second time.
        if self.state == ServerState::Suspended && old == 0 && !self.requests.is_empty() {
            self.make_ready(port);
        }
    }

    // -- Ready set ------------------------------------------------------------------

    pub(crate) fn make_ready<P: Port>(&mut self, port: &P) {
        assert!(
            self.state != ServerState::Ready,
            "sporadic server inserted into the ready set twice"
        );
        self.state = ServerState::Ready;
        port.ready(self.thread);
    }
}
