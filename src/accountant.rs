//! # Capacity Accountant
//!
//! The context-switch hook of the sporadic server. The host calls
//! `on_context_switch()` on every switch, inside its interrupt-disabled
//! switch path; the hook never blocks.
//!
//! ## Algorithm
//!
//! 1. **Entering** (`next` is the server): stamp the instance start and arm
//!    the reservation timer for the remaining capacity.
//! 2. **Leaving** (`prev` is the server): disarm the reservation timer,
//!    measure the instance (wrap-corrected), drain capacity by the consumed
//!    time and stage the same amount for replenishment.
//! 3. **Eligibility**, on every switch: the server is eligible while
//!    `capacity > 0` and the incoming thread's priority is at least the
//!    server's.
//!    - becoming eligible stamps the activation time `TA`;
//!    - becoming ineligible suspends a server that just ran dry and hands
//!      the staged time to the ledger, due at `TA + period`.
//!
//! Draining happens on every leave; replenishments are only scheduled at
//! eligibility-loss boundaries, so consecutive preemptions by higher
//! priority threads fold into a single ledger entry.

use log::{debug, error, trace};

use crate::error::SporadicError;
use crate::port::{Port, ThreadRef};
use crate::server::{ServerState, SporadicServer};
use crate::time::{self, Ticks};

impl SporadicServer {
    /// Context-switch hook: `prev` gives the processor to `next`.
    ///
    /// Returns `Err(CapacityPoolExhausted)` if consumed time could not be
    /// scheduled for replenishment; the accounting itself is complete and
    /// the amount stays staged for the next replenishment.
    pub fn on_context_switch<P: Port>(
        &mut self,
        next: ThreadRef,
        prev: ThreadRef,
        port: &P,
    ) -> Result<(), SporadicError> {
        let now = port.now();
        let leaving = prev.id == self.thread;

        if next.id == self.thread {
            self.enter(now, port);
        } else if leaving {
            self.leave(now, port);
        }

        self.update_eligibility(next, leaving, now, port)
    }

    fn enter<P: Port>(&mut self, now: Ticks, port: &P) {
        self.state = ServerState::Running;
        self.instance_start = now;
        self.ending = false;

        if self.capacity > 0 {
            self.timers.arm_reservation(self.capacity, port);
        } else {
            self.ending = true;
        }
        trace!("server in at {}, capacity={}", now, self.capacity);
    }

    fn leave<P: Port>(&mut self, now: Ticks, port: &P) {
        self.timers.cancel_reservation(port);
        self.ending = false;

        // Still marked running: the host preempted it and re-queued it
        if self.state == ServerState::Running {
            self.state = ServerState::Ready;
        }

        self.instance_end = now;
        self.consumed_time = self
            .consumed_time
            .saturating_add(time::elapsed(self.instance_start, self.instance_end));
        self.capacity = self.capacity.saturating_sub(self.consumed_time);
        self.time_to_replenish = self.time_to_replenish.saturating_add(self.consumed_time);
        trace!(
            "server out at {}, consumed={} capacity={}",
            now,
            self.consumed_time,
            self.capacity
        );
        self.consumed_time = 0;
    }

    fn update_eligibility<P: Port>(
        &mut self,
        next: ThreadRef,
        leaving: bool,
        now: Ticks,
        port: &P,
    ) -> Result<(), SporadicError> {
        let eligible = self.capacity > 0 && next.priority >= self.priority;

        if eligible {
            if self.must_update_activation {
                self.activation = now;
                self.must_update_activation = false;
            }
            return Ok(());
        }

        if self.must_update_activation {
            // Already ineligible
            return Ok(());
        }
        self.must_update_activation = true;

        if self.capacity == 0 && leaving {
            self.suspend(port);
        }
        if self.time_to_replenish != 0 {
            self.schedule_replenishment(now, port)?;
        }
        Ok(())
    }

    fn suspend<P: Port>(&mut self, port: &P) {
        if self.state == ServerState::Ready {
            port.unready(self.thread);
        }
        self.state = ServerState::Suspended;
        debug!("server suspended, capacity exhausted");
    }

    /// Move the staged time into the ledger and arm a pool timer for it.
    fn schedule_replenishment<P: Port>(&mut self, now: Ticks, port: &P) -> Result<(), SporadicError> {
        let amount = self.time_to_replenish;
        let delay = time::replenishment_delay(self.activation, self.period, now);

        if self.timers.free_timer().is_none() {
            return Err(self.pool_exhausted(amount));
        }
        let slot = match self.ledger.insert(amount) {
            Ok(slot) => slot,
            Err(_) => return Err(self.pool_exhausted(amount)),
        };
        if let Err(err) = self.timers.arm_one_shot(delay, slot, port) {
            self.ledger.take(slot);
            self.diag.record_pool_exhausted();
            return Err(err);
        }

        self.time_to_replenish = 0;
        debug!(
            "replenishment of {} scheduled in {} (TA={})",
            amount, delay, self.activation
        );
        Ok(())
    }

    fn pool_exhausted(&mut self, amount: Ticks) -> SporadicError {
        self.diag.record_pool_exhausted();
        error!(
            "replenishment pool exhausted, {} ticks deferred to the next replenishment",
            amount
        );
        SporadicError::CapacityPoolExhausted
    }
}
