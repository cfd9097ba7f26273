//! # Timer Bridge
//!
//! Maps pending replenishments onto the host's one-shot deadline timers.
//!
//! Two kinds of timer exist:
//! - the **reservation** timer, a single instance re-armed every time the
//!   server takes the processor, expiring when the instance's budget is
//!   spent;
//! - a pool of `REPLENISHMENT_TIMERS` **replenishment** timers, each bound
//!   while armed to the ledger slot it will give back.
//!
//! The bridge tracks which timers are armed so that `is_armed()` never has
//! to ask the host, and so a late firing of a cancelled timer is detected.

use crate::config::REPLENISHMENT_TIMERS;
use crate::error::SporadicError;
use crate::ledger::SlotId;
use crate::port::Port;
use crate::time::Ticks;

/// Names one of the server's deadline timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Budget expiry for the current execution instance.
    Reservation,
    /// Replenishment pool timer by index.
    Replenishment(u8),
}

/// What an expired timer means for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The execution instance's budget is spent.
    BudgetSpent,
    /// The replenishment held by this ledger slot is due.
    Replenish(SlotId),
}

/// Armed/idle bookkeeping for the reservation timer and the pool.
pub struct TimerBridge {
    reservation_armed: bool,
    pool: [Option<SlotId>; REPLENISHMENT_TIMERS],
}

impl TimerBridge {
    pub const fn new() -> Self {
        Self {
            reservation_armed: false,
            pool: [None; REPLENISHMENT_TIMERS],
        }
    }

    // -- Reservation timer ----------------------------------------------------

    /// (Re)arm the reservation timer for `delay` ticks.
    pub fn arm_reservation<P: Port>(&mut self, delay: Ticks, port: &P) {
        if self.reservation_armed {
            port.disarm_timer(TimerId::Reservation);
        }
        port.arm_timer(TimerId::Reservation, delay);
        self.reservation_armed = true;
    }

    /// Disarm the reservation timer if it is armed.
    pub fn cancel_reservation<P: Port>(&mut self, port: &P) {
        if self.reservation_armed {
            port.disarm_timer(TimerId::Reservation);
            self.reservation_armed = false;
        }
    }

    // -- Replenishment pool ---------------------------------------------------

    /// First idle pool timer, if any.
    pub fn free_timer(&self) -> Option<TimerId> {
        self.pool
            .iter()
            .position(Option::is_none)
            .map(|index| TimerId::Replenishment(index as u8))
    }

    /// Arm an idle pool timer to mature ledger slot `slot` after `delay`.
    ///
    /// Nothing is armed when the pool is exhausted.
    pub fn arm_one_shot<P: Port>(
        &mut self,
        delay: Ticks,
        slot: SlotId,
        port: &P,
    ) -> Result<TimerId, SporadicError> {
        let timer = self
            .free_timer()
            .ok_or(SporadicError::CapacityPoolExhausted)?;
        if let TimerId::Replenishment(index) = timer {
            self.pool[usize::from(index)] = Some(slot);
        }
        port.arm_timer(timer, delay);
        Ok(timer)
    }

    /// Cancel a pool timer, returning the slot it was bound to.
    pub fn cancel<P: Port>(&mut self, timer: TimerId, port: &P) -> Option<SlotId> {
        match timer {
            TimerId::Reservation => {
                self.cancel_reservation(port);
                None
            }
            TimerId::Replenishment(index) => {
                let slot = self.pool.get_mut(usize::from(index))?.take()?;
                port.disarm_timer(timer);
                Some(slot)
            }
        }
    }

    // -- Both ---------------------------------------------------------------------

    pub fn is_armed(&self, timer: TimerId) -> bool {
        match timer {
            TimerId::Reservation => self.reservation_armed,
            TimerId::Replenishment(index) => self
                .pool
                .get(usize::from(index))
                .is_some_and(Option::is_some),
        }
    }

    /// Record that the host fired `timer`.
    ///
    /// Returns `None` for a timer that was not armed (a stale firing).
    pub fn expire(&mut self, timer: TimerId) -> Option<Expiry> {
        match timer {
            TimerId::Reservation => {
                if !self.reservation_armed {
                    return None;
                }
                self.reservation_armed = false;
                Some(Expiry::BudgetSpent)
            }
            TimerId::Replenishment(index) => {
                let slot = self.pool.get_mut(usize::from(index))?.take()?;
                Some(Expiry::Replenish(slot))
            }
        }
    }

    /// Number of pool timers currently armed.
    pub fn armed_replenishments(&self) -> usize {
        self.pool.iter().filter(|timer| timer.is_some()).count()
    }
}

impl Default for TimerBridge {
    fn default() -> Self {
        Self::new()
    }
}
