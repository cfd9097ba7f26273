//! # Diagnostics
//!
//! Counters a host can read back to observe the server, and, with the
//! `diagnostics` feature, a ring of the most recent replenished amounts.
//! Detailed event tracing goes through the `log` facade instead.

#[cfg(feature = "diagnostics")]
use crate::config::DIAGNOSTIC_HISTORY;
use crate::time::Ticks;

/// Per-server diagnostic state, updated inside the critical section.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Number of times the reservation timer expired.
    pub reservation_expirations: u32,
    /// Number of replenishments applied to the capacity.
    pub replenishments: u32,
    /// Number of times a replenishment could not be scheduled because
    /// the timer pool or the ledger was exhausted.
    pub pool_exhaustions: u32,
    #[cfg(feature = "diagnostics")]
    history: [Ticks; DIAGNOSTIC_HISTORY],
    #[cfg(feature = "diagnostics")]
    next: usize,
    #[cfg(feature = "diagnostics")]
    filled: usize,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            reservation_expirations: 0,
            replenishments: 0,
            pool_exhaustions: 0,
            #[cfg(feature = "diagnostics")]
            history: [0; DIAGNOSTIC_HISTORY],
            #[cfg(feature = "diagnostics")]
            next: 0,
            #[cfg(feature = "diagnostics")]
            filled: 0,
        }
    }

    pub(crate) fn record_replenishment(&mut self, amount: Ticks) {
        self.replenishments = self.replenishments.wrapping_add(1);
        #[cfg(feature = "diagnostics")]
        {
            self.history[self.next] = amount;
            self.next = (self.next + 1) % DIAGNOSTIC_HISTORY;
            self.filled = (self.filled + 1).min(DIAGNOSTIC_HISTORY);
        }
        #[cfg(not(feature = "diagnostics"))]
        let _ = amount;
    }

    pub(crate) fn record_reservation_expired(&mut self) {
        self.reservation_expirations = self.reservation_expirations.wrapping_add(1);
    }

    pub(crate) fn record_pool_exhausted(&mut self) {
        self.pool_exhaustions = self.pool_exhaustions.wrapping_add(1);
    }

    /// Copy the most recent replenished amounts into `out`, oldest first.
    /// Returns how many were written.
    #[cfg(feature = "diagnostics")]
    pub fn recent_replenishments(&self, out: &mut [Ticks]) -> usize {
        let count = self.filled.min(out.len());
        // Oldest retained entry sits at `next` once the ring is full
        let start = (self.next + DIAGNOSTIC_HISTORY - self.filled) % DIAGNOSTIC_HISTORY;
        let skip = self.filled - count;
        for (i, value) in out.iter_mut().take(count).enumerate() {
            *value = self.history[(start + skip + i) % DIAGNOSTIC_HISTORY];
        }
        count
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
