//! # Sporadic Server Configuration
//!
//! Compile-time constants sizing every pool the server owns, plus the
//! runtime parameters a host passes to `init()`.
//! All limits are fixed at compile time. No dynamic allocation.

use crate::error::SporadicError;
use crate::time::{Priority, Ticks};

/// Wrap bound of the system clock (2^32 - 1). An instance whose start
/// timestamp is larger than its end timestamp crossed this bound.
pub const TICK_BOUND: Ticks = u32::MAX;

/// Number of slots in the replenishment ledger.
pub const REPLENISHMENT_SLOTS: usize = 256;

/// Number of one-shot timers available for pending replenishments.
/// This bounds how many replenishments can be outstanding at once;
/// the ledger never holds more live entries than there are timers.
pub const REPLENISHMENT_TIMERS: usize = 10;

/// Number of aperiodic requests the server's arena can hold, queued or idle.
pub const MAX_REQUESTS: usize = 16;

/// Stack working area requested from the host for the server thread, in bytes.
pub const SERVER_STACK_SIZE: usize = 256;

/// Name given to the server thread.
pub const SERVER_THREAD_NAME: &str = "sporadic";

/// Number of replenished amounts kept by the diagnostic history ring.
pub const DIAGNOSTIC_HISTORY: usize = 10;

/// SysTick frequency in Hz on the Cortex-M4 target. One tick is the unit
/// of every `Ticks` quantity (period, capacity, timestamps).
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

// ---------------------------------------------------------------------------
// Runtime parameters
// ---------------------------------------------------------------------------

/// Parameters of the sporadic server, fixed at `init()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Replenishment period in ticks. Consumed capacity comes back
    /// `period` ticks after the activation time it was consumed under.
    pub period: Ticks,

    /// Execution budget per period in ticks. Also the maximum capacity.
    pub capacity: Ticks,

    /// Priority of the server thread (higher = more important).
    pub priority: Priority,
}

impl ServerConfig {
    pub const fn new(period: Ticks, capacity: Ticks, priority: Priority) -> Self {
        Self {
            period,
            capacity,
            priority,
        }
    }

    /// Reject parameters no sporadic server can run with.
    ///
    /// This is a sanity check only; no schedulability analysis is done.
    pub fn validate(&self) -> Result<(), SporadicError> {
        if self.period == 0 {
            return Err(SporadicError::InvalidConfig("period must be non-zero"));
        }
        if self.capacity == 0 {
            return Err(SporadicError::InvalidConfig("capacity must be non-zero"));
        }
        if self.capacity > self.period {
            return Err(SporadicError::InvalidConfig(
                "capacity must not exceed the period",
            ));
        }
        Ok(())
    }
}
