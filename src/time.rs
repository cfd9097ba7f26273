//! # Time Arithmetic
//!
//! The system clock is a bounded ring of `Ticks` that wraps at
//! `TICK_BOUND`. Every elapsed-time computation in the server goes through
//! this module so that an instance spanning the wrap is still measured
//! correctly.

use crate::config::TICK_BOUND;

/// A time quantity or timestamp in system ticks.
pub type Ticks = u32;

/// Thread priority (higher = more important).
pub type Priority = u8;

/// Ticks elapsed between `start` and `end` on the bounded clock.
///
/// When `start > end` the clock wrapped in between and the delta is
/// `(TICK_BOUND - start) + end`.
#[inline]
pub fn elapsed(start: Ticks, end: Ticks) -> Ticks {
    if start > end {
        (TICK_BOUND - start).wrapping_add(end)
    } else {
        end - start
    }
}

/// Delay from `now` until the replenishment due at `activation + period`.
///
/// A due time that has already passed yields a delay of one tick, the
/// shortest a one-shot timer accepts.
#[inline]
pub fn replenishment_delay(activation: Ticks, period: Ticks, now: Ticks) -> Ticks {
    match period.checked_sub(elapsed(activation, now)) {
        Some(delay) if delay > 0 => delay,
        _ => 1,
    }
}
