//! # Cortex-M4 Port Layer
//!
//! The system tick a Cortex-M4 host builds its `Port` on.
//!
//! SysTick fires at `TICK_HZ` and advances a free-running `Ticks` counter,
//! which wraps around as the server's bounded clock expects. The host's own
//! SysTick handler calls [`tick()`]; with the `systick` feature this module
//! installs a handler that does only that.
//! Context switches are requested through PendSV.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: Priority 0xFF (lowest)
//! - PendSV: Priority 0xFF (lowest), runs only when no other ISR is active
//!
//! The context-switch hook runs inside the host's PendSV handler, so it
//! never preempts an application interrupt.

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
#[cfg(feature = "systick")]
use cortex_m_rt::exception;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::time::Ticks;

static TICKS: AtomicU32 = AtomicU32::new(0);

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at `TICK_HZ` from the processor clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Advance the tick counter by one. Call once per SysTick interrupt.
#[inline]
pub fn tick() {
    // Free-running, wraps
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Current system time in ticks.
#[inline]
pub fn now() -> Ticks {
    TICKS.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Request a context switch. The host's PendSV handler performs it once no
/// other ISR is active.
#[inline]
pub fn trigger_pendsv() {
    SCB::set_pendsv();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Set PendSV and SysTick to the lowest interrupt priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // Lowest priority; only the implemented high bits are kept
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

#[cfg(feature = "systick")]
#[exception]
fn SysTick() {
    tick();
}
