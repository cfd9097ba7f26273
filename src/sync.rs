//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. The server's state is
//! touched from thread context (request submission, the server body) and
//! from interrupt context (timer expiry, the context-switch hook), so every
//! access goes through a critical section.
//!
//! The implementation comes from the `critical-section` crate: on a
//! single-core Cortex-M target `cortex-m` provides it by masking interrupts,
//! on a host build the `std` implementation uses a global lock.

use core::cell::RefCell;

pub use critical_section::CriticalSection;

/// State shared between thread and interrupt context.
pub type Shared<T> = critical_section::Mutex<RefCell<T>>;

/// Create a `Shared` cell, usable in a `static` initializer.
pub const fn shared<T>(value: T) -> Shared<T> {
    critical_section::Mutex::new(RefCell::new(value))
}

/// Execute a closure within a critical section (interrupts disabled).
///
/// Keep critical sections short: they add directly to interrupt latency.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     let server = SERVER.borrow_ref_mut(cs);
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
