//! # Kernel
//!
//! The single global sporadic server and the API a host kernel calls.
//!
//! Every function enters a critical section around the server state, except
//! the `*_locked` variants and the hooks, which take the `CriticalSection`
//! token of a caller that already holds it (the host's switch path and timer
//! interrupts run with interrupts masked).
//!
//! ## Startup Sequence
//!
//! ```text
//! host boot
//!   ├─► kernel::init(config, &port)   ← Create the server thread
//!   │     (thread entry = kernel::run(&port), never returns)
//!   ├─► install hooks
//!   │     ├─► switch path  → kernel::on_context_switch(cs, next, prev, &port)
//!   │     └─► timer expiry → kernel::on_timer(cs, timer, &port)
//!   └─► kernel::create_aperiodic(fun, arg, &port)   ← from any thread (×N)
//! ```

use log::info;

use crate::config::ServerConfig;
use crate::diag::Diagnostics;
use crate::error::SporadicError;
use crate::port::{Port, ThreadId, ThreadRef};
use crate::body::{self, ServerAccess};
use crate::request::{RequestFn, RequestHandle};
use crate::server::SporadicServer;
use crate::sync::{self, CriticalSection, Shared};
use crate::time::Ticks;
use crate::timer::TimerId;

// ---------------------------------------------------------------------------
// Global server instance
// ---------------------------------------------------------------------------

/// The system's sporadic server, `None` until `init()`.
static SERVER: Shared<Option<SporadicServer>> = sync::shared(None);

fn with_server<R>(
    cs: CriticalSection<'_>,
    f: impl FnOnce(&mut SporadicServer) -> R,
) -> Result<R, SporadicError> {
    let mut slot = SERVER.borrow_ref_mut(cs);
    let server = slot.as_mut().ok_or(SporadicError::NotInitialized)?;
    Ok(f(server))
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Create the sporadic server and its thread.
///
/// The host must start the returned thread on `run()`. A second call fails
/// with `AlreadyInitialized` and leaves the running server untouched.
pub fn init<P: Port>(config: ServerConfig, port: &P) -> Result<ThreadId, SporadicError> {
    sync::critical_section(|cs| {
        let mut slot = SERVER.borrow_ref_mut(cs);
        if slot.is_some() {
            return Err(SporadicError::AlreadyInitialized);
        }
        let server = SporadicServer::new(config, port)?;
        let thread = server.thread();
        *slot = Some(server);
        info!(
            "sporadic server ready: period={} capacity={} prio={}",
            config.period, config.capacity, config.priority
        );
        Ok(thread)
    })
}

/// Thread of the server, once initialized.
pub fn instance() -> Option<ThreadId> {
    sync::critical_section(|cs| SERVER.borrow_ref(cs).as_ref().map(SporadicServer::thread))
}

/// Allocate a request for `fun(arg)` and queue it behind the pending ones.
pub fn create_aperiodic<P: Port>(
    fun: RequestFn,
    arg: usize,
    port: &P,
) -> Result<RequestHandle, SporadicError> {
    sync::critical_section(|cs| with_server(cs, |server| server.create_aperiodic(fun, arg, port))?)
}

/// Queue an already executed request again.
pub fn enqueue<P: Port>(handle: RequestHandle, port: &P) -> Result<RequestHandle, SporadicError> {
    sync::critical_section(|cs| enqueue_locked(cs, handle, port))
}

/// `enqueue()` for a caller already inside a critical section, such as an
/// interrupt handler.
pub fn enqueue_locked<P: Port>(
    cs: CriticalSection<'_>,
    handle: RequestHandle,
    port: &P,
) -> Result<RequestHandle, SporadicError> {
    with_server(cs, |server| server.enqueue(handle, port))?
}

/// Return an idle request slot to the arena.
pub fn release(handle: RequestHandle) -> Result<(), SporadicError> {
    sync::critical_section(|cs| with_server(cs, |server| server.release(handle))?)
}

/// True unless the server is already in the ready set.
pub fn needs_wakeup() -> Result<bool, SporadicError> {
    sync::critical_section(|cs| with_server(cs, |server| server.needs_wakeup()))
}

// ---------------------------------------------------------------------------
// Host hooks
// ---------------------------------------------------------------------------

/// Context-switch hook. Call on every switch from `prev` to `next`.
///
/// Switches before `init()` are ignored.
pub fn on_context_switch<P: Port>(
    cs: CriticalSection<'_>,
    next: ThreadRef,
    prev: ThreadRef,
    port: &P,
) -> Result<(), SporadicError> {
    match SERVER.borrow_ref_mut(cs).as_mut() {
        Some(server) => server.on_context_switch(next, prev, port),
        None => Ok(()),
    }
}

/// Timer hook. Call when one of the server's timers expires.
pub fn on_timer<P: Port>(cs: CriticalSection<'_>, timer: TimerId, port: &P) {
    if let Some(server) = SERVER.borrow_ref_mut(cs).as_mut() {
        server.on_timer(timer, port);
    }
}

/// True when the running server instance has spent its budget and the host
/// must switch to another thread.
pub fn preemption_required(cs: CriticalSection<'_>) -> bool {
    SERVER
        .borrow_ref(cs)
        .as_ref()
        .is_some_and(SporadicServer::preemption_required)
}

/// Remaining budget of the server.
pub fn capacity() -> Result<Ticks, SporadicError> {
    sync::critical_section(|cs| with_server(cs, |server| server.capacity()))
}

/// Snapshot of the server's diagnostic counters.
pub fn diagnostics() -> Result<Diagnostics, SporadicError> {
    sync::critical_section(|cs| with_server(cs, |server| server.diagnostics().clone()))
}

/// Copy the most recent replenished amounts into `out`, oldest first.
#[cfg(feature = "diagnostics")]
pub fn recent_replenishments(out: &mut [Ticks]) -> Result<usize, SporadicError> {
    sync::critical_section(|cs| {
        with_server(cs, |server| server.diagnostics().recent_replenishments(out))
    })
}

// ---------------------------------------------------------------------------
// Server thread
// ---------------------------------------------------------------------------

fn expect_initialized(slot: Option<&mut SporadicServer>) -> &mut SporadicServer {
    match slot {
        Some(server) => server,
        None => panic!("sporadic server thread started before kernel::init()"),
    }
}

/// The global server as reached from its own thread.
///
/// # Panics
/// If the server is used before `init()`.
pub struct GlobalServer;

impl ServerAccess for GlobalServer {
    fn locked<R, F, T>(&mut self, f: F, then: T) -> R
    where
        F: FnOnce(&mut SporadicServer) -> R,
        T: FnOnce(&R),
    {
        sync::critical_section(|cs| {
            let result = f(expect_initialized(SERVER.borrow_ref_mut(cs).as_mut()));
            // Borrow released: the switch hook in `then` needs the server
            then(&result);
            result
        })
    }
}

/// Body of the server thread. **Does not return.**
///
/// Runs the request at the head of the queue outside the critical section,
/// then advances the queue and sleeps or yields as the server decides.
///
/// # Panics
/// If called before `init()`.
pub fn run<P: Port>(port: &P) -> ! {
    let mut server = GlobalServer;
    loop {
        body::serve_one(&mut server, port);
    }
}
