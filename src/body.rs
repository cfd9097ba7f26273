//! # Server Body
//!
//! The loop the server thread runs, one pass per request:
//!
//! ```text
//!   begin_pass ── queue empty ──► idle, switch out ──► (woken by enqueue)
//!       │
//!       ▼
//!   request.execute()            ← outside the critical section
//!       │
//!       ▼
//!   finish_pass ── Continue ──► begin_pass
//!       │
//!       └── Sleep / Yield ──► switch out
//! ```
//!
//! A pass touches the server in two critical sections. The decision to
//! sleep or yield and the switch-out that carries it out happen in the
//! same critical section, so the host can never preempt a server that has
//! already decided to leave the processor.

use crate::port::Port;
use crate::request::AperiodicRequest;
use crate::server::{BodyStep, SporadicServer};

/// How the server thread reaches its server.
pub trait ServerAccess {
    /// Enter a critical section and run `f` on the server. `then` runs on
    /// the result after the server is released but before the critical
    /// section ends; the context-switch hook may run inside it.
    fn locked<R, F, T>(&mut self, f: F, then: T) -> R
    where
        F: FnOnce(&mut SporadicServer) -> R,
        T: FnOnce(&R);
}

/// An owned server is already exclusive.
impl ServerAccess for SporadicServer {
    fn locked<R, F, T>(&mut self, f: F, then: T) -> R
    where
        F: FnOnce(&mut SporadicServer) -> R,
        T: FnOnce(&R),
    {
        let result = f(self);
        then(&result);
        result
    }
}

/// Start a pass: the request at the head of the queue.
///
/// With an empty queue the server goes to sleep, is switched out, and
/// `None` is returned once it runs again.
pub fn begin_pass<A: ServerAccess, P: Port>(server: &mut A, port: &P) -> Option<AperiodicRequest> {
    server
        .locked(
            |server| server.next_request().ok_or_else(|| server.idle()),
            |next| {
                if next.is_err() {
                    port.switch_out();
                }
            },
        )
        .ok()
}

/// End a pass: advance the queue past the executed request and, if the
/// server sleeps or yields, switch it out.
pub fn finish_pass<A: ServerAccess, P: Port>(server: &mut A, port: &P) -> BodyStep {
    server.locked(
        |server| server.finish_request(port),
        |step| {
            if *step != BodyStep::Continue {
                port.switch_out();
            }
        },
    )
}

/// One full pass of the body.
pub fn serve_one<A: ServerAccess, P: Port>(server: &mut A, port: &P) {
    if let Some(request) = begin_pass(server, port) {
        request.execute();
        finish_pass(server, port);
    }
}
