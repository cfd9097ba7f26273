//! # Sporadic Server
//!
//! A sporadic-server bandwidth reservation for fixed-priority preemptive
//! real-time kernels.
//!
//! ## Overview
//!
//! Aperiodic requests (event handlers, deferred work) are served by one
//! dedicated thread that runs at a fixed priority but may only consume
//! `capacity` ticks of processor time per `period`. Consumed time is given
//! back one period after the activation instant at which the server became
//! eligible to run, never earlier, so the server never uses more than its
//! reserved share of any window of length `period` and the periodic threads
//! below it keep their schedulability guarantees.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Host kernel / application                │
//! ├────────────────────────────────────────────────────────────┤
//! │                  Kernel API (kernel.rs)                    │
//! │   init() · create_aperiodic() · enqueue() · run() · hooks  │
//! ├──────────────────┬──────────────────┬──────────────────────┤
//! │  Server          │  Accountant      │  Sync Primitives     │
//! │  server.rs       │  accountant.rs   │  sync.rs             │
//! │  ─ state machine │  ─ enter/leave   │  ─ critical_section  │
//! │  ─ on_timer()    │  ─ eligibility   │                      │
//! ├──────────────────┴──────────────────┴──────────────────────┤
//! │  Server body (body.rs): one pass per request, switch-out   │
//! │  inside the deciding critical section                      │
//! ├────────────────────────────────────────────────────────────┤
//! │  Requests (request.rs) · Ledger (ledger.rs)                │
//! │  Timers (timer.rs) · Diagnostics (diag.rs)                 │
//! ├────────────────────────────────────────────────────────────┤
//! │  Host Port (port.rs) · Bounded Clock (time.rs)             │
//! ├────────────────────────────────────────────────────────────┤
//! │  Cortex-M4 tick (arch/cortex_m4.rs, bare-metal only)       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Host Integration
//!
//! The server does not own a scheduler. The host implements [`Port`] and:
//! - starts the server thread (created by [`kernel::init`]) on [`kernel::run`];
//! - calls [`kernel::on_context_switch`] on every context switch;
//! - calls [`kernel::on_timer`] when a timer armed through the port expires;
//! - switches away from the server when [`kernel::preemption_required`].
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **No `alloc`**: pure `core` only
//! - **Fixed pools**: `REPLENISHMENT_SLOTS` ledger slots,
//!   `REPLENISHMENT_TIMERS` timers, `MAX_REQUESTS` requests
//! - **Critical sections**: `critical_section::with()` for shared state

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod time;
pub mod port;
pub mod ledger;
pub mod timer;
pub mod request;
pub mod diag;
pub mod server;
mod accountant;
pub mod body;
pub mod sync;
pub mod kernel;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod arch;

#[cfg(test)]
mod sim;

pub use body::ServerAccess;
pub use config::ServerConfig;
pub use error::SporadicError;
pub use port::{Port, ThreadId, ThreadRef};
pub use request::{AperiodicRequest, RequestFn, RequestHandle};
pub use server::{BodyStep, ServerState, SporadicServer};
pub use time::{Priority, Ticks};
pub use timer::TimerId;
