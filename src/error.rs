//! # Errors
//!
//! Runtime conditions the server reports to its host. Programming errors
//! in the host integration (readying the server twice, running the body
//! before `init()`) are not represented here; they panic.

use thiserror::Error;

/// Error kinds returned by the sporadic server API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SporadicError {
    /// `init()` was called while a server instance already exists.
    #[error("sporadic server is already initialized")]
    AlreadyInitialized,

    /// The operation needs a server instance and none exists yet.
    #[error("sporadic server is not initialized")]
    NotInitialized,

    /// The server parameters cannot describe a working server.
    #[error("invalid sporadic server configuration: {0}")]
    InvalidConfig(&'static str),

    /// No free replenishment timer or ledger slot. The consumed time stays
    /// staged and is scheduled with the next replenishment.
    #[error("replenishment pool exhausted")]
    CapacityPoolExhausted,

    /// The aperiodic request arena has no free slot.
    #[error("aperiodic request pool is full")]
    RequestPoolFull,

    /// The request is already waiting in the queue.
    #[error("aperiodic request is already queued")]
    RequestAlreadyQueued,

    /// The handle does not name an allocated request.
    #[error("unknown aperiodic request handle")]
    UnknownRequest,
}
