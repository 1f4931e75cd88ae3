// crates/escrow-core/src/runtime/deadline.rs
// ============================================================================
// Module: Quorum Escrow Call Deadlines
// Description: Runs blocking external calls under an optional deadline.
// Purpose: Bound oracle and ledger latency without holding vault locks.
// Dependencies: std
// ============================================================================

//! ## Overview
//! External calls run on a dedicated worker thread and the caller waits on a
//! channel with `recv_timeout`. On expiry the caller returns immediately; the
//! worker finishes in the background and its result is dropped unless the
//! closure itself records it.
//!
//! Abandoned workers are detached and cannot be cancelled; each lives until
//! its blocking call returns, bounded by the client's own transport timeout.
//! The settlement dispatcher admits at most one running release worker per
//! settlement key. Oracle workers have no per-call cap beyond the gate's
//! input limits and the HTTP client timeout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a deadline-bounded call produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeadlineError {
    /// The deadline expired before the call returned.
    Expired(Duration),
    /// The worker thread could not be spawned.
    Spawn(String),
    /// The worker terminated without sending a result.
    Abandoned,
}

impl DeadlineError {
    /// Renders a caller-facing description.
    pub(crate) fn describe(&self, operation: &str) -> String {
        match self {
            Self::Expired(timeout) => {
                format!("{operation} exceeded deadline of {} ms", timeout.as_millis())
            }
            Self::Spawn(err) => format!("failed to spawn {operation} worker: {err}"),
            Self::Abandoned => format!("{operation} worker terminated without a result"),
        }
    }
}

// ============================================================================
// SECTION: Deadline Call
// ============================================================================

/// Runs `call` and waits at most `timeout` for its result.
///
/// Without a timeout the call runs inline on the current thread.
pub(crate) fn call_with_deadline<T, F>(
    operation: &str,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, DeadlineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Some(timeout) = timeout else {
        return Ok(call());
    };
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name(format!("escrow-{operation}"))
        .spawn(move || {
            let _ = sender.send(call());
        })
        .map_err(|err| DeadlineError::Spawn(err.to_string()))?;
    match receiver.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => Err(DeadlineError::Expired(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(DeadlineError::Abandoned),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
