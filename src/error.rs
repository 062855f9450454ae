//! Error and warning types
//!
//! Faults in the timer's own accounting are [`TimerError`]s returned to the
//! caller. Operations that are merely not valid right now produce a
//! [`TimerWarning`] value instead, and observer failures are reported as
//! [`CallbackFault`]s without ever leaving the sampling loop.

use std::fmt;

use thiserror::Error;

use crate::state::TimerStatus;

/// Hard failures surfaced to the immediate caller
#[derive(Error, Debug)]
pub enum TimerError {
    /// Duration was zero, negative, NaN or infinite
    #[error("invalid duration: {value} minutes (expected a positive, finite number)")]
    InvalidDuration { value: f64 },

    /// Internal state is inconsistent; indicates a caller bug
    #[error("timer invariant violated: {0}")]
    InvariantViolation(String),

    /// A persisted snapshot could not be decoded
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The countdown loop task has shut down
    #[error("countdown loop is no longer running")]
    LoopClosed,
}

/// Key-value store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Operation attempted against the timer, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Pause,
    Resume,
    Stop,
    AddTime,
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::Stop => "stop",
            Operation::AddTime => "add_time",
            Operation::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Non-fatal conditions: logged, operation ignored
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimerWarning {
    #[error("cannot {operation} while {status}")]
    InvalidTransition {
        operation: Operation,
        status: TimerStatus,
    },

    #[error("ignoring malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },
}

/// Which observer callback failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Tick,
    Warning,
    Expired,
    Stopped,
}

/// An observer callback returned an error or panicked
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?} callback of observer #{subscription} failed: {message}")]
pub struct CallbackFault {
    pub kind: CallbackKind,
    pub subscription: u64,
    pub message: String,
}

/// Result type alias for TimerError
pub type Result<T, E = TimerError> = std::result::Result<T, E>;
