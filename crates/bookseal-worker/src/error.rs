//! Error types for the worker transport.
//!
//! Transport conditions (`Timeout`, `Unavailable`) are local to the caller
//! and say nothing about engine state: a timed-out operation may still
//! complete inside the worker. Engine failures arrive with their wire
//! category intact so callers can branch without string matching.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{ErrorKind, WireError};

/// Errors surfaced by worker calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// No correlated response arrived within the deadline. Local-only: the
    /// engine may still be processing the abandoned request.
    #[error("no response within {elapsed:?}")]
    Timeout {
        /// The deadline that elapsed.
        elapsed: Duration,
    },

    /// The isolated context failed to initialize, crashed, or was shut
    /// down. Fatal for all pending calls.
    #[error("worker unavailable: {reason}")]
    Unavailable {
        /// What made the worker unreachable.
        reason: String,
    },

    /// The engine answered with an unexpected output shape.
    #[error("protocol error: {reason}")]
    Protocol {
        /// What did not line up.
        reason: String,
    },

    /// The engine reported an operation failure.
    #[error("{kind}: {message}")]
    Engine {
        /// Failure category.
        kind: ErrorKind,
        /// Context from the engine.
        message: String,
    },
}

impl WorkerError {
    /// Engine failure category, when this is an engine-reported error.
    pub fn engine_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Engine { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<WireError> for WorkerError {
    fn from(err: WireError) -> Self {
        Self::Engine { kind: err.kind, message: err.message }
    }
}
