//! Bookseal Crypto Worker
//!
//! Runs the session engine in an isolated context and bridges a
//! request/response API across the boundary.
//!
//! # Architecture
//!
//! The engine runs on its own OS thread and owns the [`Session`] outright;
//! the only way in or out is message passing, which is what keeps private
//! key material architecturally unreachable from the caller's context. The
//! caller holds a [`Worker`] handle that correlates requests with responses
//! by id, applies a per-call deadline, and surfaces unsolicited
//! session-expired notifications on a separate channel.
//!
//! # Components
//!
//! - [`Worker`]: caller-side handle (spawn, call, shutdown)
//! - [`WorkerConfig`]: session domain, lifetime, and RPC deadline
//! - [`protocol`]: typed wire messages crossing the boundary
//! - [`WorkerError`]: transport-level failure conditions
//!
//! One `Worker` per application session; construct it explicitly and hand it
//! to consumers rather than holding it in a global.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
pub mod protocol;
mod runtime;

pub use bookseal_engine::{
    AppointmentRecord, KeyDomain, Session, SessionConfig, SessionExpiredNotice,
};
pub use client::{DEFAULT_CALL_TIMEOUT, Worker, WorkerConfig};
pub use error::WorkerError;
