//! Bookseal Session Engine
//!
//! State machine holding the decapsulation key for an authenticated
//! principal. Follows the same Sans-IO and action-based patterns as the rest
//! of the workspace: the machine performs no I/O and takes time as a
//! parameter, so the worker runtime drives it with real time and tests drive
//! it with virtual time.
//!
//! # Components
//!
//! - [`Session`]: the time-boxed crypto session state machine
//! - [`SessionConfig`]: domain and lifetime configuration
//! - [`AppointmentRecord`]: the decrypted appointment plaintext
//! - [`EngineError`]: named failure conditions surfaced to the caller

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod appointment;
mod error;
pub mod session;

pub use appointment::AppointmentRecord;
pub use bookseal_crypto::KeyDomain;
pub use error::EngineError;
pub use session::{
    AuthGrant, DEFAULT_SESSION_LIFETIME, Session, SessionConfig, SessionExpiredNotice,
    SessionStatus,
};
