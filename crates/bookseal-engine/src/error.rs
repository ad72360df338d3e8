//! Error types for session engine operations.
//!
//! Each variant is a distinct, named condition the caller can branch on:
//! `NotAuthenticated` ("never logged in") is deliberately separate from
//! `SessionExpired` ("logged in, lapsed") so the host application can choose
//! between a login prompt and a re-authentication prompt.

use thiserror::Error;

/// Errors surfaced by session engine operations.
///
/// None of these terminate the engine; a fresh `authenticate` is always
/// accepted after any failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Missing or malformed required field.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Which requirement was violated.
        reason: String,
    },

    /// Decrypt attempted with no held key.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Operation attempted past the session deadline.
    #[error("session expired for {identity}")]
    SessionExpired {
        /// Identity whose session lapsed.
        identity: String,
    },

    /// Envelope framing or authentication-tag failure. Fatal for the call,
    /// not for the session.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// What failed; never includes plaintext material.
        reason: String,
    },

    /// Decrypted plaintext is not a valid appointment record.
    #[error("malformed appointment record: {reason}")]
    MalformedRecord {
        /// Parser diagnostic.
        reason: String,
    },

    /// Key derivation or key generation failed during authentication.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// What failed.
        reason: String,
    },
}
