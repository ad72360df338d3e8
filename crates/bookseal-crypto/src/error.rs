//! Error types for the cryptographic layer.
//!
//! Strongly-typed errors so callers can distinguish malformed wire input
//! (retry with corrected data) from authentication failures (tamper or wrong
//! recipient, never retryable).

use thiserror::Error;

/// Errors produced by codec, derivation, KEM, and envelope operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Hex field failed to decode (odd length or non-hex characters).
    #[error("invalid hex: {reason}")]
    InvalidHex {
        /// Decoder diagnostic.
        reason: String,
    },

    /// Base64 field failed to decode (bad alphabet or padding).
    #[error("invalid base64: {reason}")]
    InvalidBase64 {
        /// Decoder diagnostic.
        reason: String,
    },

    /// Seed material was empty; nothing to derive from.
    #[error("seed material is empty")]
    SeedMaterialEmpty,

    /// Serialized public key has the wrong length.
    #[error("invalid public key: expected {expected} bytes, got {actual}")]
    InvalidPublicKey {
        /// Required encapsulation-key length.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Key share (KEM ciphertext) has the wrong length.
    #[error("malformed key share: expected {expected} bytes, got {actual}")]
    MalformedKeyShare {
        /// Required ciphertext length.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Envelope payload is shorter than the fixed IV + tag framing.
    #[error("malformed envelope: payload of {len} bytes is shorter than IV and tag")]
    MalformedEnvelope {
        /// Decoded payload length.
        len: usize,
    },

    /// Underlying KEM operation rejected its input.
    #[error("kem failure: {reason}")]
    Kem {
        /// Diagnostic from the KEM implementation.
        reason: &'static str,
    },

    /// Authentication tag did not verify; no plaintext was produced.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// What failed; never includes plaintext material.
        reason: String,
    },
}
