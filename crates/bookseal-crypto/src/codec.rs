//! Hex and base64 wire codecs.
//!
//! Envelope fields travel as hex strings; public keys travel as base64.
//! Decoding is strict: malformed input is a typed error, never a silent
//! truncation.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::CryptoError;

/// Encode bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string.
///
/// # Errors
///
/// - `InvalidHex`: odd length or non-hex characters
pub fn decode_hex(text: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(text).map_err(|e| CryptoError::InvalidHex { reason: e.to_string() })
}

/// Encode bytes as standard-alphabet base64 with padding.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard-alphabet base64 string.
///
/// # Errors
///
/// - `InvalidBase64`: characters outside the alphabet or bad padding
pub fn decode_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(text).map_err(|e| CryptoError::InvalidBase64 { reason: e.to_string() })
}
