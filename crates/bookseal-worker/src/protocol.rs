//! Wire protocol between the worker client and the session engine.
//!
//! Requests carry a correlation id; the engine answers with a correlated
//! response or, when the session deadline passes, an unsolicited
//! notification. Field and operation names match the JSON the original web
//! clients exchanged, so serialized messages stay readable next to the
//! server API's payloads.

use std::fmt;

use bookseal_engine::{AppointmentRecord, EngineError};
use serde::{Deserialize, Serialize};

/// Operation requested of the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "kebab-case")]
pub enum Operation {
    /// Derive the session key pair from an authentication secret.
    #[serde(rename_all = "camelCase")]
    Authenticate {
        /// Principal identity (staff ID or client email).
        identity: String,
        /// Raw authentication secret bytes (WebAuthn assertion or
        /// PIN-derived value).
        auth_secret: Vec<u8>,
    },

    /// Decapsulate a key share and decrypt one appointment envelope.
    #[serde(rename_all = "camelCase")]
    DecryptAppointment {
        /// Hex `IV || TAG || CIPHERTEXT` payload.
        encrypted_data: String,
        /// Hex key share addressed to the session holder.
        key_share: String,
    },

    /// Report session state. Always succeeds.
    GetStatus,

    /// Clear the session. Always succeeds, idempotent.
    Logout,
}

/// Request sent across the worker boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// Correlates the eventual response with the caller's pending entry.
    pub correlation_id: u64,
    /// Requested operation.
    #[serde(flatten)]
    pub op: Operation,
}

/// Successful `authenticate` data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    /// Always true on success (wire-compatibility field).
    pub authenticated: bool,
    /// Authenticated principal.
    pub identity: String,
    /// Absolute session deadline, unix milliseconds.
    pub expires_at: u64,
    /// Base64 encapsulation key for server-side registration.
    pub public_key: String,
}

/// Successful `decrypt-appointment` data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentData {
    /// Recovered appointment fields.
    #[serde(flatten)]
    pub record: AppointmentRecord,
    /// Unix milliseconds when decryption completed.
    pub decrypted_at: u64,
}

/// Successful `get-status` data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Whether a key is currently held.
    pub authenticated: bool,
    /// Holder identity while authenticated.
    pub identity: Option<String>,
    /// Absolute session deadline, unix milliseconds. Zero when unset.
    pub expires_at: u64,
    /// Milliseconds left before expiry. Zero when unset.
    pub time_remaining: u64,
}

/// Successful `logout` data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutData {
    /// Always true (wire-compatibility field).
    pub logged_out: bool,
}

/// Successful operation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OpOutput {
    /// Session created.
    Authenticated(AuthData),
    /// Envelope decrypted.
    Appointment(AppointmentData),
    /// Status snapshot.
    Status(StatusReport),
    /// Session cleared.
    LoggedOut(LogoutData),
}

/// Machine-readable failure category callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Missing or malformed required field.
    InvalidInput,
    /// Decrypt attempted with no held key.
    NotAuthenticated,
    /// Operation attempted past the session deadline.
    SessionExpired,
    /// Envelope framing or tag verification failure.
    DecryptionFailed,
    /// Key derivation or key generation failure.
    AuthenticationFailed,
    /// Plaintext was not a valid appointment record.
    MalformedRecord,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid-input",
            Self::NotAuthenticated => "not-authenticated",
            Self::SessionExpired => "session-expired",
            Self::DecryptionFailed => "decryption-failed",
            Self::AuthenticationFailed => "authentication-failed",
            Self::MalformedRecord => "malformed-record",
        };
        f.write_str(name)
    }
}

/// Failure payload of a correlated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable context.
    pub message: String,
}

impl From<&EngineError> for WireError {
    fn from(err: &EngineError) -> Self {
        let kind = match err {
            EngineError::InvalidInput { .. } => ErrorKind::InvalidInput,
            EngineError::NotAuthenticated => ErrorKind::NotAuthenticated,
            EngineError::SessionExpired { .. } => ErrorKind::SessionExpired,
            EngineError::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            EngineError::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            EngineError::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
        };
        Self { kind, message: err.to_string() }
    }
}

/// Event name of an unsolicited notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationEvent {
    /// The session deadline passed; the host should prompt for
    /// re-authentication.
    SessionExpired,
}

/// Message sent from the engine back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkerMessage {
    /// Correlated reply to a [`WorkerRequest`].
    #[serde(rename_all = "camelCase")]
    Response {
        /// Correlation id copied from the request.
        correlation_id: u64,
        /// Operation outcome.
        result: Result<OpOutput, WireError>,
    },

    /// Out-of-band notification; resolves no pending call.
    #[serde(rename_all = "camelCase")]
    Notification {
        /// What happened.
        event: NotificationEvent,
        /// Identity whose session the event concerns.
        identity: String,
    },
}
