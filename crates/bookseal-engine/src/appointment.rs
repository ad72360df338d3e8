//! Decrypted appointment record.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Plaintext appointment fields recovered from an envelope.
///
/// Field names follow the JSON the booking application writes before
/// sealing, so records produced by either the web clients or this workspace
/// parse identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    /// Appointment title shown in calendars.
    pub title: String,

    /// Free-form appointment notes.
    #[serde(default)]
    pub description: String,

    /// Contact address of the counterpart (client email for staff views,
    /// practice mailbox for client views).
    #[serde(default)]
    pub recipient_contact: String,
}

/// Parse the UTF-8 JSON plaintext of an opened envelope.
///
/// # Errors
///
/// - `MalformedRecord`: plaintext is not valid UTF-8 JSON or is missing
///   required fields
pub fn parse_record(plaintext: &[u8]) -> Result<AppointmentRecord, EngineError> {
    serde_json::from_slice(plaintext)
        .map_err(|e| EngineError::MalformedRecord { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let plaintext = br#"{
            "title": "Checkup",
            "description": "Annual physical",
            "recipientContact": "client@example.com"
        }"#;

        let record = parse_record(plaintext).unwrap();
        assert_eq!(record.title, "Checkup");
        assert_eq!(record.description, "Annual physical");
        assert_eq!(record.recipient_contact, "client@example.com");
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let record = parse_record(br#"{"title":"Checkup"}"#).unwrap();
        assert_eq!(record.title, "Checkup");
        assert_eq!(record.description, "");
        assert_eq!(record.recipient_contact, "");
    }

    #[test]
    fn missing_title_is_malformed() {
        let result = parse_record(br#"{"description":"no title"}"#);
        assert!(matches!(result, Err(EngineError::MalformedRecord { .. })));
    }

    #[test]
    fn non_json_plaintext_is_malformed() {
        let result = parse_record(b"\xFF\xFEnot json");
        assert!(matches!(result, Err(EngineError::MalformedRecord { .. })));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let record = AppointmentRecord {
            title: "Consult".to_string(),
            description: String::new(),
            recipient_contact: "a@example.com".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"recipientContact\""));
    }
}
