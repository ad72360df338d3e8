//! Appointment envelope sealing and opening using AES-256-GCM
//!
//! Wire format: `encapsulated_key` is the hex ML-KEM ciphertext for one
//! recipient; `payload` is hex `IV(16) || TAG(16) || CIPHERTEXT`. The fixed
//! offsets are a wire contract shared with the server API and the original
//! web clients and must be preserved exactly.
//!
//! The 16-byte IV matches the original application's WebCrypto parameters;
//! the GCM construction handles non-96-bit nonces per the specification.

use aes_gcm::{
    AesGcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit, consts::U16},
    aes::Aes256,
};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    error::CryptoError,
    kem::{self, PrivateKey, PublicKey, SharedSecret},
};

/// AES-256-GCM with the 16-byte IV the envelope wire format carries.
type EnvelopeCipher = AesGcm<Aes256, U16>;

/// IV length in the envelope payload framing.
pub const IV_LEN: usize = 16;

/// Authentication-tag length in the envelope payload framing.
pub const TAG_LEN: usize = 16;

/// One encrypted appointment record addressed to one recipient.
///
/// Multi-party access to an appointment is per-recipient: staff and client
/// each hold an envelope of the same content, sealed under the secret
/// encapsulated to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Hex ML-KEM ciphertext encapsulating this recipient's envelope key.
    pub encapsulated_key: String,
    /// Hex `IV || TAG || CIPHERTEXT` protected by the encapsulated key.
    pub payload: String,
}

/// Seal a plaintext for one recipient.
///
/// Encapsulates a fresh secret to the recipient, encrypts under it with a
/// random 16-byte IV, and frames the result for the wire.
///
/// # Errors
///
/// - `Kem`: encapsulation rejected the public key
pub fn seal(
    plaintext: &[u8],
    recipient: &PublicKey,
    rng: &mut impl CryptoRngCore,
) -> Result<Envelope, CryptoError> {
    let (share, secret) = kem::encapsulate(recipient, rng)?;

    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let cipher = EnvelopeCipher::new(secret.as_bytes().into());
    let mut buffer = plaintext.to_vec();
    let Ok(tag) = cipher.encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
    else {
        unreachable!("AES-256-GCM encryption cannot fail with valid inputs");
    };

    let mut payload = Vec::with_capacity(IV_LEN + TAG_LEN + buffer.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&tag);
    payload.extend_from_slice(&buffer);

    Ok(Envelope {
        encapsulated_key: share.to_hex(),
        payload: codec::encode_hex(&payload),
    })
}

/// Seal the same content for several recipients.
///
/// Returns one envelope per recipient, in input order. Each envelope carries
/// its own encapsulation and its own IV; only the plaintext is shared.
///
/// # Errors
///
/// - `Kem`: encapsulation rejected one of the public keys
pub fn seal_for_recipients(
    plaintext: &[u8],
    recipients: &[PublicKey],
    rng: &mut impl CryptoRngCore,
) -> Result<Vec<Envelope>, CryptoError> {
    recipients
        .iter()
        .map(|recipient| seal(plaintext, recipient, rng))
        .collect()
}

/// Open an envelope with the recipient's private key.
///
/// The authentication tag is verified before any plaintext is returned. A
/// wrong private key decapsulates to an unrelated secret (implicit
/// rejection) and surfaces here as `DecryptionFailed`, indistinguishable
/// from a tampered payload.
///
/// # Errors
///
/// - `InvalidHex` / `MalformedKeyShare`: wire fields failed to parse
/// - `MalformedEnvelope`: payload shorter than the IV + tag framing
/// - `DecryptionFailed`: authentication tag did not verify
pub fn open(envelope: &Envelope, private_key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
    let share = kem::KeyShare::from_hex(&envelope.encapsulated_key)?;
    let payload = codec::decode_hex(&envelope.payload)?;
    let secret = kem::decapsulate(private_key, &share)?;
    open_payload(&payload, &secret)
}

/// Split a raw payload at the fixed offsets and decrypt it with an
/// already-recovered secret.
///
/// # Errors
///
/// - `MalformedEnvelope`: payload shorter than the IV + tag framing
/// - `DecryptionFailed`: authentication tag did not verify
pub fn open_payload(payload: &[u8], secret: &SharedSecret) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::MalformedEnvelope { len: payload.len() });
    }

    // Fixed framing: IV at 0..16, tag at 16..32, ciphertext after.
    let iv = &payload[..IV_LEN];
    let tag = &payload[IV_LEN..IV_LEN + TAG_LEN];
    let mut buffer = payload[IV_LEN + TAG_LEN..].to_vec();

    let cipher = EnvelopeCipher::new(secret.as_bytes().into());
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer, Tag::from_slice(tag))
        .map_err(|_| CryptoError::DecryptionFailed {
            reason: "authentication failed".to_string(),
        })?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::{
        kdf::{KeyDomain, derive_keygen_seed},
        kem::{KeyPair, keygen},
    };

    fn test_rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn test_pair(identity: &str) -> KeyPair {
        keygen(&derive_keygen_seed(KeyDomain::Staff, identity, b"assertion"))
    }

    #[test]
    fn seal_open_round_trip() {
        let pair = test_pair("staff-1");
        let plaintext = br#"{"title":"Checkup"}"#;

        let envelope = seal(plaintext, &pair.public, &mut test_rng()).unwrap();
        let opened = open(&envelope, &pair.private).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn seal_open_empty_plaintext() {
        let pair = test_pair("staff-1");
        let envelope = seal(b"", &pair.public, &mut test_rng()).unwrap();
        assert_eq!(open(&envelope, &pair.private).unwrap(), b"");
    }

    #[test]
    fn payload_framing_has_fixed_offsets() {
        let pair = test_pair("staff-1");
        let plaintext = b"framing check";

        let envelope = seal(plaintext, &pair.public, &mut test_rng()).unwrap();
        let payload = codec::decode_hex(&envelope.payload).unwrap();

        assert_eq!(payload.len(), IV_LEN + TAG_LEN + plaintext.len());
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let pair = test_pair("staff-1");
        let mut envelope = seal(b"original", &pair.public, &mut test_rng()).unwrap();

        let mut payload = codec::decode_hex(&envelope.payload).unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;
        envelope.payload = codec::encode_hex(&payload);

        let result = open(&envelope, &pair.private);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn tampered_tag_fails_decryption() {
        let pair = test_pair("staff-1");
        let mut envelope = seal(b"original", &pair.public, &mut test_rng()).unwrap();

        let mut payload = codec::decode_hex(&envelope.payload).unwrap();
        payload[IV_LEN] ^= 0x01;
        envelope.payload = codec::encode_hex(&payload);

        let result = open(&envelope, &pair.private);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn tampered_iv_fails_decryption() {
        let pair = test_pair("staff-1");
        let mut envelope = seal(b"original", &pair.public, &mut test_rng()).unwrap();

        let mut payload = codec::decode_hex(&envelope.payload).unwrap();
        payload[0] ^= 0x01;
        envelope.payload = codec::encode_hex(&payload);

        let result = open(&envelope, &pair.private);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn tampered_key_share_fails_decryption() {
        // Implicit rejection path: the share still decapsulates, to a secret
        // that cannot verify the tag.
        let pair = test_pair("staff-1");
        let mut envelope = seal(b"original", &pair.public, &mut test_rng()).unwrap();

        let mut share = codec::decode_hex(&envelope.encapsulated_key).unwrap();
        share[0] ^= 0x01;
        envelope.encapsulated_key = codec::encode_hex(&share);

        let result = open(&envelope, &pair.private);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn wrong_recipient_key_fails_decryption() {
        let alice = test_pair("alice");
        let bob = test_pair("bob");

        let envelope = seal(b"for alice only", &alice.public, &mut test_rng()).unwrap();
        let result = open(&envelope, &bob.private);

        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let pair = test_pair("staff-1");
        let mut envelope = seal(b"content", &pair.public, &mut test_rng()).unwrap();

        // Shorter than IV + tag
        envelope.payload = codec::encode_hex(&[0u8; IV_LEN + TAG_LEN - 1]);

        let result = open(&envelope, &pair.private);
        assert!(matches!(
            result,
            Err(CryptoError::MalformedEnvelope { len }) if len == IV_LEN + TAG_LEN - 1
        ));
    }

    #[test]
    fn garbage_hex_payload_is_rejected() {
        let pair = test_pair("staff-1");
        let mut envelope = seal(b"content", &pair.public, &mut test_rng()).unwrap();
        envelope.payload = "zz".to_string();

        let result = open(&envelope, &pair.private);
        assert!(matches!(result, Err(CryptoError::InvalidHex { .. })));
    }

    #[test]
    fn seal_for_recipients_gives_each_their_own_envelope() {
        let staff = test_pair("staff-1");
        let client = keygen(&derive_keygen_seed(KeyDomain::Client, "a@example.com", b"pin"));
        let plaintext = br#"{"title":"Consult","description":"Initial visit"}"#;

        let envelopes = seal_for_recipients(
            plaintext,
            &[staff.public.clone(), client.public.clone()],
            &mut test_rng(),
        )
        .unwrap();

        assert_eq!(envelopes.len(), 2);
        assert_ne!(envelopes[0].encapsulated_key, envelopes[1].encapsulated_key);
        assert_ne!(envelopes[0].payload, envelopes[1].payload);

        assert_eq!(open(&envelopes[0], &staff.private).unwrap(), plaintext);
        assert_eq!(open(&envelopes[1], &client.private).unwrap(), plaintext);

        // Crossed envelopes do not open.
        assert!(open(&envelopes[1], &staff.private).is_err());
        assert!(open(&envelopes[0], &client.private).is_err());
    }

    #[test]
    fn envelope_serde_uses_wire_field_names() {
        let envelope = Envelope {
            encapsulated_key: "aa".to_string(),
            payload: "bb".to_string(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"encapsulatedKey\""));
        assert!(json.contains("\"payload\""));
    }
}
