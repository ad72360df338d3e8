//! ML-KEM-1024 key encapsulation
//!
//! Deterministic key generation from derived seed material, encapsulation for
//! envelope sealing, and decapsulation inside the worker.
//!
//! ML-KEM defines implicit rejection: decapsulating a mismatched ciphertext
//! yields a deterministic but unrelated secret instead of an error. Tamper
//! detection therefore belongs to the AEAD tag check downstream; this module
//! deliberately performs no "does the secret look valid" probing, which would
//! reintroduce a timing oracle.

use fips203::{
    ml_kem_1024,
    traits::{Decaps as _, Encaps as _, KeyGen as _, SerDes as _},
};
use rand_core::CryptoRngCore;
use zeroize::Zeroize;

use crate::{codec, error::CryptoError, kdf::KeygenSeed};

/// Serialized encapsulation-key length in bytes.
pub const PUBLIC_KEY_LEN: usize = ml_kem_1024::EK_LEN;

/// Key share (KEM ciphertext) length in bytes.
pub const KEY_SHARE_LEN: usize = ml_kem_1024::CT_LEN;

/// Shared-secret length in bytes; used directly as the envelope AEAD key.
pub const SHARED_SECRET_LEN: usize = 32;

/// Public encapsulation key. Safe to hand to the server for storage and
/// distribution to envelope senders.
#[derive(Clone)]
pub struct PublicKey(ml_kem_1024::EncapsKey);

impl PublicKey {
    /// Serialized key bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone().into_bytes().to_vec()
    }

    /// Base64 form stored by the server.
    pub fn to_base64(&self) -> String {
        codec::encode_base64(&self.0.clone().into_bytes())
    }

    /// Parse from serialized key bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidPublicKey`: wrong length
    /// - `Kem`: bytes rejected by key validation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey { expected: PUBLIC_KEY_LEN, actual: bytes.len() }
        })?;
        let key = ml_kem_1024::EncapsKey::try_from_bytes(array)
            .map_err(|reason| CryptoError::Kem { reason })?;
        Ok(Self(key))
    }

    /// Parse from the server's base64 form.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&codec::decode_base64(text)?)
    }
}

/// Private decapsulation key. Never serialized, never logged; owned by the
/// session that derived it.
pub struct PrivateKey(ml_kem_1024::DecapsKey);

/// KEM ciphertext addressed to one recipient.
#[derive(Clone)]
pub struct KeyShare(ml_kem_1024::CipherText);

impl KeyShare {
    /// Hex form used in the envelope wire format.
    pub fn to_hex(&self) -> String {
        codec::encode_hex(&self.0.clone().into_bytes())
    }

    /// Parse from the envelope's hex field.
    ///
    /// # Errors
    ///
    /// - `InvalidHex`: field is not valid hex
    /// - `MalformedKeyShare`: wrong decoded length
    /// - `Kem`: bytes rejected by the KEM
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = codec::decode_hex(text)?;
        let array: [u8; KEY_SHARE_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedKeyShare { expected: KEY_SHARE_LEN, actual: bytes.len() }
        })?;
        let ciphertext = ml_kem_1024::CipherText::try_from_bytes(array)
            .map_err(|reason| CryptoError::Kem { reason })?;
        Ok(Self(ciphertext))
    }
}

/// 32-byte symmetric secret shared through a key share.
///
/// Used directly as the envelope AEAD key and zeroized on drop.
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    /// Raw secret bytes for the AEAD layer.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Deterministically generated key pair for one principal.
pub struct KeyPair {
    /// Encapsulation key, safe to distribute.
    pub public: PublicKey,
    /// Decapsulation key, confined to the session.
    pub private: PrivateKey,
}

/// Generate a key pair from seed material. Same seed always yields the same
/// pair.
pub fn keygen(seed: &KeygenSeed) -> KeyPair {
    let (ek, dk) = ml_kem_1024::KG::keygen_from_seed(seed.d(), seed.z());
    KeyPair { public: PublicKey(ek), private: PrivateKey(dk) }
}

/// Encapsulate a fresh shared secret to a recipient's public key.
///
/// Each call produces a new ciphertext and secret; the secret becomes the
/// AEAD key for exactly one envelope.
///
/// # Errors
///
/// - `Kem`: the underlying encapsulation rejected its input
pub fn encapsulate(
    recipient: &PublicKey,
    rng: &mut impl CryptoRngCore,
) -> Result<(KeyShare, SharedSecret), CryptoError> {
    let (secret, ciphertext) = recipient
        .0
        .try_encaps_with_rng(rng)
        .map_err(|reason| CryptoError::Kem { reason })?;
    Ok((KeyShare(ciphertext), SharedSecret(secret.into_bytes())))
}

/// Recover the shared secret carried by a key share.
///
/// A mismatched key/share pair yields an unrelated secret rather than an
/// error (implicit rejection); callers must rely on the envelope tag check
/// to detect that case.
///
/// # Errors
///
/// - `Kem`: the underlying decapsulation rejected its input
pub fn decapsulate(
    private_key: &PrivateKey,
    share: &KeyShare,
) -> Result<SharedSecret, CryptoError> {
    let secret = private_key
        .0
        .try_decaps(&share.0)
        .map_err(|reason| CryptoError::Kem { reason })?;
    Ok(SharedSecret(secret.into_bytes()))
}
