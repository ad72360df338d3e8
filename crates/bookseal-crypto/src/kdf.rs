//! Keygen-seed derivation using HKDF
//!
//! Turns an authentication secret into deterministic, domain-separated seed
//! material for KEM key generation. The secret itself is never persisted;
//! re-deriving the seed on every authentication is what lets the scheme avoid
//! storing private keys anywhere.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// HKDF salt fixed for the appointment escrow scheme.
const ESCROW_SALT: &[u8] = b"bookseal/appointment-escrow/salt/v1";

/// Seed length required by ML-KEM-1024 key generation (d || z).
pub const SEED_LEN: usize = 64;

/// Key-space selector for the two worker variants.
///
/// The staff dashboard worker and the public booking-flow worker derive
/// disjoint key spaces: equal `(identity, secret)` pairs still yield
/// unrelated key pairs across domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDomain {
    /// Staff dashboard worker (WebAuthn-bound secret).
    Staff,
    /// Public booking-flow worker (PIN-derived secret).
    Client,
}

impl KeyDomain {
    /// Domain-separation label mixed into the HKDF info parameter.
    pub fn label(self) -> &'static [u8] {
        match self {
            Self::Staff => b"bookseal/staff-keygen/v1",
            Self::Client => b"bookseal/client-keygen/v1",
        }
    }
}

/// 64 bytes of seed material for deterministic KEM key generation.
///
/// Zeroized on drop.
pub struct KeygenSeed {
    d: [u8; 32],
    z: [u8; 32],
}

impl KeygenSeed {
    /// Build a seed from pre-derived material.
    ///
    /// Material shorter than [`SEED_LEN`] is cyclically repeated to fill the
    /// seed; material longer than [`SEED_LEN`] is truncated. Cyclic repetition
    /// is a compatibility behavior for callers that feed externally derived
    /// material. It reduces effective entropy, so the padded path is logged
    /// loudly rather than accepted in silence.
    ///
    /// # Errors
    ///
    /// - `SeedMaterialEmpty`: no material to derive from
    pub fn from_material(material: &[u8]) -> Result<Self, CryptoError> {
        if material.is_empty() {
            return Err(CryptoError::SeedMaterialEmpty);
        }

        let mut bytes = [0u8; SEED_LEN];
        if material.len() < SEED_LEN {
            tracing::warn!(
                available = material.len(),
                required = SEED_LEN,
                "seed material shorter than required; padding by cyclic repetition"
            );
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = material[i % material.len()];
            }
        } else {
            bytes.copy_from_slice(&material[..SEED_LEN]);
        }

        let mut d = [0u8; 32];
        let mut z = [0u8; 32];
        d.copy_from_slice(&bytes[..32]);
        z.copy_from_slice(&bytes[32..]);
        bytes.zeroize();

        Ok(Self { d, z })
    }

    /// The `d` half consumed by ML-KEM key generation.
    pub(crate) fn d(&self) -> [u8; 32] {
        self.d
    }

    /// The `z` half consumed by ML-KEM key generation.
    pub(crate) fn z(&self) -> [u8; 32] {
        self.z
    }
}

impl Drop for KeygenSeed {
    fn drop(&mut self) {
        self.d.zeroize();
        self.z.zeroize();
    }
}

/// Derive the keygen seed for a principal from their authentication secret.
///
/// Input key material is `identity || auth_secret`; the info parameter binds
/// the domain label and the identity, so the same key material reused
/// elsewhere cannot land on this key space.
///
/// # Security
///
/// - Deterministic: same `(domain, identity, auth_secret)` always produces
///   the same seed, which is what lets a principal re-derive their private
///   key on every authentication instead of storing it
/// - Different domains produce different seeds (worker-variant isolation)
/// - Different identities produce different seeds even for equal secrets
pub fn derive_keygen_seed(domain: KeyDomain, identity: &str, auth_secret: &[u8]) -> KeygenSeed {
    let mut ikm = Vec::with_capacity(identity.len() + auth_secret.len());
    ikm.extend_from_slice(identity.as_bytes());
    ikm.extend_from_slice(auth_secret);

    let hkdf = Hkdf::<Sha256>::new(Some(ESCROW_SALT), &ikm);
    ikm.zeroize();

    // Info: label || 0x00 || identity
    let label = domain.label();
    let mut info = Vec::with_capacity(label.len() + 1 + identity.len());
    info.extend_from_slice(label);
    info.push(0x00);
    info.extend_from_slice(identity.as_bytes());

    let mut okm = [0u8; SEED_LEN];
    let Ok(()) = hkdf.expand(&info, &mut okm) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    // Exactly SEED_LEN bytes: the padding path cannot trigger here.
    let Ok(seed) = KeygenSeed::from_material(&okm) else {
        unreachable!("HKDF output is never empty");
    };
    okm.zeroize();

    seed
}
