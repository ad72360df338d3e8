//! Bookseal Cryptographic Primitives
//!
//! Cryptographic building blocks for the Bookseal appointment pipeline.
//! Pure functions with deterministic outputs. Callers provide the RNG for
//! operations that need entropy, enabling deterministic testing.
//!
//! # Key Lifecycle
//!
//! This section describes the key flow from an authentication secret to a
//! decrypted appointment record. A principal's key pair is never stored
//! anywhere: it is re-derived on every authentication from the secret the
//! authenticator yields, which is what keeps the escrow zero-persistence.
//!
//! ```text
//! Authentication secret (WebAuthn assertion / PIN-derived bytes)
//!        │
//!        ▼
//! HKDF-SHA256 → 64-byte keygen seed (per domain, per identity)
//!        │
//!        ▼
//! ML-KEM-1024 keygen → (encapsulation key, decapsulation key)
//!        │
//!        ▼
//! encapsulate / decapsulate → 32-byte envelope key
//!        │
//!        ▼
//! AES-256-GCM → appointment payload
//! ```
//!
//! # Security
//!
//! Zero Persistence:
//! - Key pairs are derived deterministically from `(domain, identity,
//!   authentication secret)`; only the public half ever leaves the process
//! - Seeds and shared secrets are zeroized on drop
//!
//! Domain Separation:
//! - Staff and client workers derive from disjoint HKDF info labels
//! - The identity is bound into the info parameter, so equal input key
//!   material cannot collide across principals
//!
//! Authenticity:
//! - AES-256-GCM provides tamper-proof encryption of appointment payloads
//! - ML-KEM implicit rejection yields an unrelated secret for a mismatched
//!   key share; the AEAD tag check is the single tamper detector
//! - Failed authentication tag -> reject envelope, no plaintext escapes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod envelope;
mod error;
pub mod kdf;
pub mod kem;

pub use envelope::{Envelope, IV_LEN, TAG_LEN, open, seal, seal_for_recipients};
pub use error::CryptoError;
pub use kdf::{KeyDomain, KeygenSeed, SEED_LEN, derive_keygen_seed};
pub use kem::{
    KEY_SHARE_LEN, KeyPair, KeyShare, PUBLIC_KEY_LEN, PrivateKey, PublicKey, SHARED_SECRET_LEN,
    SharedSecret, decapsulate, encapsulate, keygen,
};
