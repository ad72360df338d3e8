//! Crypto session state machine.
//!
//! Holds the decapsulation key for one authenticated principal, time-boxed
//! with renewal on use. This is a pure state machine: no I/O, no timers of
//! its own. Time is passed as a parameter to the methods that need it, and
//! the worker runtime owns the one autonomous deadline.
//!
//! Generic over `Instant` to support both real time and virtual time for
//! deterministic testing.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────────────┐ authenticate  ┌───────────────┐
//! │ Unauthenticated │──────────────>│ Authenticated │<──┐
//! └─────────────────┘               └───┬───────┬───┘   │ decrypt
//!          ▲                 deadline   │       │ ──────┘ (renews)
//!          │ authenticate               │       │ logout
//!          │                            ▼       ▼
//!          │                      ┌─────────┐ ┌───────────┐
//!          └──────────────────────│ Expired │ │ LoggedOut │
//!                                 └─────────┘ └───────────┘
//! ```
//!
//! `Expired` and `LoggedOut` hold no key material; they differ from
//! `Unauthenticated` only in what a decrypt attempt reports
//! (`SessionExpired` versus `NotAuthenticated`).

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use bookseal_crypto::{
    CryptoError, envelope,
    envelope::Envelope,
    kdf,
    kem::{self, KeyPair},
};

use crate::{
    appointment::{AppointmentRecord, parse_record},
    error::EngineError,
};

/// Lifetime granted on authentication and renewed on each successful decrypt.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(600);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Key-space domain of this worker variant.
    pub domain: kdf::KeyDomain,
    /// Lifetime granted on authentication and renewed on use.
    pub lifetime: Duration,
}

impl SessionConfig {
    /// Configuration for the staff dashboard worker.
    pub fn staff() -> Self {
        Self { domain: kdf::KeyDomain::Staff, lifetime: DEFAULT_SESSION_LIFETIME }
    }

    /// Configuration for the public booking-flow worker.
    pub fn client() -> Self {
        Self { domain: kdf::KeyDomain::Client, lifetime: DEFAULT_SESSION_LIFETIME }
    }
}

/// Grant returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    /// Authenticated principal.
    pub identity: String,
    /// Base64 encapsulation key, for server-side registration and for
    /// sealing envelopes addressed to this principal.
    pub public_key: String,
    /// Granted lifetime; the worker reports the absolute deadline upstream.
    pub lifetime: Duration,
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Whether a key is currently held.
    pub authenticated: bool,
    /// Holder identity while authenticated.
    pub identity: Option<String>,
    /// Time left before expiry; zero when no session is active.
    pub time_remaining: Duration,
}

/// Out-of-band notice produced when the deadline passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExpiredNotice {
    /// Identity whose session lapsed.
    pub identity: String,
}

/// Live key material for an authenticated principal.
struct Active<I> {
    identity: String,
    keys: KeyPair,
    renewed_at: I,
}

enum State<I> {
    Unauthenticated,
    Authenticated(Active<I>),
    Expired { identity: String },
    LoggedOut,
}

/// Crypto session state machine. Exactly one per worker.
///
/// The decapsulation key lives inside the `Authenticated` state, so "a key
/// is held iff the session is authenticated" holds by construction, and
/// replacing the state is what discards key material.
pub struct Session<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: State<I>,
    config: SessionConfig,
}

impl<I> Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create an unauthenticated session.
    pub fn new(config: SessionConfig) -> Self {
        Self { state: State::Unauthenticated, config }
    }

    /// Whether a key is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, State::Authenticated(_))
    }

    /// Lifetime granted on authentication and on renewal.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.config.lifetime
    }

    /// Derive the key pair for `identity` and start a fresh session.
    ///
    /// Any prior session is discarded first, so a failed attempt can never
    /// leave stale or half-initialized key material behind.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidInput` if identity or secret is empty
    pub fn authenticate(
        &mut self,
        identity: &str,
        auth_secret: &[u8],
        now: I,
    ) -> Result<AuthGrant, EngineError> {
        self.state = State::Unauthenticated;

        if identity.trim().is_empty() {
            return Err(EngineError::InvalidInput {
                reason: "identity must not be empty".to_string(),
            });
        }
        if auth_secret.is_empty() {
            return Err(EngineError::InvalidInput {
                reason: "authentication secret must not be empty".to_string(),
            });
        }

        let seed = kdf::derive_keygen_seed(self.config.domain, identity, auth_secret);
        let keys = kem::keygen(&seed);
        let public_key = keys.public.to_base64();

        tracing::info!(
            identity,
            lifetime_ms = self.config.lifetime.as_millis() as u64,
            "session authenticated"
        );

        self.state = State::Authenticated(Active {
            identity: identity.to_string(),
            keys,
            renewed_at: now,
        });

        Ok(AuthGrant {
            identity: identity.to_string(),
            public_key,
            lifetime: self.config.lifetime,
        })
    }

    /// Decapsulate a key share and open one appointment envelope.
    ///
    /// Success renews the deadline: active usage keeps a session alive,
    /// idleness lets it lapse. A lapsed session is cleared as a side effect
    /// and reported as `SessionExpired`, never as the decrypt error it would
    /// otherwise have produced.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidInput` if either field is empty
    /// - `EngineError::NotAuthenticated` / `EngineError::SessionExpired`
    /// - `EngineError::DecryptionFailed` on framing or tag failure
    /// - `EngineError::MalformedRecord` if the plaintext is not a record
    pub fn decrypt_appointment(
        &mut self,
        encrypted_data: &str,
        key_share: &str,
        now: I,
    ) -> Result<AppointmentRecord, EngineError> {
        if encrypted_data.is_empty() || key_share.is_empty() {
            return Err(EngineError::InvalidInput {
                reason: "encrypted data and key share are required".to_string(),
            });
        }

        // Lapse check before touching the key; the notice, if any, is the
        // runtime's to emit via expire_if_due.
        if let Some(notice) = self.expire_if_due(now) {
            return Err(EngineError::SessionExpired { identity: notice.identity });
        }

        let active = match &mut self.state {
            State::Authenticated(active) => active,
            State::Expired { identity } => {
                return Err(EngineError::SessionExpired { identity: identity.clone() });
            },
            State::Unauthenticated | State::LoggedOut => {
                return Err(EngineError::NotAuthenticated);
            },
        };

        let wire = Envelope {
            encapsulated_key: key_share.to_string(),
            payload: encrypted_data.to_string(),
        };
        let plaintext = envelope::open(&wire, &active.keys.private).map_err(map_open_error)?;
        let record = parse_record(&plaintext)?;

        active.renewed_at = now;
        Ok(record)
    }

    /// Clear the session if the deadline has passed.
    ///
    /// Returns the expiry notice the first time the lapse is observed; later
    /// calls return `None` until a new session is created. The worker runtime
    /// calls this ahead of every request and on its deadline timer, which is
    /// what makes the out-of-band notification fire exactly once.
    pub fn expire_if_due(&mut self, now: I) -> Option<SessionExpiredNotice> {
        let State::Authenticated(active) = &self.state else {
            return None;
        };
        if now - active.renewed_at < self.config.lifetime {
            return None;
        }

        let identity = active.identity.clone();
        tracing::info!(identity, "session expired");
        self.state = State::Expired { identity: identity.clone() };

        Some(SessionExpiredNotice { identity })
    }

    /// Time left before the deadline. `None` when no session is active.
    #[must_use]
    pub fn time_remaining(&self, now: I) -> Option<Duration> {
        let State::Authenticated(active) = &self.state else {
            return None;
        };
        Some(self.config.lifetime.saturating_sub(now - active.renewed_at))
    }

    /// Clear the session unconditionally. Idempotent: always reports true.
    pub fn logout(&mut self) -> bool {
        if self.is_authenticated() {
            tracing::info!("session logged out");
        }
        self.state = State::LoggedOut;
        true
    }

    /// Snapshot for a status query. Never mutates; drive lapses through
    /// [`Self::expire_if_due`] before querying.
    #[must_use]
    pub fn status(&self, now: I) -> SessionStatus {
        match &self.state {
            State::Authenticated(active) => SessionStatus {
                authenticated: true,
                identity: Some(active.identity.clone()),
                time_remaining: self.config.lifetime.saturating_sub(now - active.renewed_at),
            },
            State::Unauthenticated | State::Expired { .. } | State::LoggedOut => SessionStatus {
                authenticated: false,
                identity: None,
                time_remaining: Duration::ZERO,
            },
        }
    }
}

/// Collapse envelope failures into the decrypt failure condition.
///
/// Framing errors and tag failures are deliberately indistinguishable at
/// this level; the reason string keeps the diagnostic.
fn map_open_error(err: CryptoError) -> EngineError {
    match err {
        CryptoError::DecryptionFailed { reason } => EngineError::DecryptionFailed { reason },
        other => EngineError::DecryptionFailed { reason: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use bookseal_crypto::kem::PublicKey;
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    const LIFETIME: Duration = Duration::from_secs(600);

    fn staff_session() -> Session {
        Session::new(SessionConfig { domain: kdf::KeyDomain::Staff, lifetime: LIFETIME })
    }

    fn seal_record(public_key_b64: &str, json: &[u8]) -> (String, String) {
        let recipient = PublicKey::from_base64(public_key_b64).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let sealed = envelope::seal(json, &recipient, &mut rng).unwrap();
        (sealed.payload, sealed.encapsulated_key)
    }

    #[test]
    fn authenticate_is_deterministic() {
        let t0 = Instant::now();
        let mut a = staff_session();
        let mut b = staff_session();

        let grant_a = a.authenticate("staff-1", b"sig-abc", t0).unwrap();
        let grant_b = b.authenticate("staff-1", b"sig-abc", t0).unwrap();

        assert_eq!(grant_a.public_key, grant_b.public_key);
        assert_eq!(grant_a.identity, "staff-1");
        assert_eq!(grant_a.lifetime, LIFETIME);
    }

    #[test]
    fn staff_and_client_domains_derive_different_keys() {
        let t0 = Instant::now();
        let mut staff = staff_session();
        let mut client =
            Session::new(SessionConfig { domain: kdf::KeyDomain::Client, lifetime: LIFETIME });

        let staff_grant = staff.authenticate("casey@example.com", b"secret", t0).unwrap();
        let client_grant = client.authenticate("casey@example.com", b"secret", t0).unwrap();

        assert_ne!(staff_grant.public_key, client_grant.public_key);
    }

    #[test]
    fn authenticate_rejects_empty_identity() {
        let mut session = staff_session();
        let result = session.authenticate("  ", b"secret", Instant::now());
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn authenticate_rejects_empty_secret() {
        let mut session = staff_session();
        let result = session.authenticate("staff-1", b"", Instant::now());
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn failed_authenticate_discards_prior_session() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"secret", t0).unwrap();

        let result = session.authenticate("", b"secret", t0);
        assert!(result.is_err());
        assert!(!session.is_authenticated(), "prior key must not survive a failed attempt");
    }

    #[test]
    fn decrypt_round_trip() {
        let t0 = Instant::now();
        let mut session = staff_session();
        let grant = session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let json = br#"{"title":"Checkup","description":"Annual","recipientContact":"c@example.com"}"#;
        let (payload, share) = seal_record(&grant.public_key, json);

        let record = session.decrypt_appointment(&payload, &share, t0).unwrap();
        assert_eq!(record.title, "Checkup");
        assert_eq!(record.description, "Annual");
        assert_eq!(record.recipient_contact, "c@example.com");
    }

    #[test]
    fn decrypt_requires_authentication() {
        let mut session = staff_session();
        let result = session.decrypt_appointment("aa", "bb", Instant::now());
        assert!(matches!(result, Err(EngineError::NotAuthenticated)));
    }

    #[test]
    fn decrypt_rejects_empty_fields() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"secret", t0).unwrap();

        let result = session.decrypt_appointment("", "bb", t0);
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
    }

    #[test]
    fn decrypt_after_deadline_reports_session_expired() {
        let t0 = Instant::now();
        let mut session = staff_session();
        let grant = session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let json = br#"{"title":"Checkup"}"#;
        let (payload, share) = seal_record(&grant.public_key, json);

        let late = t0 + LIFETIME;
        let result = session.decrypt_appointment(&payload, &share, late);
        assert!(matches!(
            result,
            Err(EngineError::SessionExpired { identity }) if identity == "staff-1"
        ));
        assert!(!session.is_authenticated());

        // Still expired, not "never logged in", on the next attempt.
        let again = session.decrypt_appointment(&payload, &share, late);
        assert!(matches!(again, Err(EngineError::SessionExpired { .. })));
    }

    #[test]
    fn expire_if_due_fires_once() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        assert_eq!(session.expire_if_due(t0 + LIFETIME - Duration::from_millis(1)), None);

        let notice = session.expire_if_due(t0 + LIFETIME);
        assert_eq!(notice, Some(SessionExpiredNotice { identity: "staff-1".to_string() }));

        assert_eq!(session.expire_if_due(t0 + LIFETIME), None, "notice must fire exactly once");
    }

    #[test]
    fn successful_decrypt_renews_deadline() {
        let t0 = Instant::now();
        let mut session = staff_session();
        let grant = session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let json = br#"{"title":"Checkup"}"#;
        let (payload, share) = seal_record(&grant.public_key, json);

        // Two decrypts spaced just under a lifetime apart both succeed.
        let t1 = t0 + LIFETIME - Duration::from_secs(1);
        session.decrypt_appointment(&payload, &share, t1).unwrap();

        let t2 = t1 + LIFETIME - Duration::from_secs(1);
        session.decrypt_appointment(&payload, &share, t2).unwrap();

        assert_eq!(session.time_remaining(t2), Some(LIFETIME));
    }

    #[test]
    fn failed_decrypt_does_not_renew() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let t1 = t0 + Duration::from_secs(100);
        let result = session.decrypt_appointment("00", "11", t1);
        assert!(result.is_err());

        assert_eq!(session.time_remaining(t1), Some(LIFETIME - Duration::from_secs(100)));
    }

    #[test]
    fn tampered_payload_fails_but_session_survives() {
        let t0 = Instant::now();
        let mut session = staff_session();
        let grant = session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let json = br#"{"title":"Checkup"}"#;
        let (payload, share) = seal_record(&grant.public_key, json);

        let mut tampered = bookseal_crypto::codec::decode_hex(&payload).unwrap();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xFF;
        let tampered = bookseal_crypto::codec::encode_hex(&tampered);

        let result = session.decrypt_appointment(&tampered, &share, t0);
        assert!(matches!(result, Err(EngineError::DecryptionFailed { .. })));
        assert!(session.is_authenticated(), "decrypt failure is fatal for the call only");

        // The untampered envelope still opens.
        session.decrypt_appointment(&payload, &share, t0).unwrap();
    }

    #[test]
    fn foreign_envelope_fails_decryption() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let mut other = staff_session();
        let other_grant = other.authenticate("staff-2", b"sig-xyz", t0).unwrap();

        let (payload, share) = seal_record(&other_grant.public_key, br#"{"title":"Private"}"#);

        let result = session.decrypt_appointment(&payload, &share, t0);
        assert!(matches!(result, Err(EngineError::DecryptionFailed { .. })));
    }

    #[test]
    fn non_record_plaintext_is_malformed() {
        let t0 = Instant::now();
        let mut session = staff_session();
        let grant = session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        let (payload, share) = seal_record(&grant.public_key, b"not json at all");

        let result = session.decrypt_appointment(&payload, &share, t0);
        assert!(matches!(result, Err(EngineError::MalformedRecord { .. })));
    }

    #[test]
    fn status_reflects_lifecycle() {
        let t0 = Instant::now();
        let mut session = staff_session();

        let status = session.status(t0);
        assert!(!status.authenticated);
        assert_eq!(status.identity, None);
        assert_eq!(status.time_remaining, Duration::ZERO);

        session.authenticate("staff-1", b"sig-abc", t0).unwrap();
        let t1 = t0 + Duration::from_secs(60);
        let status = session.status(t1);
        assert!(status.authenticated);
        assert_eq!(status.identity.as_deref(), Some("staff-1"));
        assert_eq!(status.time_remaining, LIFETIME - Duration::from_secs(60));

        session.expire_if_due(t0 + LIFETIME);
        let status = session.status(t0 + LIFETIME);
        assert!(!status.authenticated);
        assert_eq!(status.identity, None);
        assert_eq!(status.time_remaining, Duration::ZERO);
    }

    #[test]
    fn logout_is_idempotent() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"sig-abc", t0).unwrap();

        assert!(session.logout());
        assert!(session.logout());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn decrypt_after_logout_is_not_authenticated() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"sig-abc", t0).unwrap();
        session.logout();

        let result = session.decrypt_appointment("aa", "bb", t0);
        assert!(matches!(result, Err(EngineError::NotAuthenticated)));
    }

    #[test]
    fn reauthenticate_after_expiry_works() {
        let t0 = Instant::now();
        let mut session = staff_session();
        session.authenticate("staff-1", b"sig-abc", t0).unwrap();
        session.expire_if_due(t0 + LIFETIME);

        let grant = session.authenticate("staff-1", b"sig-abc", t0 + LIFETIME).unwrap();
        assert_eq!(grant.identity, "staff-1");
        assert!(session.is_authenticated());
    }
}
