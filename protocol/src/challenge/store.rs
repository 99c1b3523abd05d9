//! In-memory challenge registry.
//!
//! A single mutex guards the map, so every read-modify-write (expiry check
//! plus delete, insert-or-overwrite, compare-and-remove) is atomic with
//! respect to every other. No caller ever performs network I/O while holding
//! it: the flows validate, release, fetch, then come back to consume.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::{to_chrono, Clock, SystemClock};
use crate::config::{MAX_PENDING_CHALLENGES, SECRET_BYTES};

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// A pending secret bound to a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Issue number or lowercase wallet address.
    pub subject: String,
    /// Hex-encoded random code or nonce.
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    /// Expired strictly after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("too many pending verifications ({capacity}), try again later")]
    CapacityExceeded { capacity: usize },
}

// ---------------------------------------------------------------------------
// ChallengeStore
// ---------------------------------------------------------------------------

/// Expiring, single-use secret registry keyed by subject.
///
/// Implementations must make each method atomic with respect to the others.
pub trait ChallengeStore: Send + Sync {
    /// Mint a fresh secret for `subject`, replacing any pending one.
    fn issue(&self, subject: &str) -> Result<Challenge, ChallengeError>;

    /// `true` if a live challenge for `subject` carries exactly `presented`.
    /// An expired entry is removed and reported as `false`.
    fn validate(&self, subject: &str, presented: &str) -> bool;

    /// The live challenge for `subject`, if any. Expired entries are removed.
    fn lookup(&self, subject: &str) -> Option<Challenge>;

    /// Remove the challenge only if it is live and still carries `secret`.
    /// Returns whether this call removed it.
    fn consume(&self, subject: &str, secret: &str) -> bool;

    /// Remove whatever is pending for `subject`.
    fn invalidate(&self, subject: &str);

    /// Drop every expired entry, returning how many were dropped.
    fn sweep_expired(&self) -> usize;

    /// Number of entries held, expired or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime given to newly issued challenges.
    fn ttl(&self) -> Duration;
}

/// Mutex-guarded `HashMap` implementation of [`ChallengeStore`].
pub struct MemoryChallengeStore {
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Challenge>>,
}

impl MemoryChallengeStore {
    /// Store backed by the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            capacity: MAX_PENDING_CHALLENGES,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Override the pending-entry bound.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Returns the entry for `subject` if it is still live, removing it if not.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Challenge>,
    subject: &str,
    now: DateTime<Utc>,
) -> Option<&'a Challenge> {
    if entries
        .get(subject)
        .is_some_and(|challenge| challenge.is_expired_at(now))
    {
        entries.remove(subject);
        tracing::debug!(subject, "challenge expired");
        return None;
    }
    entries.get(subject)
}

impl ChallengeStore for MemoryChallengeStore {
    fn issue(&self, subject: &str) -> Result<Challenge, ChallengeError> {
        let now = self.clock.now();
        let challenge = Challenge {
            subject: subject.to_string(),
            secret: generate_secret(SECRET_BYTES),
            issued_at: now,
            expires_at: now + to_chrono(self.ttl),
        };

        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(subject) {
            entries.retain(|_, pending| !pending.is_expired_at(now));
            if entries.len() >= self.capacity {
                tracing::warn!(capacity = self.capacity, "challenge store full");
                return Err(ChallengeError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
        }
        entries.insert(subject.to_string(), challenge.clone());
        Ok(challenge)
    }

    fn validate(&self, subject: &str, presented: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        live_entry(&mut entries, subject, now).is_some_and(|challenge| challenge.secret == presented)
    }

    fn lookup(&self, subject: &str) -> Option<Challenge> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        live_entry(&mut entries, subject, now).cloned()
    }

    fn consume(&self, subject: &str, secret: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let matches =
            live_entry(&mut entries, subject, now).is_some_and(|challenge| challenge.secret == secret);
        if matches {
            entries.remove(subject);
        }
        matches
    }

    fn invalidate(&self, subject: &str) {
        self.entries.lock().remove(subject);
    }

    fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, challenge| !challenge.is_expired_at(now));
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// `bytes` bytes from the OS RNG, hex-encoded.
pub fn generate_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
