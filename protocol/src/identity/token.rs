//! Bearer credentials for resolved identities.
//!
//! Tokens are opaque 256-bit hex strings. Only their SHA-256 digest is kept,
//! so a dump of the session table cannot be replayed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use super::oracle::Oracle;
use crate::challenge::generate_secret;
use crate::clock::{to_chrono, Clock, SystemClock};
use crate::config::SESSION_TTL;

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// Issues and resolves bearer credentials.
pub trait TokenIssuer: Send + Sync {
    /// A fresh credential for `oracle`.
    fn issue(&self, oracle: &Oracle) -> String;

    /// The oracle id behind a live credential.
    fn resolve(&self, token: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
struct Session {
    oracle_id: String,
    expires_at: DateTime<Utc>,
}

/// In-memory session table.
pub struct SessionTokens {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, Session>,
}

impl SessionTokens {
    pub fn new() -> Self {
        Self::with_clock(SESSION_TTL, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            sessions: DashMap::new(),
        }
    }

    /// Drop expired sessions, returning how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at >= now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionTokens {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl TokenIssuer for SessionTokens {
    fn issue(&self, oracle: &Oracle) -> String {
        let token = generate_secret(TOKEN_BYTES);
        self.sessions.insert(
            digest(&token),
            Session {
                oracle_id: oracle.id.clone(),
                expires_at: self.clock.now() + to_chrono(self.ttl),
            },
        );
        token
    }

    fn resolve(&self, token: &str) -> Option<String> {
        let key = digest(token);
        let now = self.clock.now();
        let session = self.sessions.get(&key)?.clone();
        if session.expires_at < now {
            self.sessions.remove(&key);
            return None;
        }
        Some(session.oracle_id)
    }
}
