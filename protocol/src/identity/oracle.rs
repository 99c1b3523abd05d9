//! # Oracle Records
//!
//! An [`Oracle`] is the persisted identity an external identifier resolves
//! to. Records are created from a [`NewOracle`] draft, which is validated
//! before it reaches any store.
//!
//! The credential fields (`email`, `password_hash`) only exist to satisfy
//! the shape of an auth record. Nobody logs in with them: wallet identities
//! get their own address as password, GitHub identities a random one.

use std::sync::OnceLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store::StoreError;

/// Salt length for password hashes.
const SALT_LEN: usize = 16;

/// Argon2id cost: 19 MiB, 2 passes, 1 lane.
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_LANES: u32 = 1;

fn wallet_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x[a-f0-9]{40}$").unwrap())
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// A persisted oracle identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub id: String,
    pub name: String,
    pub email: String,
    pub github_username: Option<String>,
    /// `<repo>/issues/<n>` of the announcement that verified the account.
    pub github_repo: Option<String>,
    /// Lowercase `0x` address.
    pub wallet_address: Option<String>,
    /// Announcement issue number. Unique across all records when set.
    pub birth_issue: Option<u64>,
    pub approved: bool,
    pub karma: i64,
    pub password_hash: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Oracle {
    /// Checks `password` against the stored PHC hash. Cost parameters
    /// come from the hash string, so older records keep verifying after
    /// the cost changes.
    pub fn verify_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// NewOracle
// ---------------------------------------------------------------------------

/// An oracle that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOracle {
    pub name: String,
    pub email: String,
    pub github_username: Option<String>,
    pub github_repo: Option<String>,
    pub wallet_address: Option<String>,
    pub birth_issue: Option<u64>,
    pub approved: bool,
    /// Plaintext; only its salted hash is stored.
    pub password: String,
}

impl NewOracle {
    /// Rejects drafts the store must never hold.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Invalid("name must not be empty".into()));
        }
        if self.email.trim().is_empty() {
            return Err(StoreError::Invalid("email must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(StoreError::Invalid("password must not be empty".into()));
        }
        if let Some(address) = &self.wallet_address {
            if !wallet_pattern().is_match(address) {
                return Err(StoreError::Invalid(format!(
                    "wallet_address '{address}' must match ^0x[a-f0-9]{{40}}$"
                )));
            }
        }
        if let Some(login) = &self.github_username {
            if login.trim().is_empty() {
                return Err(StoreError::Invalid("github_username must not be empty".into()));
            }
        }
        if self.github_username.is_none() && self.wallet_address.is_none() {
            return Err(StoreError::Invalid(
                "either github_username or wallet_address is required".into(),
            ));
        }
        Ok(())
    }

    /// Validates the draft and turns it into a record stamped at `now`.
    pub fn into_oracle(self, now: DateTime<Utc>) -> Result<Oracle, StoreError> {
        self.validate()?;
        Ok(Oracle {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            email: self.email,
            github_username: self.github_username,
            github_repo: self.github_repo,
            wallet_address: self.wallet_address,
            birth_issue: self.birth_issue,
            approved: self.approved,
            karma: 0,
            password_hash: hash_password(&self.password)?,
            created: now,
            updated: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

fn hasher() -> Result<Argon2<'static>, StoreError> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, None)
        .map_err(|e| StoreError::Backend(format!("argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Argon2id PHC string (`$argon2id$v=19$...`) with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| StoreError::Backend(format!("password salt: {e}")))?;
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Backend(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// A throwaway password for identities that never log in with one.
pub fn random_password() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
