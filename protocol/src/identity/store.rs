//! Record store contract and the in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::oracle::{NewOracle, Oracle};
use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{field} '{value}' is already taken")]
    Duplicate { field: &'static str, value: String },

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("oracle not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// `true` if the write collided with an existing record on `field`.
    pub fn is_duplicate_of(&self, field: &str) -> bool {
        matches!(self, StoreError::Duplicate { field: f, .. } if *f == field)
    }
}

/// Unique-index names, also used in [`StoreError::Duplicate`].
pub const FIELD_GITHUB_USERNAME: &str = "github_username";
pub const FIELD_WALLET_ADDRESS: &str = "wallet_address";
pub const FIELD_BIRTH_ISSUE: &str = "birth_issue";

/// Index key for a GitHub login. Logins are case-insensitive.
pub(crate) fn github_key(login: &str) -> String {
    login.to_ascii_lowercase()
}

/// Persistence for oracle records.
///
/// `create` is all-or-nothing: when a unique index rejects the record, no
/// part of it is left addressable.
pub trait OracleStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Oracle>, StoreError>;

    fn find_by_github(&self, login: &str) -> Result<Option<Oracle>, StoreError>;

    /// Lookup by lowercase `0x` address.
    fn find_by_wallet(&self, address: &str) -> Result<Option<Oracle>, StoreError>;

    fn create(&self, draft: NewOracle) -> Result<Oracle, StoreError>;

    /// Sets `approved` and bumps `updated`.
    fn set_approved(&self, id: &str, approved: bool) -> Result<Oracle, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryOracleStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    records: HashMap<String, Oracle>,
    by_github: HashMap<String, String>,
    by_wallet: HashMap<String, String>,
    by_issue: HashMap<u64, String>,
}

/// [`OracleStore`] held in process memory.
pub struct MemoryOracleStore {
    clock: Arc<dyn Clock>,
    tables: Mutex<Tables>,
}

impl MemoryOracleStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl Default for MemoryOracleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleStore for MemoryOracleStore {
    fn get(&self, id: &str) -> Result<Option<Oracle>, StoreError> {
        Ok(self.tables.lock().records.get(id).cloned())
    }

    fn find_by_github(&self, login: &str) -> Result<Option<Oracle>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .by_github
            .get(&github_key(login))
            .and_then(|id| tables.records.get(id))
            .cloned())
    }

    fn find_by_wallet(&self, address: &str) -> Result<Option<Oracle>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .by_wallet
            .get(address)
            .and_then(|id| tables.records.get(id))
            .cloned())
    }

    fn create(&self, draft: NewOracle) -> Result<Oracle, StoreError> {
        let oracle = draft.into_oracle(self.clock.now())?;
        let mut tables = self.tables.lock();

        let login = oracle.github_username.as_deref().map(github_key);
        if let Some(login) = &login {
            if tables.by_github.contains_key(login) {
                return Err(StoreError::Duplicate {
                    field: FIELD_GITHUB_USERNAME,
                    value: login.clone(),
                });
            }
        }
        if let Some(address) = &oracle.wallet_address {
            if tables.by_wallet.contains_key(address) {
                return Err(StoreError::Duplicate {
                    field: FIELD_WALLET_ADDRESS,
                    value: address.clone(),
                });
            }
        }
        if let Some(issue) = oracle.birth_issue {
            if tables.by_issue.contains_key(&issue) {
                return Err(StoreError::Duplicate {
                    field: FIELD_BIRTH_ISSUE,
                    value: issue.to_string(),
                });
            }
        }

        if let Some(login) = login {
            tables.by_github.insert(login, oracle.id.clone());
        }
        if let Some(address) = &oracle.wallet_address {
            tables.by_wallet.insert(address.clone(), oracle.id.clone());
        }
        if let Some(issue) = oracle.birth_issue {
            tables.by_issue.insert(issue, oracle.id.clone());
        }
        tables.records.insert(oracle.id.clone(), oracle.clone());
        Ok(oracle)
    }

    fn set_approved(&self, id: &str, approved: bool) -> Result<Oracle, StoreError> {
        let now = self.clock.now();
        let mut tables = self.tables.lock();
        let oracle = tables
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        oracle.approved = approved;
        oracle.updated = now;
        Ok(oracle.clone())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.tables.lock().records.len())
    }
}
