//! # OracleDb: Persistent Record Store
//!
//! sled-backed [`OracleStore`]. Records and their unique indexes live in
//! separate trees of one database:
//!
//! | Tree              | Key                     | Value            |
//! |-------------------|-------------------------|------------------|
//! | `oracles`         | `id` (UTF-8)            | `bincode(Oracle)`|
//! | `idx_github`      | lowercase login (UTF-8) | `id`             |
//! | `idx_wallet`      | `0x` address (UTF-8)    | `id`             |
//! | `idx_birth_issue` | issue number (8B BE)    | `id`             |
//!
//! ## Atomicity
//!
//! `create` checks and writes all four trees in one sled transaction. A
//! uniqueness violation aborts it, so a rejected record never becomes
//! reachable through any index. Concurrent creators of the same login are
//! serialized by sled's conflict detection; exactly one commits.

use std::path::Path;
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};

use super::oracle::{NewOracle, Oracle};
use super::store::{
    github_key, OracleStore, StoreError, FIELD_BIRTH_ISSUE, FIELD_GITHUB_USERNAME,
    FIELD_WALLET_ADDRESS,
};
use crate::clock::{Clock, SystemClock};

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

fn encode(oracle: &Oracle) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(oracle).map_err(|e| StoreError::Backend(format!("serialization error: {e}")))
}

fn decode(bytes: &[u8]) -> Result<Oracle, StoreError> {
    bincode::deserialize(bytes)
        .map_err(|e| StoreError::Backend(format!("deserialization error: {e}")))
}

fn flatten(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(inner) => inner.into(),
    }
}

// ---------------------------------------------------------------------------
// OracleDb
// ---------------------------------------------------------------------------

/// Persistent oracle records.
///
/// Cheap to clone; clones share the same sled handle.
#[derive(Clone)]
pub struct OracleDb {
    db: Db,
    oracles: Tree,
    by_github: Tree,
    by_wallet: Tree,
    by_issue: Tree,
    clock: Arc<dyn Clock>,
}

impl OracleDb {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is deleted when dropped.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            oracles: db.open_tree("oracles")?,
            by_github: db.open_tree("idx_github")?,
            by_wallet: db.open_tree("idx_wallet")?,
            by_issue: db.open_tree("idx_birth_issue")?,
            db,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used for `created`/`updated`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Block until every write is durable. Writes are otherwise flushed by
    /// sled in the background every few hundred milliseconds.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn lookup_index(&self, index: &Tree, key: &[u8]) -> Result<Option<Oracle>, StoreError> {
        match index.get(key)? {
            Some(id) => match self.oracles.get(&id)? {
                Some(bytes) => decode(&bytes).map(Some),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

impl OracleStore for OracleDb {
    fn get(&self, id: &str) -> Result<Option<Oracle>, StoreError> {
        match self.oracles.get(id.as_bytes())? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn find_by_github(&self, login: &str) -> Result<Option<Oracle>, StoreError> {
        self.lookup_index(&self.by_github, github_key(login).as_bytes())
    }

    fn find_by_wallet(&self, address: &str) -> Result<Option<Oracle>, StoreError> {
        self.lookup_index(&self.by_wallet, address.as_bytes())
    }

    fn create(&self, draft: NewOracle) -> Result<Oracle, StoreError> {
        let oracle = draft.into_oracle(self.clock.now())?;
        let bytes = encode(&oracle)?;
        let id = oracle.id.as_bytes();
        let login = oracle.github_username.as_deref().map(github_key);
        let issue_key = oracle.birth_issue.map(u64::to_be_bytes);

        (&self.oracles, &self.by_github, &self.by_wallet, &self.by_issue)
            .transaction(|(oracles, by_github, by_wallet, by_issue)| {
                if let Some(login) = &login {
                    if by_github.get(login.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(StoreError::Duplicate {
                            field: FIELD_GITHUB_USERNAME,
                            value: login.clone(),
                        }));
                    }
                    by_github.insert(login.as_bytes(), id)?;
                }
                if let Some(address) = &oracle.wallet_address {
                    if by_wallet.get(address.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(StoreError::Duplicate {
                            field: FIELD_WALLET_ADDRESS,
                            value: address.clone(),
                        }));
                    }
                    by_wallet.insert(address.as_bytes(), id)?;
                }
                if let (Some(key), Some(issue)) = (&issue_key, oracle.birth_issue) {
                    if by_issue.get(key)?.is_some() {
                        return Err(ConflictableTransactionError::Abort(StoreError::Duplicate {
                            field: FIELD_BIRTH_ISSUE,
                            value: issue.to_string(),
                        }));
                    }
                    by_issue.insert(&key[..], id)?;
                }
                oracles.insert(id, bytes.as_slice())?;
                Ok(())
            })
            .map_err(flatten)?;

        tracing::debug!(oracle_id = %oracle.id, "oracle persisted");
        Ok(oracle)
    }

    fn set_approved(&self, id: &str, approved: bool) -> Result<Oracle, StoreError> {
        let now = self.clock.now();
        let updated = self
            .oracles
            .transaction(|oracles| {
                let Some(bytes) = oracles.get(id.as_bytes())? else {
                    return Err(ConflictableTransactionError::Abort(StoreError::NotFound(
                        id.to_string(),
                    )));
                };
                let mut oracle = decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                oracle.approved = approved;
                oracle.updated = now;
                let encoded = encode(&oracle).map_err(ConflictableTransactionError::Abort)?;
                oracles.insert(id.as_bytes(), encoded)?;
                Ok(oracle)
            })
            .map_err(flatten)?;

        Ok(updated)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.oracles.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::oracle::random_password;

    fn wallet_draft(address: &str) -> NewOracle {
        NewOracle {
            name: "Oracle-0x111111".into(),
            email: "11111111@wallet.oraclenet".into(),
            github_username: None,
            github_repo: None,
            wallet_address: Some(address.into()),
            birth_issue: None,
            approved: false,
            password: address.into(),
        }
    }

    fn github_draft(login: &str, issue: u64) -> NewOracle {
        NewOracle {
            name: login.into(),
            email: format!("{login}@github.oracle"),
            github_username: Some(login.into()),
            github_repo: Some(format!("oracle-v2/issues/{issue}")),
            wallet_address: None,
            birth_issue: Some(issue),
            approved: true,
            password: random_password(),
        }
    }

    #[test]
    fn open_temporary_database() {
        let db = OracleDb::open_temporary().expect("should create temp db");
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn create_and_lookup_through_every_index() {
        let db = OracleDb::open_temporary().unwrap();
        let address = "0x1111111111111111111111111111111111111111";
        let wallet = db.create(wallet_draft(address)).unwrap();
        let github = db.create(github_draft("Nat", 42)).unwrap();

        assert_eq!(db.get(&wallet.id).unwrap(), Some(wallet.clone()));
        assert_eq!(db.find_by_wallet(address).unwrap(), Some(wallet));
        assert_eq!(db.find_by_github("nat").unwrap(), Some(github));
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn duplicate_birth_issue_aborts_whole_record() {
        let db = OracleDb::open_temporary().unwrap();
        db.create(github_draft("nat", 42)).unwrap();

        let err = db.create(github_draft("someone-else", 42)).unwrap_err();
        assert!(err.is_duplicate_of(FIELD_BIRTH_ISSUE));
        // The login index write in the aborted transaction must not survive.
        assert_eq!(db.find_by_github("someone-else").unwrap(), None);
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn duplicate_wallet_is_rejected() {
        let db = OracleDb::open_temporary().unwrap();
        let address = "0x2222222222222222222222222222222222222222";
        db.create(wallet_draft(address)).unwrap();
        assert!(db
            .create(wallet_draft(address))
            .unwrap_err()
            .is_duplicate_of(FIELD_WALLET_ADDRESS));
    }

    #[test]
    fn invalid_draft_never_reaches_disk() {
        let db = OracleDb::open_temporary().unwrap();
        let err = db
            .create(wallet_draft("0xNOTLOWERCASE00000000000000000000000000000"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn approval_is_persisted() {
        let db = OracleDb::open_temporary().unwrap();
        let created = db
            .create(wallet_draft("0x3333333333333333333333333333333333333333"))
            .unwrap();
        assert!(db.set_approved(&created.id, true).unwrap().approved);
        assert!(db.get(&created.id).unwrap().unwrap().approved);
        assert!(matches!(
            db.set_approved("nope", true),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let db = OracleDb::open(dir.path()).expect("should open db");
            let oracle = db.create(github_draft("nat", 7)).unwrap();
            db.flush().unwrap();
            oracle.id
        };

        let db = OracleDb::open(dir.path()).expect("should reopen db");
        let oracle = db.find_by_github("nat").unwrap().expect("record persisted");
        assert_eq!(oracle.id, id);
        assert_eq!(oracle.birth_issue, Some(7));
    }

    #[test]
    fn approval_survives_reopen_after_flush() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let db = OracleDb::open(dir.path()).expect("should open db");
            let mut draft = github_draft("nat", 7);
            draft.approved = false;
            let oracle = db.create(draft).unwrap();
            db.set_approved(&oracle.id, true).unwrap();
            db.flush().unwrap();
            oracle.id
        };

        let db = OracleDb::open(dir.path()).expect("should reopen db");
        assert!(db.get(&id).unwrap().expect("record persisted").approved);
    }
}
