//! # Identity Module
//!
//! Persistent oracle identities and the bearer credentials handed out for
//! them.
//!
//! 1. **Oracle**: the record, its creation draft and password hashing.
//! 2. **Store**: the [`OracleStore`] contract with an in-memory and a sled
//!    implementation. Unique indexes on `github_username`, `wallet_address`
//!    and `birth_issue`.
//! 3. **Resolver**: idempotent find-or-create, one strategy per flow.
//! 4. **Token**: opaque session credentials.

pub mod db;
pub mod oracle;
pub mod resolver;
pub mod store;
pub mod token;

pub use db::OracleDb;
pub use oracle::{hash_password, random_password, NewOracle, Oracle};
pub use resolver::{IdentityResolver, Resolution};
pub use store::{MemoryOracleStore, OracleStore, StoreError};
pub use token::{SessionTokens, TokenIssuer};
