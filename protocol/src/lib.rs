// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # OracleNet Protocol Core Library
//!
//! Identity verification for OracleNet oracles. An oracle proves who it is
//! in one of two ways, and either proof resolves to the same kind of
//! persistent identity:
//!
//! - **social**: the oracle's GitHub account posts a one-time code as a
//!   comment on its announcement issue.
//! - **wallet**: the oracle's wallet signs a message carrying a one-time
//!   nonce, and the signer is recovered from the signature.
//!
//! ## Architecture
//!
//! - **challenge**: expiring, single-use secrets keyed by subject.
//! - **social**: issue URL parsing, name extraction, the issue tracker
//!   client and the GitHub flow.
//! - **wallet**: addresses, the sign-in message, signer recovery and the
//!   wallet flow.
//! - **identity**: oracle records, stores (memory and sled), the resolver
//!   and session tokens.
//! - **error**: hard failures and soft rejections.
//! - **clock**: injectable time source.
//! - **config**: protocol constants.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oraclenet_protocol::challenge::MemoryChallengeStore;
//! use oraclenet_protocol::config::WALLET_NONCE_TTL;
//! use oraclenet_protocol::identity::{IdentityResolver, MemoryOracleStore, SessionTokens};
//! use oraclenet_protocol::wallet::SignatureVerifier;
//!
//! let verifier = SignatureVerifier::new(
//!     Arc::new(MemoryChallengeStore::new(WALLET_NONCE_TTL)),
//!     Arc::new(IdentityResolver::new(Arc::new(MemoryOracleStore::new()))),
//!     Arc::new(SessionTokens::new()),
//! );
//! let grant = verifier.issue_nonce("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
//! println!("sign this:\n{}", grant.message);
//! ```

pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod social;
pub mod wallet;

pub use error::{AuthError, ErrorKind, Rejection, Verdict};
