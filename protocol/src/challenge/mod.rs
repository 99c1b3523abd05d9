//! # Challenge Store
//!
//! Short-lived, single-use secrets bound to a subject. Both verification
//! flows use one: the social flow keys codes by issue number, the wallet flow
//! keys nonces by lowercase address.
//!
//! ## Lifecycle
//!
//! ```text
//! issue(subject) ──► PENDING ──validate ok──► caller acts ──► invalidate / consume
//!                       │
//!                       └── now > expires_at ──► removed on next validate/lookup/sweep
//! ```
//!
//! At most one challenge is live per subject; issuing again overwrites.
//! `validate` never deletes on success. Consumption is an explicit second
//! step so "verify, then act, then consume" stays visible at the call site.
//!
//! Expiry is lazy. `sweep_expired` exists for the node's periodic cleanup and
//! runs automatically when a store reaches capacity.

pub mod store;

pub use store::{generate_secret, Challenge, ChallengeError, ChallengeStore, MemoryChallengeStore};
