//! Error types for the verification flows.
//!
//! Failures come in two tiers. A hard failure is an [`AuthError`]: the
//! request was malformed, an upstream call broke, or persistence failed, and
//! the caller gets an error status. A soft failure is a [`Rejection`] carried
//! in [`Verdict::Rejected`]: the request was well-formed but the proof did not
//! hold yet ("try again"), and the caller gets a normal response with
//! `success: false`.

use thiserror::Error;

use crate::challenge::ChallengeError;
use crate::identity::StoreError;
use crate::social::TrackerError;
use crate::wallet::{AddressError, SignatureError};

/// Coarse classification of a hard failure. The HTTP layer maps each kind to
/// a status code in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad URL, bad address, missing field. Nothing was mutated.
    MalformedInput,
    /// The issue tracker answered with a non-success status.
    UpstreamStatus,
    /// The issue tracker could not be reached or returned garbage.
    UpstreamUnavailable,
    /// A proof was checked and did not hold.
    Verification,
    /// A uniqueness constraint rejected the write.
    Conflict,
    /// The record store failed.
    Persistence,
    /// A bounded resource is exhausted.
    Unavailable,
}

/// Hard failures of the verification flows.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid GitHub issue URL")]
    InvalidIssueUrl,

    #[error("Must be an {repo} announcement issue ({owner}/{repo})")]
    ForeignRepository { owner: String, repo: String },

    /// A required field was absent or blank. Carries the full message.
    #[error("{0}")]
    MissingField(&'static str),

    #[error("Invalid Ethereum address format")]
    InvalidAddress(#[source] AddressError),

    #[error("Issue not found: {0}")]
    IssueNotFound(#[source] TrackerError),

    #[error("Failed to fetch issue: {0}")]
    IssueFetch(#[source] TrackerError),

    #[error("Failed to check comments: {0}")]
    CommentFetch(#[source] TrackerError),

    #[error("Issue must have '{0}' label (Oracle announcement)")]
    MissingLabel(String),

    #[error("No nonce found. Call /api/auth/siwe/nonce first")]
    NonceNotFound,

    #[error("Signature verification failed: {0}")]
    InvalidSignature(#[source] SignatureError),

    #[error("Address mismatch: expected {expected}, got {recovered}")]
    AddressMismatch { expected: String, recovered: String },

    #[error("Failed to save oracle: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Challenge(#[from] ChallengeError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidIssueUrl
            | AuthError::ForeignRepository { .. }
            | AuthError::MissingField(_)
            | AuthError::InvalidAddress(_) => ErrorKind::MalformedInput,
            AuthError::IssueNotFound(e) | AuthError::IssueFetch(e) | AuthError::CommentFetch(e) => {
                if e.upstream_status().is_some() {
                    ErrorKind::UpstreamStatus
                } else {
                    ErrorKind::UpstreamUnavailable
                }
            }
            AuthError::MissingLabel(_)
            | AuthError::NonceNotFound
            | AuthError::InvalidSignature(_)
            | AuthError::AddressMismatch { .. } => ErrorKind::Verification,
            AuthError::Store(StoreError::Duplicate { .. }) => ErrorKind::Conflict,
            AuthError::Store(_) => ErrorKind::Persistence,
            AuthError::Challenge(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<AddressError> for AuthError {
    fn from(err: AddressError) -> Self {
        AuthError::InvalidAddress(err)
    }
}

impl From<SignatureError> for AuthError {
    fn from(err: SignatureError) -> Self {
        AuthError::InvalidSignature(err)
    }
}

// ---------------------------------------------------------------------------
// Soft Failures
// ---------------------------------------------------------------------------

/// A well-formed attempt whose proof did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// What went wrong, for display.
    pub error: String,
    /// What the caller can do about it.
    pub hint: Option<String>,
}

impl Rejection {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Outcome of a verification step that can soft-fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> Verdict<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// The accepted value, if any.
    pub fn accepted(self) -> Option<T> {
        match self {
            Verdict::Accepted(value) => Some(value),
            Verdict::Rejected(_) => None,
        }
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Accepted(_) => None,
            Verdict::Rejected(rejection) => Some(rejection),
        }
    }
}
