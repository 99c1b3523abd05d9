//! # Social Module
//!
//! Proof of control over a GitHub account, via a code posted as a comment on
//! the account's oracle announcement issue.

pub mod flow;
pub mod issue_url;
pub mod name;
pub mod tracker;

pub use flow::{CompletedVerification, SocialVerifier, StartedVerification};
pub use issue_url::IssueRef;
pub use name::NameExtractor;
pub use tracker::{GitHubClient, Issue, IssueComment, IssueTracker, MemoryIssueTracker, TrackerError};
