//! # Protocol Configuration & Constants
//!
//! Every fixed value the verification flows depend on lives here: challenge
//! lifetimes, the announcement repository, the sign-in statement, and the
//! synthetic e-mail domains handed to the credential system.
//!
//! The sign-in statement is part of the message users sign. Changing it
//! invalidates every outstanding nonce, so treat it as wire format.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Challenge Lifetimes
// ---------------------------------------------------------------------------

/// How long a GitHub verification code stays valid after `start`.
pub const SOCIAL_CHALLENGE_TTL: Duration = Duration::from_secs(10 * 60);

/// How long a wallet nonce stays valid after issuance.
pub const WALLET_NONCE_TTL: Duration = Duration::from_secs(5 * 60);

/// Random bytes behind every code and nonce (hex-encoded to twice the length).
pub const SECRET_BYTES: usize = 4;

/// Upper bound on pending challenges per store. Expired entries are swept
/// before a new issuance is refused.
pub const MAX_PENDING_CHALLENGES: usize = 10_000;

/// Interval of the node's background sweep over both challenge stores.
pub const CHALLENGE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Social Verification
// ---------------------------------------------------------------------------

/// Owner of the only repository whose issues count as oracle announcements.
pub const ANNOUNCEMENT_OWNER: &str = "Soul-Brews-Studio";

/// Repository whose issues count as oracle announcements.
pub const ANNOUNCEMENT_REPO: &str = "oracle-v2";

/// Label an announcement issue must carry.
pub const ANNOUNCEMENT_LABEL: &str = "oracle-family";

/// Prefix of the comment that proves control of the issue author's account.
pub const VERIFY_COMMENT_PREFIX: &str = "verify:";

/// Default GitHub REST endpoint.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Comments requested per page from the issue tracker.
pub const COMMENTS_PER_PAGE: usize = 100;

/// Hard stop on comment pagination.
pub const MAX_COMMENT_PAGES: usize = 10;

/// Timeout for a single issue tracker request.
pub const TRACKER_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wallet Verification
// ---------------------------------------------------------------------------

/// First line of the message every wallet signs.
pub const SIGN_IN_STATEMENT: &str = "Sign in to OracleNet";

// ---------------------------------------------------------------------------
// Identity Records
// ---------------------------------------------------------------------------

/// Domain of the synthetic e-mail given to GitHub-verified oracles.
pub const GITHUB_EMAIL_DOMAIN: &str = "github.oracle";

/// Domain of the synthetic e-mail given to wallet-verified oracles.
pub const WALLET_EMAIL_DOMAIN: &str = "wallet.oraclenet";

/// Prefix of the default display name for wallet-verified oracles.
pub const WALLET_NAME_PREFIX: &str = "Oracle-";

/// Lifetime of a bearer token issued after a successful verification.
pub const SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Social Policy
// ---------------------------------------------------------------------------

/// Which issues the social flow accepts as identity announcements.
///
/// Production runs with [`SocialPolicy::default`]; tests and staging
/// deployments can point it at a different repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialPolicy {
    pub owner: String,
    pub repo: String,
    pub label: String,
}

impl Default for SocialPolicy {
    fn default() -> Self {
        Self {
            owner: ANNOUNCEMENT_OWNER.to_string(),
            repo: ANNOUNCEMENT_REPO.to_string(),
            label: ANNOUNCEMENT_LABEL.to_string(),
        }
    }
}

impl SocialPolicy {
    /// Returns `true` when `owner/repo` is the announcement repository.
    pub fn allows(&self, owner: &str, repo: &str) -> bool {
        owner == self.owner && repo == self.repo
    }
}

/// Renders a TTL the way the start endpoint reports it ("10 minutes").
pub fn describe_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{} seconds", secs)
    }
}
