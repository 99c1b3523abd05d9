//! # Social Verification Flow
//!
//! Proves control of a GitHub account through its announcement issue:
//!
//! ```text
//! start(issueUrl)                     verify(issueUrl, code)
//!   NONE ──issue code──> PENDING ──author commented verify:<code>──> VERIFIED
//!                          │
//!                          └──10 minutes──> EXPIRED
//! ```
//!
//! A wrong or stale code and a missing comment are soft rejections. Bad
//! URLs, foreign repositories and tracker failures are hard errors. Tracker
//! calls happen between store operations, never inside one.

use std::sync::Arc;

use super::issue_url::IssueRef;
use super::name::NameExtractor;
use super::tracker::{IssueComment, IssueTracker};
use crate::challenge::ChallengeStore;
use crate::config::{describe_ttl, SocialPolicy, VERIFY_COMMENT_PREFIX};
use crate::error::{AuthError, Rejection, Verdict};
use crate::identity::{IdentityResolver, Oracle, StoreError, TokenIssuer};

/// Response to a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedVerification {
    pub issue: IssueRef,
    pub code: String,
    /// What the user has to do next.
    pub instruction: String,
    pub oracle_name: Option<String>,
    /// Issue author; only their comment counts.
    pub author: String,
    /// Human-readable code lifetime ("10 minutes").
    pub expires_in: String,
}

/// A successful GitHub verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedVerification {
    pub token: String,
    pub created: bool,
    pub oracle: Oracle,
}

pub struct SocialVerifier {
    tracker: Arc<dyn IssueTracker>,
    challenges: Arc<dyn ChallengeStore>,
    resolver: Arc<IdentityResolver>,
    tokens: Arc<dyn TokenIssuer>,
    policy: SocialPolicy,
    names: NameExtractor,
}

impl SocialVerifier {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        challenges: Arc<dyn ChallengeStore>,
        resolver: Arc<IdentityResolver>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            tracker,
            challenges,
            resolver,
            tokens,
            policy: SocialPolicy::default(),
            names: NameExtractor::new(),
        }
    }

    pub fn with_policy(mut self, policy: SocialPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn challenges(&self) -> &Arc<dyn ChallengeStore> {
        &self.challenges
    }

    pub fn policy(&self) -> &SocialPolicy {
        &self.policy
    }

    fn parse_allowed(&self, issue_url: &str) -> Result<IssueRef, AuthError> {
        if issue_url.trim().is_empty() {
            return Err(AuthError::MissingField("issueUrl is required"));
        }
        let issue = IssueRef::parse(issue_url)?;
        if !self.policy.allows(&issue.owner, &issue.repo) {
            return Err(AuthError::ForeignRepository {
                owner: self.policy.owner.clone(),
                repo: self.policy.repo.clone(),
            });
        }
        Ok(issue)
    }

    /// Checks the announcement issue and issues a code for it.
    pub async fn start(&self, issue_url: &str) -> Result<StartedVerification, AuthError> {
        let issue = self.parse_allowed(issue_url)?;
        let announcement = self
            .tracker
            .fetch_issue(&issue)
            .await
            .map_err(AuthError::IssueNotFound)?;
        if !announcement.has_label(&self.policy.label) {
            return Err(AuthError::MissingLabel(self.policy.label.clone()));
        }

        let oracle_name = self.names.extract(&announcement.title, &announcement.body);
        let challenge = self.challenges.issue(&issue.subject_key())?;
        tracing::info!(
            issue = issue.number,
            author = %announcement.author,
            "GitHub verification started"
        );

        Ok(StartedVerification {
            instruction: format!(
                "Post this comment on your announcement issue:\n\n{}{}",
                VERIFY_COMMENT_PREFIX, challenge.secret
            ),
            code: challenge.secret,
            issue,
            oracle_name,
            author: announcement.author,
            expires_in: describe_ttl(self.challenges.ttl()),
        })
    }

    /// Looks for the issue author's `verify:<code>` comment and, if found,
    /// resolves and approves the GitHub identity.
    pub async fn verify(
        &self,
        issue_url: &str,
        code: &str,
    ) -> Result<Verdict<CompletedVerification>, AuthError> {
        let issue = self.parse_allowed(issue_url)?;
        let subject = issue.subject_key();
        if !self.challenges.validate(&subject, code) {
            tracing::debug!(issue = issue.number, "verification code rejected");
            return Ok(Verdict::Rejected(Rejection::new(
                "Invalid or expired code. Start again.",
            )));
        }

        let announcement = self
            .tracker
            .fetch_issue(&issue)
            .await
            .map_err(AuthError::IssueFetch)?;
        let comments = self
            .tracker
            .list_comments(&issue)
            .await
            .map_err(AuthError::CommentFetch)?;

        let proof = format!("{}{}", VERIFY_COMMENT_PREFIX, code);
        if find_proof(&comments, &announcement.author, &proof).is_none() {
            return Ok(Verdict::Rejected(
                Rejection::new(format!(
                    "Comment with '{}' not found from @{}",
                    proof, announcement.author
                ))
                .with_hint(format!(
                    "Post a comment on your announcement issue with: {}",
                    proof
                )),
            ));
        }

        let oracle_name = self.names.extract(&announcement.title, &announcement.body);
        // Password hashing and store writes block; keep them off the
        // async workers.
        let resolver = Arc::clone(&self.resolver);
        let author = announcement.author.clone();
        let resolved_issue = issue.clone();
        let resolution = tokio::task::spawn_blocking(move || {
            resolver.resolve_github_verified(&author, oracle_name.as_deref(), &resolved_issue)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("resolution task failed: {e}")))??;
        let token = self.tokens.issue(&resolution.oracle);
        // A code re-issued while this request was in flight stays pending.
        self.challenges.consume(&subject, code);

        tracing::info!(
            issue = issue.number,
            github = %announcement.author,
            oracle_id = %resolution.oracle.id,
            created = resolution.created,
            "GitHub verification completed"
        );
        Ok(Verdict::Accepted(CompletedVerification {
            token,
            created: resolution.created,
            oracle: resolution.oracle,
        }))
    }
}

/// First comment by `author` (case-insensitive) containing `proof`.
fn find_proof<'a>(comments: &'a [IssueComment], author: &str, proof: &str) -> Option<&'a IssueComment> {
    comments.iter().find(|comment| {
        !comment.author.is_empty()
            && comment.author.eq_ignore_ascii_case(author)
            && comment.body.contains(proof)
    })
}
