//! # Issue Tracker
//!
//! The social flow reads two things from the outside world: an announcement
//! issue (author, title, body, labels) and the comments posted on it. Both
//! sit behind [`IssueTracker`] so the flow can run against GitHub in
//! production and against [`MemoryIssueTracker`] in tests.
//!
//! Failures are never swallowed. A non-success status surfaces as
//! [`TrackerError::Status`] carrying the upstream code, and a payload that
//! does not decode surfaces as [`TrackerError::Malformed`]. A comment list
//! longer than the page limit is [`TrackerError::Truncated`], never a
//! silently shortened list. The one lenient
//! spot is the label list: if it cannot be read, the issue simply has no
//! labels.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::issue_url::IssueRef;
use crate::config::{COMMENTS_PER_PAGE, MAX_COMMENT_PAGES, TRACKER_TIMEOUT};

/// Connection timeout for tracker requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sent on every request; GitHub refuses anonymous agents.
const USER_AGENT: &str = concat!("oraclenet/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The parts of an issue the social flow looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    /// Login of the account that opened the issue.
    pub author: String,
    pub labels: Vec<String>,
}

impl Issue {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|name| name == label)
    }
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    /// Login of the commenter. Empty for deleted accounts.
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("GitHub API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("comment list exceeds {pages} pages of {per_page}")]
    Truncated { pages: usize, per_page: usize },
}

impl TrackerError {
    /// HTTP status returned by the tracker, when it answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            TrackerError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.upstream_status() == Some(404)
    }
}

/// Read access to announcement issues and their comments.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn fetch_issue(&self, issue: &IssueRef) -> Result<Issue, TrackerError>;

    /// Every comment on the issue, oldest first.
    async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<IssueComment>, TrackerError>;
}

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    user: RawUser,
    #[serde(default)]
    labels: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    body: Option<String>,
}

/// Label names from whatever the tracker sent. Anything unreadable is skipped.
fn label_names(value: &serde_json::Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(name) => Some(name.clone()),
            serde_json::Value::Object(fields) => {
                fields.get("name").and_then(|n| n.as_str()).map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Self {
            number: raw.number,
            title: raw.title.unwrap_or_default(),
            body: raw.body.unwrap_or_default(),
            author: raw.user.login,
            labels: label_names(&raw.labels),
        }
    }
}

impl From<RawComment> for IssueComment {
    fn from(raw: RawComment) -> Self {
        Self {
            author: raw.user.map(|user| user.login).unwrap_or_default(),
            body: raw.body.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// [`IssueTracker`] over the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Client for `base_url` (normally [`crate::config::GITHUB_API_BASE`]).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(TRACKER_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TrackerError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticate requests to lift the anonymous rate limit.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn issue_url(&self, issue: &IssueRef) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}",
            self.base_url, issue.owner, issue.repo, issue.number
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TrackerError> {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TrackerError::Transport(format!("request timed out: {e}"))
            } else if e.is_connect() {
                TrackerError::Transport(format!("connection failed: {e}"))
            } else {
                TrackerError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, status = status.as_u16(), "tracker returned error status");
            return Err(TrackerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TrackerError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn fetch_issue(&self, issue: &IssueRef) -> Result<Issue, TrackerError> {
        let raw: RawIssue = self.get_json(&self.issue_url(issue)).await?;
        Ok(raw.into())
    }

    /// Fails with [`TrackerError::Truncated`] when the last allowed page is
    /// still full.
    async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<IssueComment>, TrackerError> {
        let mut comments = Vec::new();
        for page in 1..=MAX_COMMENT_PAGES {
            let url = format!(
                "{}/comments?per_page={}&page={}",
                self.issue_url(issue),
                COMMENTS_PER_PAGE,
                page
            );
            let batch: Vec<RawComment> = self.get_json(&url).await?;
            let last = batch.len() < COMMENTS_PER_PAGE;
            comments.extend(batch.into_iter().map(IssueComment::from));
            if last {
                return Ok(comments);
            }
        }

        tracing::warn!(
            issue = issue.number,
            pages = MAX_COMMENT_PAGES,
            "comment list did not fit in the page limit"
        );
        Err(TrackerError::Truncated {
            pages: MAX_COMMENT_PAGES,
            per_page: COMMENTS_PER_PAGE,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

type IssueKey = (String, String, u64);

fn key_of(issue: &IssueRef) -> IssueKey {
    (issue.owner.clone(), issue.repo.clone(), issue.number)
}

/// [`IssueTracker`] backed by maps, for tests and local development.
#[derive(Default)]
pub struct MemoryIssueTracker {
    issues: Mutex<HashMap<IssueKey, Issue>>,
    comments: Mutex<HashMap<IssueKey, Vec<IssueComment>>>,
    failure: Mutex<Option<TrackerError>>,
}

impl MemoryIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) an issue.
    pub fn put_issue(&self, issue: &IssueRef, author: &str, title: &str, body: &str, labels: &[&str]) {
        self.issues.lock().insert(
            key_of(issue),
            Issue {
                number: issue.number,
                title: title.to_string(),
                body: body.to_string(),
                author: author.to_string(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
            },
        );
    }

    /// Append a comment to an issue.
    pub fn add_comment(&self, issue: &IssueRef, author: &str, body: &str) {
        self.comments
            .lock()
            .entry(key_of(issue))
            .or_default()
            .push(IssueComment {
                author: author.to_string(),
                body: body.to_string(),
            });
    }

    /// Make every request fail with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<TrackerError>) {
        *self.failure.lock() = error;
    }

    fn check_failure(&self) -> Result<(), TrackerError> {
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IssueTracker for MemoryIssueTracker {
    async fn fetch_issue(&self, issue: &IssueRef) -> Result<Issue, TrackerError> {
        self.check_failure()?;
        self.issues
            .lock()
            .get(&key_of(issue))
            .cloned()
            .ok_or_else(|| TrackerError::Status {
                status: 404,
                url: issue.html_url(),
            })
    }

    async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<IssueComment>, TrackerError> {
        self.check_failure()?;
        if !self.issues.lock().contains_key(&key_of(issue)) {
            return Err(TrackerError::Status {
                status: 404,
                url: issue.html_url(),
            });
        }
        Ok(self
            .comments
            .lock()
            .get(&key_of(issue))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_issue(value: serde_json::Value) -> Issue {
        serde_json::from_value::<RawIssue>(value).unwrap().into()
    }

    #[test]
    fn decodes_github_issue_payload() {
        let issue = decode_issue(json!({
            "number": 42,
            "title": "SHRIMP Oracle Awakens",
            "body": null,
            "user": { "login": "nat", "id": 1 },
            "labels": [{ "id": 9, "name": "oracle-family" }, { "name": "intro" }],
            "state": "open"
        }));
        assert_eq!(issue.number, 42);
        assert_eq!(issue.author, "nat");
        assert_eq!(issue.body, "");
        assert!(issue.has_label("oracle-family"));
        assert!(!issue.has_label("Oracle-Family"));
    }

    #[test]
    fn unreadable_labels_mean_no_labels() {
        let issue = decode_issue(json!({
            "number": 1,
            "title": "x",
            "user": { "login": "nat" },
            "labels": "oracle-family"
        }));
        assert!(issue.labels.is_empty());

        let issue = decode_issue(json!({
            "number": 1,
            "title": "x",
            "user": { "login": "nat" },
            "labels": [17, null, "oracle-family"]
        }));
        assert_eq!(issue.labels, vec!["oracle-family".to_string()]);
    }

    #[test]
    fn comment_from_deleted_account_has_empty_author() {
        let raw: Vec<RawComment> = serde_json::from_value(json!([
            { "user": null, "body": "verify:00" },
            { "user": { "login": "nat" }, "body": "hi" }
        ]))
        .unwrap();
        let comments: Vec<IssueComment> = raw.into_iter().map(Into::into).collect();
        assert_eq!(comments[0].author, "");
        assert_eq!(comments[1].author, "nat");
    }

    #[test]
    fn status_errors_expose_upstream_code() {
        let err = TrackerError::Status {
            status: 404,
            url: "u".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(TrackerError::Transport("x".into()).upstream_status(), None);
    }

    #[test]
    fn client_trims_trailing_slash_and_ignores_blank_token() {
        let client = GitHubClient::new("http://localhost:9/")
            .unwrap()
            .with_token(Some("  ".into()));
        assert!(client.token.is_none());
        let issue = IssueRef::parse("https://github.com/o/r/issues/3").unwrap();
        assert_eq!(client.issue_url(&issue), "http://localhost:9/repos/o/r/issues/3");
    }

    #[tokio::test]
    async fn memory_tracker_serves_and_fails_on_demand() {
        let tracker = MemoryIssueTracker::new();
        let issue = IssueRef::parse("https://github.com/o/r/issues/3").unwrap();

        let missing = tracker.fetch_issue(&issue).await.unwrap_err();
        assert!(missing.is_not_found());

        tracker.put_issue(&issue, "nat", "t", "b", &["oracle-family"]);
        tracker.add_comment(&issue, "nat", "verify:abc");
        assert_eq!(tracker.fetch_issue(&issue).await.unwrap().author, "nat");
        assert_eq!(tracker.list_comments(&issue).await.unwrap().len(), 1);

        tracker.fail_with(Some(TrackerError::Transport("down".into())));
        assert!(tracker.list_comments(&issue).await.is_err());
        tracker.fail_with(None);
        assert!(tracker.fetch_issue(&issue).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_github_is_a_transport_error() {
        let client = GitHubClient::new("http://127.0.0.1:9").unwrap();
        let issue = IssueRef::parse("https://github.com/o/r/issues/3").unwrap();
        let err = client.fetch_issue(&issue).await.unwrap_err();
        assert!(matches!(err, TrackerError::Transport(_)));
    }

    /// Local GitHub stand-in: every page up to `full_pages` holds a full
    /// batch of filler comments, the page after it holds the author's proof.
    async fn serve_comment_pages(full_pages: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&request);
                    let page: usize = head
                        .split("&page=")
                        .nth(1)
                        .and_then(|rest| rest.split(|c: char| !c.is_ascii_digit()).next())
                        .and_then(|digits| digits.parse().ok())
                        .unwrap_or(1);

                    let body = if page <= full_pages {
                        let filler = json!({ "user": { "login": "someone" }, "body": "+1" });
                        serde_json::Value::Array(vec![filler; COMMENTS_PER_PAGE]).to_string()
                    } else {
                        json!([{ "user": { "login": "nat" }, "body": "verify:ab12cd34" }]).to_string()
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn comments_are_collected_across_pages() {
        let client = GitHubClient::new(serve_comment_pages(2).await).unwrap();
        let issue = IssueRef::parse("https://github.com/o/r/issues/3").unwrap();

        let comments = client.list_comments(&issue).await.unwrap();
        assert_eq!(comments.len(), 2 * COMMENTS_PER_PAGE + 1);
        let last = comments.last().unwrap();
        assert_eq!(last.author, "nat");
        assert_eq!(last.body, "verify:ab12cd34");
    }

    #[tokio::test]
    async fn comments_beyond_page_limit_are_an_error() {
        let client = GitHubClient::new(serve_comment_pages(MAX_COMMENT_PAGES).await).unwrap();
        let issue = IssueRef::parse("https://github.com/o/r/issues/3").unwrap();

        let err = client.list_comments(&issue).await.unwrap_err();
        assert_eq!(
            err,
            TrackerError::Truncated {
                pages: MAX_COMMENT_PAGES,
                per_page: COMMENTS_PER_PAGE,
            }
        );
    }
}
