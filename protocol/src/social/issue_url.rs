//! Issue URL parsing.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::AuthError;

/// `github.com/<owner>/<repo>/issues/<number>`, anywhere in the input.
fn issue_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"github\.com/([^/]+)/([^/]+)/issues/(\d+)").expect("static issue pattern")
    })
}

/// A reference to one issue on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    /// Parses a browser URL such as
    /// `https://github.com/Soul-Brews-Studio/oracle-v2/issues/42`.
    pub fn parse(url: &str) -> Result<Self, AuthError> {
        let captures = issue_pattern()
            .captures(url.trim())
            .ok_or(AuthError::InvalidIssueUrl)?;
        let number = captures[3]
            .parse::<u64>()
            .map_err(|_| AuthError::InvalidIssueUrl)?;
        Ok(Self {
            owner: captures[1].to_string(),
            repo: captures[2].to_string(),
            number,
        })
    }

    /// Key used for the pending challenge of this issue.
    pub fn subject_key(&self) -> String {
        self.number.to_string()
    }

    /// Canonical browser URL.
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}/issues/{}", self.owner, self.repo, self.number)
    }

    /// Reference stored on the identity record (`oracle-v2/issues/42`).
    pub fn record_path(&self) -> String {
        format!("{}/issues/{}", self.repo, self.number)
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
