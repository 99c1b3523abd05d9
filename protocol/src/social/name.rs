//! Display-name extraction from announcement issues.

use regex::Regex;

/// Ordered list of name patterns. Each pattern is tried against the title
/// and then the body before the next pattern is considered; the first
/// capture wins.
pub struct NameExtractor {
    patterns: Vec<Regex>,
}

impl NameExtractor {
    /// The announcement conventions, most specific first.
    pub fn new() -> Self {
        Self {
            patterns: vec![
                // "SHRIMP Oracle Awakens"
                Regex::new(r"(?i)([A-Za-z0-9_-]+)\s+[Oo]racle\s+[Aa]wakens").unwrap(),
                // "**Name**: SHRIMP"
                Regex::new(r"(?i)\*\*name\*\*[:\s]+([A-Za-z0-9_-]+)").unwrap(),
                // "name: SHRIMP", "Name \"SHRIMP\""
                Regex::new(r#"(?i)name[:\s]+["']?([A-Za-z0-9_-]+)"#).unwrap(),
            ],
        }
    }

    /// Extractor over caller-supplied patterns. Each must have one capture group.
    pub fn with_patterns(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// First non-empty capture across `(pattern, [title, body])`.
    pub fn extract(&self, title: &str, body: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            [title, body].into_iter().find_map(|text| {
                pattern
                    .captures(text)
                    .and_then(|captures| captures.get(1))
                    .map(|m| m.as_str())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            })
        })
    }
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::new()
    }
}
