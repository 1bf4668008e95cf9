// Wildcard matching of node identifiers

use super::Identifier;
use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};

/// Anchored identifier pattern: `*` matches any run of characters, `?` exactly one
#[derive(Debug, Clone)]
pub struct IdPattern {
    pattern: Pattern,
}

impl IdPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| Error::invalid(format!("bad identifier pattern '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, text: &str, case_insensitive: bool) -> bool {
        let options = MatchOptions {
            case_sensitive: !case_insensitive,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.pattern.matches_with(text, options)
    }

    pub fn matches_id<I: Identifier>(&self, identifier: &I) -> bool {
        self.matches(&identifier.to_string(), identifier.case_insensitive())
    }
}
