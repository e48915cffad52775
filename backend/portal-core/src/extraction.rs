//! Ordered pattern extraction of the anti-forgery token.
//!
//! Rules are applied in configuration order and the first rule that matches
//! wins, even if a later rule would also match. No HTML parsing happens here;
//! the patterns tolerate quoting and attribute-order drift instead.

use crate::config::{TokenRule, compile_pattern};
use crate::error::ConfigError;

use regex::{Captures, Regex};

const TOKEN_CAPTURE: &str = "token";

/// Token found in a challenge body, with the rule that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedToken {
    pub value: String,
    pub rule: String,
}

#[derive(Debug)]
struct CompiledRule {
    name: String,
    regex: Regex,
}

/// Compiled, ordered token rules.
#[derive(Debug)]
pub struct TokenExtractor {
    rules: Vec<CompiledRule>,
}

impl TokenExtractor {
    /// Compile the rules once, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any pattern fails to compile.
    pub fn new(rules: &[TokenRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    regex: compile_pattern(&rule.pattern, &format!("token rule '{}'", rule.name))?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Return the capture of the first rule that matches `body`.
    pub fn extract(&self, body: &str) -> Option<ExtractedToken> {
        first_capture(self.rules.iter().map(|r| &r.regex), body).map(|(index, value)| {
            ExtractedToken {
                value,
                rule: self.rules[index].name.clone(),
            }
        })
    }
}

/// First non-empty capture across `patterns`, tried in order.
///
/// Returns the index of the winning pattern and the trimmed capture. A named
/// group `token` takes precedence over group 1.
pub(crate) fn first_capture<'a>(
    patterns: impl IntoIterator<Item = &'a Regex>,
    text: &str,
) -> Option<(usize, String)> {
    patterns
        .into_iter()
        .enumerate()
        .find_map(|(index, regex)| {
            regex
                .captures(text)
                .and_then(|caps| capture_value(&caps))
                .map(|value| (index, value))
        })
}

fn capture_value(caps: &Captures<'_>) -> Option<String> {
    caps.name(TOKEN_CAPTURE)
        .or_else(|| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
