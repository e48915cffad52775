//! Heuristic classification of the submit response.
//!
//! Portals answer good and bad logins alike with HTTP 200, so the verdict
//! comes from substrings in the page. The order is fixed:
//!
//! 1. status other than 200 is a rejection
//! 2. any negative indicator is a rejection, even when a positive one is present
//! 3. any positive indicator is a success
//! 4. otherwise the response is unexpected (or a success when the deployment
//!    sets `accept_without_indicators`)
//!
//! This is approximate by nature. A portal that reworded its pages can flip
//! the verdict.

use crate::config::{ClassificationConfig, IndicatorMessage, compile_pattern};
use crate::error::ConfigError;
use crate::extraction::first_capture;

use common::HttpStatusCode;

use regex::Regex;

/// Longest error message taken verbatim from the page.
const MAX_ERROR_MESSAGE_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// `indicator` is `None` when accepted only because no negative matched.
    Accepted { indicator: Option<String> },
    Rejected {
        message: String,
        indicator: Option<String>,
    },
    Unexpected { message: String },
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Accepted { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Classification::Accepted { .. } => None,
            Classification::Rejected { message, .. } | Classification::Unexpected { message } => {
                Some(message)
            }
        }
    }
}

#[derive(Debug)]
pub struct Classifier {
    positive: Vec<String>,
    negative: Vec<String>,
    error_patterns: Vec<Regex>,
    fallbacks: Vec<IndicatorMessage>,
    default_message: String,
    accept_without_indicators: bool,
}

impl Classifier {
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an error pattern fails to compile.
    pub fn new(config: &ClassificationConfig) -> Result<Self, ConfigError> {
        let error_patterns = config
            .error_patterns
            .iter()
            .map(|pattern| compile_pattern(pattern, "error pattern"))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            positive: lowercase_all(&config.positive_indicators),
            negative: lowercase_all(&config.negative_indicators),
            error_patterns,
            fallbacks: config
                .error_fallbacks
                .iter()
                .map(|f| IndicatorMessage::new(f.indicator.to_lowercase(), f.message.clone()))
                .collect(),
            default_message: config.default_error_message.clone(),
            accept_without_indicators: config.accept_without_indicators,
        })
    }

    /// Classify a submit response. Pure: same input, same output.
    pub fn check_authentication_success(&self, status: HttpStatusCode, body: &str) -> Classification {
        if !status.is_ok() {
            let message = self
                .match_error_message(body)
                .unwrap_or_else(|| format!("{} (HTTP {status})", self.default_message));
            return Classification::Rejected {
                message,
                indicator: None,
            };
        }

        let lower = body.to_lowercase();

        if let Some(negative) = find_indicator(&self.negative, &lower) {
            return Classification::Rejected {
                message: self.extract_error_message(body),
                indicator: Some(negative.to_string()),
            };
        }

        if let Some(positive) = find_indicator(&self.positive, &lower) {
            return Classification::Accepted {
                indicator: Some(positive.to_string()),
            };
        }

        if self.accept_without_indicators {
            return Classification::Accepted { indicator: None };
        }

        Classification::Unexpected {
            message: self.extract_error_message(body),
        }
    }

    /// Human-readable failure reason: HTML error containers first, then
    /// substring fallbacks, then the configured default.
    pub fn extract_error_message(&self, body: &str) -> String {
        self.match_error_message(body)
            .unwrap_or_else(|| self.default_message.clone())
    }

    fn match_error_message(&self, body: &str) -> Option<String> {
        if let Some((_, raw)) = first_capture(&self.error_patterns, body) {
            let message = collapse_whitespace(&raw);
            if !message.is_empty() {
                return Some(message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect());
            }
        }

        let lower = body.to_lowercase();
        self.fallbacks
            .iter()
            .find(|f| !f.indicator.is_empty() && lower.contains(&f.indicator))
            .map(|f| f.message.clone())
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn find_indicator<'a>(indicators: &'a [String], lower_body: &str) -> Option<&'a str> {
    indicators
        .iter()
        .find(|indicator| lower_body.contains(indicator.as_str()))
        .map(String::as_str)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
