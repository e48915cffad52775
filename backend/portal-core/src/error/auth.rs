//! Error types for a single login attempt.
//!
//! - Every variant carries an `ErrorLocation` captured with `#[track_caller]`
//! - Timeouts are classified from the reqwest error, not from message text
//! - None of these escape `PortalAuthenticator::authenticate`; they are folded
//!   into an `AuthAttemptResult`

use common::{ErrorLocation, HttpStatusCode};

use std::fmt;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AuthError {
    #[error("Network Error: {message} {location}")]
    Network {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Empty Response Error: {url} returned no content {location}")]
    EmptyResponse { url: String, location: ErrorLocation },

    #[error("Token Not Found Error: none of {rules_tried} extraction rules matched {location}")]
    TokenNotFound {
        rules_tried: usize,
        location: ErrorLocation,
    },

    #[error("Authentication Rejected: HTTP {status} - {message} {location}")]
    Rejected {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Unexpected Response: HTTP {status} matched no success or failure indicator - {message} {location}")]
    UnexpectedResponse {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },
}

/// Failure category reported in `AuthAttemptResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    Network,
    Timeout,
    EmptyResponse,
    TokenNotFound,
    AuthenticationRejected,
    UnexpectedResponse,
}

impl fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::TokenNotFound => "token_not_found",
            Self::AuthenticationRejected => "rejected",
            Self::UnexpectedResponse => "unexpected_response",
        };
        write!(f, "{name}")
    }
}

impl AuthError {
    #[track_caller]
    pub fn empty_response(url: impl Into<String>) -> Self {
        AuthError::EmptyResponse {
            url: url.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn token_not_found(rules_tried: usize) -> Self {
        AuthError::TokenNotFound {
            rules_tried,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn rejected(status: HttpStatusCode, message: impl Into<String>) -> Self {
        AuthError::Rejected {
            status,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unexpected_response(status: HttpStatusCode, message: impl Into<String>) -> Self {
        AuthError::UnexpectedResponse {
            status,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn kind(&self) -> AuthFailureKind {
        match self {
            AuthError::Network { .. } => AuthFailureKind::Network,
            AuthError::Timeout { .. } => AuthFailureKind::Timeout,
            AuthError::EmptyResponse { .. } => AuthFailureKind::EmptyResponse,
            AuthError::TokenNotFound { .. } => AuthFailureKind::TokenNotFound,
            AuthError::Rejected { .. } => AuthFailureKind::AuthenticationRejected,
            AuthError::UnexpectedResponse { .. } => AuthFailureKind::UnexpectedResponse,
        }
    }

    /// Short human-readable message, safe for the primary status surface.
    ///
    /// Contains no body snippets, token values or locations.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network { .. } => "Could not reach the login portal".to_string(),
            AuthError::Timeout { .. } => "The login portal did not respond in time".to_string(),
            AuthError::EmptyResponse { .. } => "The login portal returned an empty page".to_string(),
            AuthError::TokenNotFound { .. } => {
                "Login page format not recognized (no token found)".to_string()
            }
            AuthError::Rejected { message, .. } | AuthError::UnexpectedResponse { message, .. } => {
                message.clone()
            }
        }
    }

    pub fn status(&self) -> Option<HttpStatusCode> {
        match self {
            AuthError::Rejected { status, .. } | AuthError::UnexpectedResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        let location = ErrorLocation::from(Location::caller());

        // Check the category BEFORE converting to string
        if error.is_timeout() {
            return AuthError::Timeout {
                message: error.to_string(),
                location,
            };
        }

        AuthError::Network {
            message: error.to_string(),
            location,
        }
    }
}

impl From<url::ParseError> for AuthError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        AuthError::Network {
            message: format!("Invalid portal URL: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
