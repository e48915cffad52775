use common::ErrorLocation;

use portal_core::error::{ConfigError, TransportError};

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the command line front end.
///
/// A failed login is NOT an error here; it is a normal outcome reported
/// through the exit code. These cover everything that prevents an attempt
/// from being made at all.
#[derive(Debug, Error)]
pub enum PortalLoginError {
    /// Error from this App (filesystem, logger setup)
    #[error("Portal Login Error: {message} {location}")]
    PortalLogin {
        message: String,
        location: ErrorLocation,
    },

    /// Portal config could not be loaded, validated or saved
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// HTTP client or portal URL could not be set up
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    /// Username or password not supplied by flag, environment or `.env`
    #[error("Credentials Error: {message} {location}")]
    MissingCredentials {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for PortalLoginError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        PortalLoginError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for PortalLoginError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        PortalLoginError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
