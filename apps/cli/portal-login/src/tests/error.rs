// Unit tests for error module

use crate::error::PortalLoginError;

use common::ErrorLocation;

use portal_core::PortalConfig;

use std::panic::Location;

/// **VALUE**: Every variant prints its kind, message and the place it was raised.
///
/// **WHY THIS MATTERS**: `main` prints the error and exits; that line is all the user
/// (or whoever reads the log file) gets.
///
/// **BUG THIS CATCHES**: Would catch a variant whose `#[error]` format drops the message or
/// the location.
#[test]
fn given_missing_credentials_error_when_displayed_then_kind_message_and_location_shown() {
    // GIVEN
    let err = PortalLoginError::MissingCredentials {
        message: String::from("No username supplied"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN
    let text = err.to_string();

    // THEN
    assert!(text.starts_with("Credentials Error: No username supplied ["));
    assert!(text.contains("error.rs:"));
}

#[test]
fn given_config_error_when_converted_then_message_preserved_and_location_is_caller() {
    let mut config = PortalConfig::default();
    config.keep_alive.interval_secs = 0;
    let config_err = config.validate().unwrap_err();

    let err = PortalLoginError::from(config_err);

    let text = err.to_string();
    assert!(text.starts_with("Config Error: Config Validation Error"));
    assert!(text.contains("keep_alive.interval_secs"));
    assert!(text.contains("error.rs"));
}
