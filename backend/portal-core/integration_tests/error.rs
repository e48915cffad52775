use portal_core::error::{AuthError, AuthFailureKind, ConfigError, TransportError};
use portal_core::{PortalConfig, PortalTransport};

use common::HttpStatusCode;

/// **VALUE**: Auth errors carry the file/line where they were raised.
///
/// **WHY THIS MATTERS**: The same failure kind can come from several steps (a network error
/// on the page fetch vs the submit). The location in the full error says which.
///
/// **BUG THIS CATCHES**: Would catch a constructor losing `#[track_caller]`, which would
/// make every location point inside `auth.rs`.
#[test]
fn given_token_not_found_error_when_formatted_then_includes_caller_location() {
    let err = AuthError::token_not_found(8);

    let text = err.to_string();

    assert!(text.contains("Token Not Found Error"));
    assert!(text.contains("none of 8 extraction rules matched"));
    assert!(text.contains("error.rs"));
}

#[test]
fn given_rejected_error_when_inspected_then_kind_status_and_message_agree() {
    let err = AuthError::rejected(HttpStatusCode(403), "Unauthorized");

    assert_eq!(err.kind(), AuthFailureKind::AuthenticationRejected);
    assert_eq!(err.status(), Some(HttpStatusCode(403)));
    assert_eq!(err.user_message(), "Unauthorized");
    assert!(err.to_string().contains("HTTP 403"));
}

#[test]
fn given_empty_response_error_when_user_message_taken_then_no_url_or_location() {
    let err = AuthError::empty_response("http://172.18.10.10:8090/login");

    let message = err.user_message();

    assert_eq!(message, "The login portal returned an empty page");
    assert!(!message.contains("172.18.10.10"));
    assert!(err.to_string().contains("172.18.10.10"));
}

#[test]
fn given_unexpected_response_error_when_inspected_then_status_kept() {
    let err = AuthError::unexpected_response(HttpStatusCode::OK, "Login failed");

    assert_eq!(err.kind(), AuthFailureKind::UnexpectedResponse);
    assert_eq!(err.status(), Some(HttpStatusCode::OK));
    assert_eq!(err.user_message(), "Login failed");
}

#[test]
fn given_failure_kinds_when_displayed_then_snake_case_names() {
    assert_eq!(AuthFailureKind::Network.to_string(), "network");
    assert_eq!(AuthFailureKind::TokenNotFound.to_string(), "token_not_found");
    assert_eq!(AuthFailureKind::AuthenticationRejected.to_string(), "rejected");
}

#[test]
fn given_unparseable_base_url_when_transport_built_then_url_parse_error() {
    let mut config = PortalConfig::default();
    config.endpoint.base_url = "not a url".to_string();

    let err = match PortalTransport::from_config(&config) {
        Ok(_) => panic!("expected an error"),
        Err(err) => err,
    };

    assert!(matches!(err, TransportError::UrlParse { .. }));
}

#[test]
fn given_validation_failure_when_formatted_then_prefixed_and_located() {
    let mut config = PortalConfig::default();
    config.fields.password = " ".to_string();

    let err = config.validate().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError { .. }));
    let text = err.to_string();
    assert!(text.starts_with("Config Validation Error: fields.password cannot be empty"));
}
