use crate::RedactedSecret;

/// **VALUE**: Verifies that a password never shows up in `{:?}` or `{}` output.
///
/// **WHY THIS MATTERS**: Credentials travel through structs that get logged with `{:?}`.
/// A leaked password in an exported log file is a real incident.
///
/// **BUG THIS CATCHES**: Would catch a `#[derive(Debug)]` replacing the manual impl.
#[test]
fn given_secret_when_formatted_then_value_is_hidden() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("hunter2-campus");

    // WHEN: Formatting both ways
    let debug = format!("{secret:?}");
    let display = format!("{secret}");

    // THEN: Neither contains the value
    assert!(!debug.contains("hunter2"));
    assert!(!display.contains("hunter2"));
    assert_eq!(secret.expose(), "hunter2-campus");
    assert_eq!(secret.len(), 14);
}

/// **VALUE**: Serialization must fail instead of writing the secret out.
#[test]
fn given_secret_when_serialized_then_returns_error() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("p@ss");

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&secret);

    // THEN: Should refuse
    assert!(result.is_err(), "RedactedSecret must not serialize");
    let message = result.unwrap_err().to_string();
    assert!(message.contains("Redaction Error: RedactedSecret refuses serialization"));
    assert!(!message.contains("p@ss"));
}

#[test]
fn given_empty_secret_when_checked_then_is_empty() {
    assert!(RedactedSecret::new("").is_empty());
}
