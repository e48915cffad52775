// Unit tests for ordered token extraction.
// The default rules live in config::presets; these tests pin their behaviour.

use crate::config::{TokenConfig, TokenRule};
use crate::extraction::TokenExtractor;

fn default_extractor() -> TokenExtractor {
    TokenExtractor::new(&TokenConfig::default().rules).unwrap()
}

#[test]
fn given_hidden_csrf_input_when_extracted_then_returns_value() {
    // GIVEN: The classic login form
    let body = r#"<form method="post"><input type="hidden" name="csrf_token" value="abc123"></form>"#;

    // WHEN: Extracting with the default rules
    let token = default_extractor().extract(body).unwrap();

    // THEN: The hidden input value is the token
    assert_eq!(token.value, "abc123");
    assert_eq!(token.rule, "csrf_token_input");
}

/// **VALUE**: Pins first-match-wins ordering.
///
/// **WHY THIS MATTERS**: Pages often carry more than one token-looking value (a form input
/// and a JS config object). The form input is the one the portal checks on submit.
///
/// **BUG THIS CATCHES**: Would catch a refactor that picks the longest or last match, or
/// that sorts rules, instead of honouring configuration order.
#[test]
fn given_body_matching_two_rules_when_extracted_then_first_rule_wins() {
    // GIVEN: A form input AND a JSON-style key with different tokens
    let body = r#"
        <input name="csrf_token" value="first-token">
        <script>var cfg = {"csrf": "second-token"};</script>
    "#;

    // WHEN: Extracting
    let token = default_extractor().extract(body).unwrap();

    // THEN: The earlier rule's capture is returned
    assert_eq!(token.value, "first-token");
    assert_eq!(token.rule, "csrf_token_input");
}

#[test]
fn given_reordered_rules_when_extracted_then_order_follows_configuration() {
    // GIVEN: The same body, but the JSON rule configured first
    let body = r#"<input name="csrf_token" value="first-token"> {"csrf": "second-token"}"#;
    let rules = vec![
        TokenRule::new("json", r#""csrf"\s*:\s*"([^"]+)""#),
        TokenRule::new("input", r#"name="csrf_token" value="([^"]+)""#),
    ];
    let extractor = TokenExtractor::new(&rules).unwrap();

    // WHEN: Extracting
    let token = extractor.extract(body).unwrap();

    // THEN: The JSON value wins because its rule comes first
    assert_eq!(token.value, "second-token");
    assert_eq!(token.rule, "json");
}

#[test]
fn given_value_before_name_when_extracted_then_still_found() {
    let body = r#"<input value='xyz789' type='hidden' name='csrf_token'/>"#;

    let token = default_extractor().extract(body).unwrap();

    assert_eq!(token.value, "xyz789");
    assert_eq!(token.rule, "csrf_token_input_value_first");
}

#[test]
fn given_magic_input_when_extracted_then_returns_magic_value() {
    let body = r#"<input type="hidden" name="4Tredir" value="http://example.com/"><input type="hidden" name="magic" value="0a1b2c3d4e5f">"#;

    let token = default_extractor().extract(body).unwrap();

    assert_eq!(token.value, "0a1b2c3d4e5f");
    assert_eq!(token.rule, "magic_input");
}

#[test]
fn given_fgtauth_redirect_script_when_extracted_then_returns_query_token() {
    let body = r#"<html><script>window.location="https://10.0.0.1:1003/fgtauth?05060a0b0c0d";</script></html>"#;

    let token = default_extractor().extract(body).unwrap();

    assert_eq!(token.value, "05060a0b0c0d");
}

#[test]
fn given_json_key_only_when_extracted_then_returns_json_value() {
    let body = r#"{"status": "ok", "_token": "Lrv-99"}"#;

    let token = default_extractor().extract(body).unwrap();

    assert_eq!(token.value, "Lrv-99");
    assert_eq!(token.rule, "json_key");
}

#[test]
fn given_bare_csrf_assignment_when_extracted_then_returns_value() {
    let body = "<script>csrf = 'k3y'; init();</script>";

    let token = default_extractor().extract(body).unwrap();

    assert_eq!(token.value, "k3y");
    assert_eq!(token.rule, "bare_csrf");
}

#[test]
fn given_named_token_group_when_extracted_then_named_group_preferred() {
    let rules = vec![TokenRule::new(
        "named",
        r#"(sid)=(?P<token>[a-z0-9]+)"#,
    )];
    let extractor = TokenExtractor::new(&rules).unwrap();

    let token = extractor.extract("redirect?sid=deadbeef").unwrap();

    assert_eq!(token.value, "deadbeef");
}

/// **VALUE**: A page without any token must produce `None`, never a garbage slice.
///
/// **BUG THIS CATCHES**: Would catch index-arithmetic extraction that slices the page
/// after a marker that is not there, submitting nonsense as the token.
#[test]
fn given_body_without_token_when_extracted_then_returns_none() {
    let body = "<html><body><h1>Welcome to the network</h1></body></html>";

    assert!(default_extractor().extract(body).is_none());
}

#[test]
fn given_invalid_pattern_when_compiled_then_returns_config_error() {
    let rules = vec![TokenRule::new("broken", "name=(unclosed")];

    let result = TokenExtractor::new(&rules);

    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(message.contains("Config Validation Error"));
    assert!(message.contains("broken"));
}
