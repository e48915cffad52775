use portal_core::config::{CONFIG_FILE_NAME, TokenRule};
use portal_core::{DEFAULT_GATEWAY_BASE_URL, PortalConfig};

use std::fs;

use tempfile::TempDir;

#[test]
fn given_default_config_when_validated_then_ok_and_points_at_gateway() {
    let config = PortalConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.endpoint.base_url, DEFAULT_GATEWAY_BASE_URL);
    assert_eq!(config.endpoint.challenge_path, "/login");
    assert_eq!(config.fields.token, "csrf_token");
    assert_eq!(config.keep_alive.interval_secs, 300);
    assert_eq!(config.keep_alive.session_timeout_secs, 1800);
    assert!(config.transport.accept_invalid_certs);
}

#[test]
fn given_magic_token_preset_when_built_then_redirect_field_targets_login_page() {
    let config = PortalConfig::magic_token("https://10.0.0.1:1003/");

    assert!(config.validate().is_ok());
    assert_eq!(config.fields.token, "magic");
    assert_eq!(config.endpoint.submit_path, "/");
    assert_eq!(
        config.endpoint.extra_fields.get("4Tredir").map(String::as_str),
        Some("https://10.0.0.1:1003/login?")
    );
}

#[test]
fn given_missing_file_when_loaded_then_defaults_returned() {
    let dir = TempDir::new().unwrap();

    let config = PortalConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();

    assert_eq!(config, PortalConfig::default());
}

/// **VALUE**: What `save` writes, `load` reads back unchanged.
///
/// **BUG THIS CATCHES**: Would catch a field missing `#[serde(default)]` handling or a
/// serializer that reorders the token rules (order is semantic for extraction).
#[test]
fn given_customised_config_when_saved_and_loaded_then_identical() {
    // GIVEN: A config with custom rules in a nested, not yet existing directory
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
    let mut config = PortalConfig::magic_token("http://192.168.1.1:8090");
    config.token.rules.insert(0, TokenRule::new("custom", r"sid=([a-f0-9]+)"));
    config.classification.accept_without_indicators = true;

    // WHEN
    config.save(&path).unwrap();
    let loaded = PortalConfig::load(&path).unwrap();

    // THEN
    assert_eq!(loaded, config);
    assert_eq!(loaded.token.rules[0].name, "custom");
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
fn given_partial_file_when_loaded_then_missing_sections_use_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        r#"
[endpoint]
base_url = "http://10.1.1.1:8090"

[keep_alive]
interval_secs = 120
"#,
    )
    .unwrap();

    let config = PortalConfig::load(&path).unwrap();

    assert_eq!(config.endpoint.base_url, "http://10.1.1.1:8090");
    assert_eq!(config.endpoint.submit_path, "/login");
    assert_eq!(config.keep_alive.interval_secs, 120);
    assert_eq!(config.keep_alive.session_timeout_secs, 1800);
    assert!(!config.token.rules.is_empty());
}

#[test]
fn given_malformed_toml_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "[endpoint\nbase_url = ").unwrap();

    let err = PortalConfig::load(&path).unwrap_err();

    assert!(err.to_string().contains("Config Parse Error"));
}

#[test]
fn given_invalid_values_in_file_when_loaded_then_validation_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "[endpoint]\nbase_url = \"ftp://gateway\"\n").unwrap();

    let err = PortalConfig::load(&path).unwrap_err();

    assert!(err.to_string().contains("http or https"));
}

#[test]
fn given_session_timeout_not_above_interval_when_validated_then_rejected() {
    let mut config = PortalConfig::default();
    config.keep_alive.interval_secs = 600;
    config.keep_alive.session_timeout_secs = 600;

    let err = config.validate().unwrap_err();

    assert!(err.to_string().contains("must exceed interval_secs"));
}

#[test]
fn given_path_without_leading_slash_when_validated_then_rejected() {
    let mut config = PortalConfig::default();
    config.endpoint.submit_path = "login".to_string();

    let err = config.validate().unwrap_err();

    assert!(err.to_string().contains("submit_path must start with '/'"));
}

#[test]
fn given_token_rule_without_capture_group_when_validated_then_rejected() {
    let mut config = PortalConfig::default();
    config.token.rules = vec![TokenRule::new("flat", "csrf_token")];

    let err = config.validate().unwrap_err();

    assert!(err.to_string().contains("token rule 'flat' has no capture group"));
}

#[test]
fn given_bad_error_pattern_when_validated_then_rejected() {
    let mut config = PortalConfig::default();
    config.classification.error_patterns.push("<div(".to_string());

    assert!(config.validate().is_err());
}

#[test]
fn given_invalid_config_when_saved_then_nothing_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let mut config = PortalConfig::default();
    config.transport.request_timeout_secs = 0;

    assert!(config.save(&path).is_err());
    assert!(!path.exists());
}
