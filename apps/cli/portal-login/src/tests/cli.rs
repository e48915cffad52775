use crate::cli::{APP_DIR_NAME, Args, Preset, default_config_path, default_log_dir};
use crate::error::PortalLoginError;

use portal_core::DEFAULT_GATEWAY_BASE_URL;
use portal_core::config::CONFIG_FILE_NAME;

use std::path::PathBuf;

use clap::Parser;

fn parse(extra: &[&str]) -> Args {
    let mut argv = vec!["portal-login"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn given_flags_when_parsed_then_credentials_built_and_password_hidden() {
    // GIVEN
    let args = parse(&["--username", " alice ", "--password", "s3cret-pass"]);

    // WHEN
    let credentials = args.credentials().unwrap();

    // THEN
    assert_eq!(credentials.username, "alice");
    assert_eq!(credentials.password.expose(), "s3cret-pass");
    let debug = format!("{args:?}");
    assert!(!debug.contains("s3cret-pass"));
}

#[test]
fn given_blank_username_when_credentials_requested_then_missing_credentials_error() {
    let args = parse(&["--username", "   ", "--password", "x"]);

    let err = args.credentials().unwrap_err();

    assert!(matches!(err, PortalLoginError::MissingCredentials { .. }));
    assert!(err.to_string().contains("username"));
}

#[test]
fn given_explicit_paths_when_parsed_then_used_instead_of_platform_defaults() {
    let args = parse(&["--config", "/tmp/p.toml", "--log-dir", "/tmp/logs"]);

    assert_eq!(args.config_path(), PathBuf::from("/tmp/p.toml"));
    assert_eq!(args.log_dir(), PathBuf::from("/tmp/logs"));
}

#[test]
fn given_platform_defaults_when_resolved_then_scoped_to_app_directory() {
    let config_path = default_config_path();
    let log_dir = default_log_dir();

    assert!(config_path.ends_with(CONFIG_FILE_NAME));
    assert!(log_dir.to_string_lossy().contains(APP_DIR_NAME));
}

#[test]
fn given_magic_token_preset_flag_when_built_then_magic_config_returned() {
    let args = parse(&["--preset", "magic-token", "--base-url", "http://10.0.0.1:1000"]);

    let config = args.preset.build(args.preset_base_url());

    assert_eq!(args.preset, Preset::MagicToken);
    assert_eq!(config.fields.token, "magic");
    assert_eq!(config.endpoint.base_url, "http://10.0.0.1:1000");
}

#[test]
fn given_no_base_url_when_preset_built_then_default_gateway_used() {
    let args = Args {
        base_url: None,
        ..parse(&[])
    };

    assert_eq!(args.preset_base_url(), DEFAULT_GATEWAY_BASE_URL);
    assert_eq!(args.preset, Preset::CsrfForm);
}
