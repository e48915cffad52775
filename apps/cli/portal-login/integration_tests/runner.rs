use portal_login::cli::Args;
use portal_login::error::PortalLoginError;
use portal_login::runner::{
    EXIT_LOGIN_FAILED, Runner, SessionEnd, resolve_config, run_until,
};

use portal_core::config::CONFIG_FILE_NAME;
use portal_core::{BufferedLogSink, Credentials, PortalConfig};

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r#"<form><input type="hidden" name="csrf_token" value="tok-1"></form>"#;

async fn portal(submit_body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(submit_body))
        .mount(&server)
        .await;
    server
}

fn args_for(server: &MockServer, dir: &TempDir, extra: &[&str]) -> Args {
    let config = dir.path().join(CONFIG_FILE_NAME);
    let logs = dir.path().join("logs");
    let base_url = server.uri();
    let mut argv = vec![
        "portal-login".to_string(),
        "--config".to_string(),
        config.to_string_lossy().into_owned(),
        "--log-dir".to_string(),
        logs.to_string_lossy().into_owned(),
        "--base-url".to_string(),
        base_url,
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Args::try_parse_from(argv).unwrap()
}

/// **VALUE**: The whole command succeeds against a portal that accepts the login.
///
/// **WHY THIS MATTERS**: This is the path a user hits every morning. It wires config,
/// logger, transport, authenticator and exit code together.
///
/// **BUG THIS CATCHES**: Would catch the CLI building the authenticator from a config that
/// ignores `--base-url`, or mapping success to a non-zero exit code.
#[tokio::test]
async fn given_accepting_portal_when_run_without_keep_alive_then_exits_successfully() {
    // GIVEN
    let server = portal("Login successful").await;
    let dir = TempDir::new().unwrap();
    let args = args_for(
        &server,
        &dir,
        &["--username", "alice", "--password", "pw", "--no-keep-alive"],
    );

    // WHEN
    let code = run_until(args, Ok(None), async {}).await.unwrap();

    // THEN
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(dir.path().join("logs").exists());
}

#[tokio::test]
async fn given_rejecting_portal_when_run_then_exits_with_login_failed_code() {
    let server = portal("Invalid credentials").await;
    let dir = TempDir::new().unwrap();
    let args = args_for(&server, &dir, &["--username", "alice", "--password", "pw"]);

    let code = run_until(args, Ok(None), async {}).await.unwrap();

    assert_eq!(code, ExitCode::from(EXIT_LOGIN_FAILED));
}

#[tokio::test]
async fn given_no_credentials_when_run_then_missing_credentials_error() {
    let server = portal("welcome").await;
    let dir = TempDir::new().unwrap();
    let mut args = args_for(&server, &dir, &[]);
    args.username = None;
    args.password = None;

    let err = run_until(args, Ok(None), async {}).await.unwrap_err();

    assert!(matches!(err, PortalLoginError::MissingCredentials { .. }));
}

#[tokio::test]
async fn given_accepted_login_when_shutdown_signalled_then_session_held_until_signal() {
    let server = portal("welcome").await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let args = args_for(&server, &dir, &["--username", "alice", "--password", "pw"]);

    let code = run_until(args, Ok(None), tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap();

    assert_eq!(code, ExitCode::SUCCESS);
}

#[tokio::test]
async fn given_write_config_when_run_then_file_written_and_loadable() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let args = args_for(&server, &dir, &["--preset", "magic-token", "--write-config"]);

    let code = run_until(args, Ok(None), async {}).await.unwrap();

    assert_eq!(code, ExitCode::SUCCESS);
    let written = PortalConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(written.fields.token, "magic");
    assert_eq!(written.endpoint.base_url, server.uri());
}

#[tokio::test]
async fn given_existing_config_when_resolved_then_file_wins_over_preset_but_base_url_overrides() {
    // GIVEN: A saved magic-token config pointing elsewhere
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    PortalConfig::magic_token("http://10.9.9.9:1003").save(&path).unwrap();
    let args = args_for(&server, &dir, &["--preset", "csrf-form"]);

    // WHEN
    let config = resolve_config(&args, &path).unwrap();

    // THEN
    assert_eq!(config.fields.token, "magic");
    assert_eq!(config.endpoint.base_url, server.uri());
}

#[tokio::test]
async fn given_invalid_config_file_when_resolved_then_config_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[keep_alive]\ninterval_secs = 0\n").unwrap();
    let args = args_for(&server, &dir, &[]);

    let err = resolve_config(&args, &path).unwrap_err();

    assert!(matches!(err, PortalLoginError::Config { .. }));
}

/// **VALUE**: A held session ends on its own when the gateway stops answering.
///
/// **WHY THIS MATTERS**: Without this the command sits forever printing nothing while the
/// user is actually offline.
///
/// **BUG THIS CATCHES**: Would catch `hold_session` only watching the shutdown signal and
/// never noticing the keep-alive gave up.
#[tokio::test]
async fn given_failing_keep_alive_when_session_held_then_ends_as_expired() {
    // GIVEN: A logged-in runner whose keep-alives always fail
    let server = portal("welcome").await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let config = PortalConfig::csrf_form(server.uri());
    let runner = Runner::new(&config, Arc::new(BufferedLogSink::new().silent()))
        .unwrap()
        .with_keep_alive_timing(Duration::from_millis(40), Duration::from_millis(150));
    let result = runner.login(&Credentials::new("alice", "pw")).await;
    assert!(result.succeeded);

    // WHEN: Holding the session with a shutdown that never comes in time
    let end = tokio::time::timeout(
        Duration::from_secs(5),
        runner.hold_session(std::future::pending()),
    )
    .await
    .unwrap();

    // THEN
    assert_eq!(end, SessionEnd::Expired);
    assert!(!runner.keep_alive().is_active());
}
