// End-to-end login attempts against a wiremock portal.
// wiremock serves plain HTTP, so `accept_invalid_certs` (self-signed gateway TLS) is not
// exercised here; only the client builder flag is set.

use crate::helpers::{Harness, LOGIN_PAGE};

use portal_core::error::AuthFailureKind;
use portal_core::{BufferedLogSink, Credentials, PortalAuthenticator, PortalConfig, PortalTransport};

use common::HttpStatusCode;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: The happy path end to end: page, token, submit, classification.
///
/// **WHY THIS MATTERS**: This is the whole point of the crate. Every other test covers a
/// way this can go wrong.
///
/// **BUG THIS CATCHES**: Would catch the token not being posted back under the configured
/// field name, or the result not recording which token was used.
#[tokio::test]
async fn given_valid_credentials_when_authenticated_then_succeeds_with_token() {
    // GIVEN: A portal that accepts alice with token abc123
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=s3cret"))
        .and(body_string_contains("csrf_token=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("login successful welcome"))
        .expect(1)
        .mount(&harness.server)
        .await;

    // WHEN: Authenticating
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN: Success, with the token and status recorded
    assert!(result.succeeded);
    assert_eq!(result.token_used.as_deref(), Some("abc123"));
    assert_eq!(result.http_status, Some(HttpStatusCode::OK));
    assert_eq!(result.error_message, None);
    assert_eq!(result.failure, None);
    assert_eq!(result.response_body, "login successful welcome");
    assert_eq!(result.status_message(), "Authentication successful!");
}

#[tokio::test]
async fn given_wrong_password_when_authenticated_then_fails_with_invalid_credentials() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    harness.mount_submit(200, "invalid credentials").await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "wrong"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.error_message.as_deref(), Some("Invalid credentials"));
    assert_eq!(result.failure, Some(AuthFailureKind::AuthenticationRejected));
    assert_eq!(
        result.status_message(),
        "Authentication failed: Invalid credentials"
    );
}

/// **VALUE**: No token means no submit.
///
/// **WHY THIS MATTERS**: Posting credentials without the token the portal expects is a
/// guaranteed failure and may count against lockout limits.
///
/// **BUG THIS CATCHES**: Would catch falling back to an empty or garbage token and
/// submitting anyway.
#[tokio::test]
async fn given_page_without_token_when_authenticated_then_fails_before_submit() {
    // GIVEN: A login page with no recognisable token
    let harness = Harness::csrf_form().await;
    harness
        .mount_login_page("<html><body>Please log in</body></html>")
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    // WHEN: Authenticating
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN: Token-not-found failure, nothing submitted
    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(AuthFailureKind::TokenNotFound));
    assert_eq!(
        result.error_message.as_deref(),
        Some("Login page format not recognized (no token found)")
    );
    assert_eq!(result.token_used, None);
    assert_eq!(result.http_status, None);
    assert!(harness.sink.export().contains("No token rule matched"));
}

#[tokio::test]
async fn given_empty_login_page_when_authenticated_then_fails_with_empty_response() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page("   \n").await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(AuthFailureKind::EmptyResponse));
}

#[tokio::test]
async fn given_submit_returns_server_error_when_authenticated_then_rejected_with_status() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    harness.mount_submit(503, "").await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.http_status, Some(HttpStatusCode(503)));
    assert_eq!(result.failure, Some(AuthFailureKind::AuthenticationRejected));
    assert_eq!(
        result.error_message.as_deref(),
        Some("Login failed (HTTP 503)")
    );
}

#[tokio::test]
async fn given_submit_page_without_indicators_when_authenticated_then_unexpected() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    harness.mount_submit(200, "<html><body>Redirecting...</body></html>").await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(AuthFailureKind::UnexpectedResponse));
    assert_eq!(result.error_message.as_deref(), Some("Login failed"));
    assert_eq!(
        result.response_body,
        "<html><body>Redirecting...</body></html>"
    );
}

#[tokio::test]
async fn given_slow_portal_when_authenticated_then_fails_with_timeout() {
    // GIVEN: A 1s request timeout and a portal that takes 3s
    let server = MockServer::start().await;
    let mut config = PortalConfig::csrf_form(server.uri());
    config.transport.request_timeout_secs = 1;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LOGIN_PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let harness = Harness::with_config(server, config);

    // WHEN
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN
    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(AuthFailureKind::Timeout));
    assert_eq!(
        result.error_message.as_deref(),
        Some("The login portal did not respond in time")
    );
}

#[tokio::test]
async fn given_unreachable_portal_when_authenticated_then_fails_with_network_error() {
    // Port 9 (discard) on loopback has nothing listening in test environments
    let config = PortalConfig::csrf_form("http://127.0.0.1:9");
    let transport = PortalTransport::from_config(&config).unwrap();
    let authenticator = PortalAuthenticator::new(
        &config,
        transport,
        Arc::new(BufferedLogSink::new().silent()),
    )
    .unwrap();

    let result = authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(AuthFailureKind::Network));
    assert_eq!(
        result.error_message.as_deref(),
        Some("Could not reach the login portal")
    );
}

/// **VALUE**: Cookies set by the login page are replayed on the submit.
///
/// **WHY THIS MATTERS**: Most portals bind the token to a session cookie. A client that
/// drops the cookie between the two requests is rejected every time, with a misleading
/// "invalid token" message.
///
/// **BUG THIS CATCHES**: Would catch building a fresh client per request, or losing the
/// cookie provider on the client builder.
#[tokio::test]
async fn given_login_page_sets_cookie_when_authenticated_then_cookie_sent_on_submit() {
    // GIVEN: A login page that sets a session cookie
    let harness = Harness::csrf_form().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=xyz; Path=/")
                .set_body_string(LOGIN_PAGE),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("cookie", "session=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("success"))
        .expect(1)
        .mount(&harness.server)
        .await;

    // WHEN
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN
    assert!(result.succeeded);
    assert_eq!(harness.authenticator.transport().cookie_count(), 1);
    assert_eq!(
        harness.authenticator.transport().cookie_header().as_deref(),
        Some("session=xyz")
    );
}

#[tokio::test]
async fn given_submit_when_sent_then_carries_origin_and_referer() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    let origin = harness.server.uri();
    let referer = format!("{}/login", harness.server.uri());
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("origin", origin.as_str()))
        .and(header("referer", referer.as_str()))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&harness.server)
        .await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    assert!(result.succeeded);
}

#[tokio::test]
async fn given_magic_token_portal_when_authenticated_then_posts_magic_and_redirect_to_root() {
    // GIVEN: A gateway handing out a magic value on /login? and accepting on /
    let server = MockServer::start().await;
    let config = PortalConfig::magic_token(server.uri());
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form method="post" action="/"><input type="hidden" name="4Tredir" value="x"><input type="hidden" name="magic" value="0a1b2c3d"></form>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("magic=0a1b2c3d"))
        .and(body_string_contains("4Tredir="))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>window.location="/keepalive?0d0e0f";</script>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let harness = Harness::with_config(server, config);

    // WHEN
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN: The keepalive redirect counts as success
    assert!(result.succeeded);
    assert_eq!(result.token_used.as_deref(), Some("0a1b2c3d"));
}

#[tokio::test]
async fn given_extra_field_colliding_with_credentials_when_submitted_then_extra_field_ignored() {
    let server = MockServer::start().await;
    let mut config = PortalConfig::csrf_form(server.uri());
    config
        .endpoint
        .extra_fields
        .insert("password".to_string(), "overridden".to_string());
    config
        .endpoint
        .extra_fields
        .insert("zone".to_string(), "lab".to_string());
    let harness = Harness::with_config(server, config);
    harness.mount_login_page(LOGIN_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("password=s3cret"))
        .and(body_string_contains("zone=lab"))
        .respond_with(ResponseTemplate::new(200).set_body_string("success"))
        .expect(1)
        .mount(&harness.server)
        .await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    assert!(result.succeeded);
    assert!(harness.sink.export().contains("Ignoring extra field 'password'"));
}

/// **VALUE**: The password never reaches the log.
///
/// **WHY THIS MATTERS**: Logs get pasted into help-desk tickets. The submit parameters are
/// logged for debugging, so masking has to happen before they reach the sink.
///
/// **BUG THIS CATCHES**: Would catch logging the raw form, or `Debug`-printing the
/// credentials.
#[tokio::test]
async fn given_full_attempt_when_log_exported_then_password_absent_and_steps_present() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    harness.mount_submit(200, "invalid password").await;

    let _ = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "hunter2-very-secret"))
        .await;

    let export = harness.sink.export();
    assert!(!export.contains("hunter2-very-secret"));
    assert!(export.contains("password=********"));
    for step in 1..=4 {
        assert!(export.contains(&format!("[Step {step}]")), "missing step {step}");
    }
    assert!(export.contains("[HTTP] GET"));
    assert!(export.contains("[HTTP] POST"));
}

#[tokio::test]
async fn given_simplified_login_when_called_then_returns_success_flag() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    harness.mount_submit(200, "authenticated").await;

    assert!(harness.authenticator.login("alice", "s3cret").await);
}

#[tokio::test]
async fn given_same_authenticator_when_reused_then_each_attempt_is_independent() {
    let harness = Harness::csrf_form().await;
    harness.mount_login_page(LOGIN_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("password=wrong"))
        .respond_with(ResponseTemplate::new(200).set_body_string("incorrect password"))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("password=right"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(&harness.server)
        .await;

    let first = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "wrong"))
        .await;
    let second = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "right"))
        .await;

    assert!(!first.succeeded);
    assert_eq!(
        first.error_message.as_deref(),
        Some("Incorrect username or password")
    );
    assert!(second.succeeded);
}

/// **VALUE**: A login page that redirects (e.g. `/login` to the real portal page) is
/// followed and the token is read from the final page.
///
/// **WHY THIS MATTERS**: Gateways commonly bounce the first request through one or two
/// redirects before serving the form.
///
/// **BUG THIS CATCHES**: Would catch `Policy::none()` or a redirect policy of zero, which
/// would hand the empty 302 body to token extraction.
#[tokio::test]
async fn given_login_page_redirects_when_authenticated_then_token_read_from_final_page() {
    // GIVEN: /login redirects to /portal, which holds the form
    let harness = Harness::csrf_form().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/portal"))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .expect(1)
        .mount(&harness.server)
        .await;
    harness.mount_submit(200, "welcome").await;

    // WHEN
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN
    assert!(result.succeeded);
    assert_eq!(result.token_used.as_deref(), Some("abc123"));
    assert!(harness.sink.export().contains("Login page redirected to"));
}

/// **VALUE**: Redirects are bounded by `max_redirects`.
///
/// **BUG THIS CATCHES**: Would catch an unlimited redirect policy, which would spin on a
/// misconfigured gateway until the request timeout instead of failing fast.
#[tokio::test]
async fn given_redirect_loop_when_authenticated_then_fails_with_network_error() {
    // GIVEN: /login redirects to itself and at most 3 redirects are allowed
    let server = MockServer::start().await;
    let mut config = PortalConfig::csrf_form(server.uri());
    config.transport.max_redirects = 3;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .expect(2..=4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let harness = Harness::with_config(server, config);

    // WHEN
    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;

    // THEN: The loop ends as a network failure, nothing submitted
    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(AuthFailureKind::Network));
    assert_eq!(result.token_used, None);
}
