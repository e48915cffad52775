use crate::helpers::{Harness, LOGIN_PAGE};

use portal_core::{Credentials, SessionKeepAlive};

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

/// **VALUE**: The keep-alive rides on the session the login established.
///
/// **WHY THIS MATTERS**: The gateway identifies the session by the cookie it set on the
/// login page. A keep-alive sent without it pings an anonymous session and the real one
/// times out anyway.
///
/// **BUG THIS CATCHES**: Would catch the keep-alive building its own client instead of
/// sharing the authenticator's transport and cookie jar.
#[tokio::test]
async fn given_logged_in_session_when_keep_alive_runs_then_session_cookie_replayed() {
    // GIVEN: A successful login that left a session cookie in the jar
    let harness = Harness::csrf_form().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "portal_session=s-42; Path=/")
                .set_body_string(LOGIN_PAGE),
        )
        .mount(&harness.server)
        .await;
    harness.mount_submit(200, "welcome").await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .and(header("cookie", "portal_session=s-42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1..)
        .mount(&harness.server)
        .await;

    let result = harness
        .authenticator
        .authenticate(&Credentials::new("alice", "s3cret"))
        .await;
    assert!(result.succeeded);

    // WHEN: A keep-alive shares the authenticator's transport
    let keep_alive = SessionKeepAlive::new(
        &harness.config.keep_alive,
        harness.authenticator.transport().clone(),
        harness.sink.clone(),
    )
    .unwrap()
    .with_timing(Duration::from_millis(50), Duration::from_secs(30));
    keep_alive.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    keep_alive.stop();

    // THEN: The session is still considered fresh and the cookie was sent (checked on drop)
    assert!(!keep_alive.is_active());
    assert!(harness.sink.export().contains("Keep-alive acknowledged"));
}

#[tokio::test]
async fn given_keep_alive_dropped_when_time_passes_then_driver_stops() {
    let harness = Harness::csrf_form().await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.server)
        .await;

    {
        let keep_alive = SessionKeepAlive::new(
            &harness.config.keep_alive,
            harness.authenticator.transport().clone(),
            harness.sink.clone(),
        )
        .unwrap()
        .with_timing(Duration::from_millis(30), Duration::from_secs(30));
        keep_alive.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    tokio::time::sleep(Duration::from_millis(80)).await;
    let settled = harness.server.received_requests().await.unwrap_or_default().len();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        harness.server.received_requests().await.unwrap_or_default().len(),
        settled
    );
}
