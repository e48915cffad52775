// Unit tests for the keep-alive state machine.
// These reach into `set_last_activity` to simulate idle time without sleeping.

use crate::config::{KeepAliveConfig, PortalConfig};
use crate::keepalive::{SessionKeepAlive, TickOutcome};
use crate::log_sink::BufferedLogSink;
use crate::transport::PortalTransport;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MINUTE: Duration = Duration::from_secs(60);

fn keep_alive_for(server: &MockServer) -> (SessionKeepAlive, Arc<BufferedLogSink>) {
    let config = PortalConfig::csrf_form(server.uri());
    let transport = PortalTransport::from_config(&config).unwrap();
    let sink = Arc::new(BufferedLogSink::new().silent());
    let keep_alive = SessionKeepAlive::new(&config.keep_alive, transport, sink.clone()).unwrap();
    (keep_alive, sink)
}

async fn mount_keep_alive(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(status).set_body_string("ok"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn given_new_keep_alive_when_inspected_then_idle_with_configured_timing() {
    let server = MockServer::start().await;

    let (keep_alive, _sink) = keep_alive_for(&server);

    assert!(!keep_alive.is_active());
    assert_eq!(keep_alive.interval(), Duration::from_secs(300));
    assert_eq!(keep_alive.session_timeout(), Duration::from_secs(1800));
}

#[tokio::test]
async fn given_idle_keep_alive_when_ticked_then_inactive_and_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (keep_alive, _sink) = keep_alive_for(&server);

    let outcome = keep_alive.tick();

    assert!(matches!(outcome, TickOutcome::Inactive));
}

/// **VALUE**: A session idle past the timeout stops itself and sends nothing.
///
/// **WHY THIS MATTERS**: Once the gateway has forgotten the session, further keep-alives
/// are pointless traffic against a portal that will answer with its login page.
///
/// **BUG THIS CATCHES**: Would catch the timeout check being skipped, or a request being
/// sent before the idle check runs.
#[tokio::test]
async fn given_session_idle_past_timeout_when_ticked_then_expires_without_request() {
    // GIVEN: An active session last seen 31 minutes ago (timeout is 30)
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (keep_alive, sink) = keep_alive_for(&server);
    keep_alive.start();
    keep_alive.set_last_activity(SystemTime::now() - 31 * MINUTE);

    // WHEN: A tick runs
    let outcome = keep_alive.tick();

    // THEN: The session expired and is no longer active
    match outcome {
        TickOutcome::Expired { idle } => assert!(idle >= 31 * MINUTE),
        other => panic!("expected Expired, got {other:?}"),
    }
    assert!(!keep_alive.is_active());
    assert!(sink.export().contains("keep-alive stopped"));

    // AND: Further ticks do nothing
    assert!(matches!(keep_alive.tick(), TickOutcome::Inactive));
}

#[tokio::test]
async fn given_successful_keep_alive_when_ticked_then_last_activity_extended() {
    // GIVEN: An active session idle for 10 minutes
    let server = MockServer::start().await;
    mount_keep_alive(&server, 200).await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();
    let stale = SystemTime::now() - 10 * MINUTE;
    keep_alive.set_last_activity(stale);

    // WHEN: A tick dispatches and the request completes
    let handle = match keep_alive.tick() {
        TickOutcome::Dispatched(handle) => handle,
        other => panic!("expected Dispatched, got {other:?}"),
    };
    let alive = handle.await.unwrap();

    // THEN: The gateway acknowledged and the idle clock was reset
    assert!(alive);
    let state = keep_alive.state();
    assert!(state.active);
    assert!(state.last_activity > stale + 9 * MINUTE);
}

/// **VALUE**: Only a 2xx keep-alive counts as activity.
///
/// **BUG THIS CATCHES**: Would catch treating any response (e.g. the portal's 500 page or a
/// redirect to the login page) as proof the session is alive, which would keep a dead
/// session "active" forever.
#[tokio::test]
async fn given_failing_keep_alive_when_ticked_then_session_not_extended_but_still_active() {
    let server = MockServer::start().await;
    mount_keep_alive(&server, 500).await;
    let (keep_alive, sink) = keep_alive_for(&server);
    keep_alive.start();
    let stale = SystemTime::now() - 10 * MINUTE;
    keep_alive.set_last_activity(stale);

    let handle = match keep_alive.tick() {
        TickOutcome::Dispatched(handle) => handle,
        other => panic!("expected Dispatched, got {other:?}"),
    };

    assert!(!handle.await.unwrap());
    let state = keep_alive.state();
    assert!(state.active);
    assert_eq!(state.last_activity, stale);
    assert!(sink.export().contains("Keep-alive returned HTTP 500"));
}

#[tokio::test]
async fn given_request_in_flight_when_ticked_again_then_tick_skipped() {
    // GIVEN: A gateway that takes a while to answer
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();

    // WHEN: Two ticks run back to back
    let first = keep_alive.tick();
    let second = keep_alive.tick();

    // THEN: Only the first sends a request
    assert!(matches!(second, TickOutcome::Skipped));
    match first {
        TickOutcome::Dispatched(handle) => assert!(handle.await.unwrap()),
        other => panic!("expected Dispatched, got {other:?}"),
    }
}

#[tokio::test]
async fn given_active_session_when_stopped_twice_then_idle_and_no_panic() {
    let server = MockServer::start().await;
    let (keep_alive, sink) = keep_alive_for(&server);
    keep_alive.start();

    keep_alive.stop();
    keep_alive.stop();

    assert!(!keep_alive.is_active());
    let stops = sink
        .lines()
        .iter()
        .filter(|line| line.ends_with("Keep-alive stopped"))
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn given_slow_gateway_when_stopped_then_stop_returns_without_waiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();
    let _in_flight = keep_alive.tick();

    let started = Instant::now();
    keep_alive.stop();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!keep_alive.is_active());
}

#[tokio::test]
async fn given_active_session_when_started_again_then_ignored() {
    let server = MockServer::start().await;
    let (keep_alive, sink) = keep_alive_for(&server);
    keep_alive.start();
    let before = keep_alive.state();

    keep_alive.start();

    assert_eq!(keep_alive.state(), before);
    assert!(sink.export().contains("Keep-alive already running"));
}

#[tokio::test]
async fn given_activity_elsewhere_when_notified_then_idle_clock_reset() {
    let server = MockServer::start().await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();
    keep_alive.set_last_activity(SystemTime::now() - 31 * MINUTE);

    keep_alive.notify_activity();

    // Tick no longer expires: the session was just used
    assert!(matches!(keep_alive.tick(), TickOutcome::Dispatched(_)));
    assert!(keep_alive.is_active());
}

#[tokio::test]
async fn given_clock_moved_backwards_when_ticked_then_no_expiry() {
    let server = MockServer::start().await;
    mount_keep_alive(&server, 200).await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();
    keep_alive.set_last_activity(SystemTime::now() + 60 * MINUTE);

    let outcome = keep_alive.tick();

    assert!(matches!(outcome, TickOutcome::Dispatched(_)));
}

#[tokio::test]
async fn given_expired_session_when_restarted_then_active_with_fresh_clock() {
    let server = MockServer::start().await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();
    keep_alive.set_last_activity(SystemTime::now() - 31 * MINUTE);
    assert!(matches!(keep_alive.tick(), TickOutcome::Expired { .. }));

    keep_alive.start();

    let state = keep_alive.state();
    assert!(state.active);
    let idle = SystemTime::now()
        .duration_since(state.last_activity)
        .unwrap_or(Duration::ZERO);
    assert!(idle < MINUTE);
}

/// **VALUE**: The background driver actually fires on its interval.
///
/// **BUG THIS CATCHES**: Would catch a driver that ticks immediately on start (duplicating
/// the login request burst), or one that never ticks because the interval future was
/// dropped.
#[tokio::test]
async fn given_short_interval_when_started_then_driver_sends_periodic_requests() {
    // GIVEN: A 50ms interval
    let server = MockServer::start().await;
    mount_keep_alive(&server, 200).await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    let keep_alive = keep_alive.with_timing(Duration::from_millis(50), Duration::from_secs(30));

    // WHEN: Running for a few intervals
    keep_alive.start();
    tokio::time::sleep(Duration::from_millis(400)).await;
    keep_alive.stop();

    // THEN: Several keep-alives reached the gateway
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.len() >= 2, "only {} keep-alives sent", received.len());
}

#[tokio::test]
async fn given_stopped_driver_when_time_passes_then_no_more_requests() {
    let server = MockServer::start().await;
    mount_keep_alive(&server, 200).await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    let keep_alive = keep_alive.with_timing(Duration::from_millis(50), Duration::from_secs(30));
    keep_alive.start();
    tokio::time::sleep(Duration::from_millis(200)).await;

    keep_alive.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_stop = server.received_requests().await.unwrap_or_default().len();
    tokio::time::sleep(Duration::from_millis(250)).await;

    let later = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(after_stop, later);
}

#[tokio::test]
async fn given_gateway_failing_when_driver_runs_then_session_expires_itself() {
    // GIVEN: Every keep-alive fails and the timeout is a few intervals long
    let server = MockServer::start().await;
    mount_keep_alive(&server, 500).await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    let keep_alive =
        keep_alive.with_timing(Duration::from_millis(40), Duration::from_millis(150));

    // WHEN: The driver runs well past the timeout
    keep_alive.start();
    tokio::time::sleep(Duration::from_millis(600)).await;

    // THEN: The session went idle on its own
    assert!(!keep_alive.is_active());
}

#[tokio::test]
async fn given_custom_config_when_built_then_timing_taken_from_config() {
    let server = MockServer::start().await;
    let config = PortalConfig::csrf_form(server.uri());
    let transport = PortalTransport::from_config(&config).unwrap();
    let keep_alive_config = KeepAliveConfig {
        interval_secs: 60,
        session_timeout_secs: 600,
        ..KeepAliveConfig::default()
    };

    let keep_alive = SessionKeepAlive::new(
        &keep_alive_config,
        transport,
        Arc::new(BufferedLogSink::new().silent()),
    )
    .unwrap();

    assert_eq!(keep_alive.interval(), Duration::from_secs(60));
    assert_eq!(keep_alive.session_timeout(), Duration::from_secs(600));
}

/// **VALUE**: A request hanging from a stopped session does not suppress the next session's
/// first keep-alive.
///
/// **WHY THIS MATTERS**: After a quick stop/start (re-login), a slow gateway would otherwise
/// cost the new session a whole interval of keep-alives.
///
/// **BUG THIS CATCHES**: Would catch an in-flight marker that is shared across sessions
/// instead of being tied to the session that sent the request.
#[tokio::test]
async fn given_request_hanging_from_previous_session_when_restarted_then_first_tick_dispatches() {
    // GIVEN: A slow gateway and a session stopped while its keep-alive is in flight
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep-alive"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .expect(2)
        .mount(&server)
        .await;
    let (keep_alive, _sink) = keep_alive_for(&server);
    keep_alive.start();
    let stale = match keep_alive.tick() {
        TickOutcome::Dispatched(handle) => handle,
        other => panic!("expected Dispatched, got {other:?}"),
    };
    keep_alive.stop();

    // WHEN: A new session starts and ticks right away
    keep_alive.start();
    let outcome = keep_alive.tick();

    // THEN: The new session sends its own keep-alive
    let fresh = match outcome {
        TickOutcome::Dispatched(handle) => handle,
        other => panic!("expected Dispatched, got {other:?}"),
    };
    assert!(fresh.await.unwrap());
    assert!(stale.await.unwrap());
    assert!(keep_alive.is_active());
}
