//! Periodic keep-alive for an authenticated portal session.
//!
//! `Idle → Active` on [`SessionKeepAlive::start`]; `Active → Idle` on
//! [`SessionKeepAlive::stop`] or when a tick finds the session idle for longer
//! than the session timeout. An expired session stays idle until the next
//! `start()`.
//!
//! The driver is a tokio task selecting over an interval and a cancellation
//! channel. The keep-alive request itself is spawned, so a hanging gateway
//! never delays the next tick; a tick that finds the previous request still in
//! flight is skipped. Request failures are logged and otherwise ignored.

use crate::config::KeepAliveConfig;
use crate::error::TransportError;
use crate::log_sink::LogSink;
use crate::transport::PortalTransport;

use common::HttpStatusCode;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use log::debug;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use url::Url;

/// Snapshot of the keep-alive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub last_activity: SystemTime,
    pub active: bool,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The session is idle (stopped, expired, or superseded by a newer start).
    Inactive,
    /// Idle time exceeded the session timeout; the session is now idle and no
    /// request was sent.
    Expired { idle: Duration },
    /// The previous keep-alive request has not finished yet.
    Skipped,
    /// A keep-alive request was spawned; resolves to `true` on a 2xx response.
    Dispatched(JoinHandle<bool>),
}

struct Session {
    state: SessionState,
    generation: u64,
    /// Generation whose keep-alive request has not finished yet.
    in_flight: Option<u64>,
}

struct Inner {
    transport: PortalTransport,
    url: Url,
    interval: Duration,
    session_timeout: Duration,
    sink: Arc<dyn LogSink>,
    session: Mutex<Session>,
}

struct Driver {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct SessionKeepAlive {
    inner: Arc<Inner>,
    driver: Mutex<Option<Driver>>,
}

impl SessionKeepAlive {
    /// # Errors
    ///
    /// Returns [`TransportError::UrlParse`] if the keep-alive path does not
    /// resolve against the portal base URL.
    pub fn new(
        config: &KeepAliveConfig,
        transport: PortalTransport,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, TransportError> {
        let url = transport.url(&config.path)?;

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                url,
                interval: config.interval(),
                session_timeout: config.session_timeout(),
                sink,
                session: Mutex::new(Session {
                    state: SessionState {
                        last_activity: SystemTime::now(),
                        active: false,
                    },
                    generation: 0,
                    in_flight: None,
                }),
            }),
            driver: Mutex::new(None),
        })
    }

    /// Override the tick interval and the session timeout.
    ///
    /// Only takes effect before the first [`start`](Self::start).
    pub fn with_timing(mut self, interval: Duration, session_timeout: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.interval = interval;
            inner.session_timeout = session_timeout;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn session_timeout(&self) -> Duration {
        self.inner.session_timeout
    }

    /// Begin a session: reset the idle clock and schedule ticks.
    ///
    /// Must be called from within a tokio runtime. A no-op while already active.
    pub fn start(&self) {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = {
            let mut session = self.inner.session();
            if session.state.active {
                self.inner
                    .sink
                    .warning("Keep-alive already running, ignoring start");
                return;
            }
            session.generation += 1;
            session.state = SessionState {
                last_activity: SystemTime::now(),
                active: true,
            };
            session.generation
        };

        // A driver left behind by an expired session has already exited or
        // will see a stale generation; cancel it anyway.
        if let Some(stale) = driver.take() {
            if !stale.handle.is_finished() {
                let _ = stale.cancel.send(());
            }
        }

        let (cancel, cancelled) = oneshot::channel();
        let handle = tokio::spawn(run_driver(Arc::clone(&self.inner), generation, cancelled));
        *driver = Some(Driver { cancel, handle });

        self.inner.sink.info(&format!(
            "Keep-alive started (every {}s, session timeout {}s)",
            self.inner.interval.as_secs(),
            self.inner.session_timeout.as_secs()
        ));
    }

    /// End the session. Idempotent; never waits for an in-flight request.
    pub fn stop(&self) {
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let was_active = {
            let mut session = self.inner.session();
            let was_active = session.state.active;
            session.state.active = false;
            session.generation += 1;
            was_active
        };

        if let Some(driver) = driver {
            let _ = driver.cancel.send(());
        }

        if was_active {
            self.inner.sink.info("Keep-alive stopped");
        }
    }

    /// Record activity seen elsewhere; extends the session without a request.
    pub fn notify_activity(&self) {
        self.inner.session().state.last_activity = SystemTime::now();
    }

    pub fn state(&self) -> SessionState {
        self.inner.session().state
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    /// Run one tick for the current session now.
    pub fn tick(&self) -> TickOutcome {
        let generation = self.inner.session().generation;
        self.inner.tick(generation)
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&self, at: SystemTime) {
        self.inner.session().state.last_activity = at;
    }
}

impl Drop for SessionKeepAlive {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(self: &Arc<Self>, generation: u64) -> TickOutcome {
        {
            let mut session = self.session();
            if !session.state.active || session.generation != generation {
                return TickOutcome::Inactive;
            }

            // A clock that moved backwards counts as no idle time.
            let idle = SystemTime::now()
                .duration_since(session.state.last_activity)
                .unwrap_or(Duration::ZERO);

            if idle > self.session_timeout {
                session.state.active = false;
                drop(session);
                self.sink.warning(&format!(
                    "Session idle for {}s (timeout {}s), keep-alive stopped",
                    idle.as_secs(),
                    self.session_timeout.as_secs()
                ));
                return TickOutcome::Expired { idle };
            }

            // A request still hanging from an earlier session does not block this one
            if session.in_flight == Some(generation) {
                drop(session);
                self.sink
                    .warning("Previous keep-alive still in flight, skipping this tick");
                return TickOutcome::Skipped;
            }
            session.in_flight = Some(generation);
        }

        let inner = Arc::clone(self);
        TickOutcome::Dispatched(tokio::spawn(async move {
            let alive = inner.send_keep_alive(generation).await;
            let mut session = inner.session();
            if session.in_flight == Some(generation) {
                session.in_flight = None;
            }
            alive
        }))
    }

    async fn send_keep_alive(&self, generation: u64) -> bool {
        self.sink.http_request("GET", self.url.as_str(), None);

        let response = match self.transport.get(self.url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                self.sink
                    .warning(&format!("Keep-alive request failed: {e}"));
                return false;
            }
        };

        let status = HttpStatusCode(response.status().as_u16());
        let length = response.bytes().await.map(|b| b.len()).unwrap_or(0);
        self.sink.http_response(status, length, None);

        if !status.is_success() {
            self.sink
                .warning(&format!("Keep-alive returned HTTP {status}"));
            return false;
        }

        {
            let mut session = self.session();
            if session.generation != generation {
                debug!("Keep-alive acknowledged for a finished session, ignoring");
                return true;
            }
            session.state.last_activity = SystemTime::now();
        }
        self.sink.info("Keep-alive acknowledged, session extended");
        true
    }
}

async fn run_driver(inner: Arc<Inner>, generation: u64, mut cancelled: oneshot::Receiver<()>) {
    let mut ticker = interval_at(Instant::now() + inner.interval, inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Keep-alive driver {generation} running");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match inner.tick(generation) {
                    TickOutcome::Inactive | TickOutcome::Expired { .. } => break,
                    TickOutcome::Skipped | TickOutcome::Dispatched(_) => {}
                }
            }
            _ = &mut cancelled => {
                debug!("Keep-alive driver {generation} cancelled");
                break;
            }
        }
    }

    debug!("Keep-alive driver {generation} exited");
}
