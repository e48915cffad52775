//! One login attempt, then an optional kept-alive session.

use crate::cli::Args;
use crate::error::PortalLoginError;
use crate::logger;

use common::ErrorLocation;

use portal_core::{
    AuthAttemptResult, Credentials, LogCrateSink, LogSink, PortalAuthenticator, PortalConfig,
    PortalTransport, SessionKeepAlive,
};

use std::fs::create_dir_all;
use std::future::Future;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

/// How often a held session checks whether the keep-alive gave up.
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Exit code when the gateway rejected the login.
pub const EXIT_LOGIN_FAILED: u8 = 1;
/// Exit code when the kept-alive session expired on its own.
pub const EXIT_SESSION_EXPIRED: u8 = 2;

/// Why a held session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    Expired,
}

/// Authenticator and keep-alive bound to one portal, sharing one transport.
pub struct Runner {
    authenticator: PortalAuthenticator,
    keep_alive: SessionKeepAlive,
    session_check: Duration,
}

impl Runner {
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built or a configured
    /// pattern or path is invalid.
    pub fn new(config: &PortalConfig, sink: Arc<dyn LogSink>) -> Result<Self, PortalLoginError> {
        let transport = PortalTransport::from_config(config)?;
        let authenticator = PortalAuthenticator::new(config, transport.clone(), Arc::clone(&sink))?;
        let keep_alive = SessionKeepAlive::new(&config.keep_alive, transport, sink)?;

        Ok(Self {
            authenticator,
            keep_alive,
            session_check: SESSION_CHECK_INTERVAL,
        })
    }

    /// Replace the keep-alive timing (and the expiry check) for short-lived runs.
    pub fn with_keep_alive_timing(mut self, interval: Duration, session_timeout: Duration) -> Self {
        self.keep_alive = self.keep_alive.with_timing(interval, session_timeout);
        self.session_check = interval.min(SESSION_CHECK_INTERVAL);
        self
    }

    pub fn keep_alive(&self) -> &SessionKeepAlive {
        &self.keep_alive
    }

    pub async fn login(&self, credentials: &Credentials) -> AuthAttemptResult {
        self.authenticator.authenticate(credentials).await
    }

    /// Keep the session alive until `shutdown` resolves or the session expires.
    pub async fn hold_session<F>(&self, shutdown: F) -> SessionEnd
    where
        F: Future<Output = ()>,
    {
        self.keep_alive.start();

        let mut check = tokio::time::interval(self.session_check);
        tokio::pin!(shutdown);

        let end = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, ending session");
                    break SessionEnd::Shutdown;
                }
                _ = check.tick() => {
                    if !self.keep_alive.is_active() {
                        warn!("Session expired, log in again to continue");
                        break SessionEnd::Expired;
                    }
                }
            }
        };

        self.keep_alive.stop();
        end
    }
}

/// Portal config for this run.
///
/// An existing file wins over `--preset`; `--base-url` overrides either.
///
/// # Errors
///
/// Returns [`PortalLoginError::Config`] if the file is unreadable or the
/// resulting config is invalid.
pub fn resolve_config(args: &Args, path: &Path) -> Result<PortalConfig, PortalLoginError> {
    let mut config = if path.exists() {
        PortalConfig::load(path)?
    } else {
        info!(
            "No portal config at {}, using the {:?} preset",
            path.display(),
            args.preset
        );
        args.preset.build(args.preset_base_url())
    };

    if let Some(base_url) = &args.base_url {
        config.endpoint.base_url = base_url.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Run the command and map the outcome to a process exit code.
///
/// # Errors
///
/// Returns an error for anything that prevents a login attempt (logger,
/// config, transport, missing credentials). A rejected login is an exit code.
pub async fn run(
    args: Args,
    env_file: Result<Option<PathBuf>, String>,
) -> Result<ExitCode, PortalLoginError> {
    run_until(args, env_file, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// [`run`] with an explicit shutdown signal.
///
/// # Errors
///
/// See [`run`].
pub async fn run_until<F>(
    args: Args,
    env_file: Result<Option<PathBuf>, String>,
    shutdown: F,
) -> Result<ExitCode, PortalLoginError>
where
    F: Future<Output = ()>,
{
    let log_dir = args.log_dir();
    create_dir_all(&log_dir).map_err(|e| PortalLoginError::PortalLogin {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    logger::initialize(&log_dir)?;

    info!("portal-login {} starting", env!("CARGO_PKG_VERSION"));
    info!("Log directory: {}", log_dir.display());
    match env_file {
        Ok(Some(path)) => info!("Loaded .env from: {:?}", path),
        Ok(None) => info!("No .env file found, using the process environment"),
        Err(e) => warn!("{e}"),
    }

    let config_path = args.config_path();
    let config = resolve_config(&args, &config_path)?;

    if args.write_config {
        config.save(&config_path)?;
        println!("Wrote portal config to {}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let credentials = args.credentials()?;
    let runner = Runner::new(&config, Arc::new(LogCrateSink))?;

    let result = runner.login(&credentials).await;
    println!("{}", result.status_message());

    if !result.succeeded {
        return Ok(ExitCode::from(EXIT_LOGIN_FAILED));
    }

    if args.no_keep_alive {
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "Keeping the session alive every {}s, press Ctrl-C to stop",
        runner.keep_alive().interval().as_secs()
    );

    match runner.hold_session(shutdown).await {
        SessionEnd::Shutdown => Ok(ExitCode::SUCCESS),
        SessionEnd::Expired => {
            println!("Session expired");
            Ok(ExitCode::from(EXIT_SESSION_EXPIRED))
        }
    }
}
