//! Command line arguments and environment bootstrap.

use crate::error::PortalLoginError;

use common::{ErrorLocation, RedactedSecret};

use portal_core::config::CONFIG_FILE_NAME;
use portal_core::{Credentials, DEFAULT_GATEWAY_BASE_URL, PortalConfig};

use std::convert::Infallible;
use std::env;
use std::panic::Location;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Directory name under the platform config/data dirs.
pub const APP_DIR_NAME: &str = "portal-login";

const ENV_FILE_NAME: &str = ".env";

#[derive(Parser, Debug, Clone)]
#[command(name = "portal-login")]
#[command(about = "Log in to a captive portal and keep the session alive")]
#[command(version)]
pub struct Args {
    /// Portal config file (TOML). Created with --write-config.
    #[arg(long, env = "PORTAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Login username
    #[arg(short, long, env = "PORTAL_USERNAME")]
    pub username: Option<String>,

    /// Login password
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true, value_parser = parse_secret)]
    pub password: Option<RedactedSecret>,

    /// Portal base URL, overriding the config file
    #[arg(long, env = "PORTAL_BASE_URL")]
    pub base_url: Option<String>,

    /// Portal variant used when no config file exists
    #[arg(long, value_enum, default_value_t = Preset::CsrfForm)]
    pub preset: Preset,

    /// Exit after the login attempt instead of keeping the session alive
    #[arg(long)]
    pub no_keep_alive: bool,

    /// Directory for portal-login.log
    #[arg(long, env = "PORTAL_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Write the resolved config to the config path and exit
    #[arg(long)]
    pub write_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// `csrf_token` hidden input, GET and POST on /login
    CsrfForm,
    /// `magic` token on /login?, submitted to / with a 4Tredir field
    MagicToken,
}

impl Preset {
    pub fn build(self, base_url: &str) -> PortalConfig {
        match self {
            Preset::CsrfForm => PortalConfig::csrf_form(base_url),
            Preset::MagicToken => PortalConfig::magic_token(base_url),
        }
    }
}

impl Args {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }

    /// Base URL for a freshly built preset.
    pub fn preset_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_GATEWAY_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`PortalLoginError::MissingCredentials`] if the username or
    /// password is absent or blank.
    pub fn credentials(&self) -> Result<Credentials, PortalLoginError> {
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing("username (--username or PORTAL_USERNAME)"))?;

        let password = self
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| missing("password (--password or PORTAL_PASSWORD)"))?;

        Ok(Credentials {
            username: username.to_string(),
            password,
        })
    }
}

fn parse_secret(value: &str) -> Result<RedactedSecret, Infallible> {
    Ok(RedactedSecret::new(value))
}

#[track_caller]
fn missing(what: &str) -> PortalLoginError {
    PortalLoginError::MissingCredentials {
        message: format!("No {what} supplied"),
        location: ErrorLocation::from(Location::caller()),
    }
}

/// `<config dir>/portal-login/portal.toml`, or `./portal.toml` when the
/// platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// `<local data dir>/portal-login/logs`, falling back to the temp dir.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("logs"))
        .unwrap_or_else(|| env::temp_dir().join(APP_DIR_NAME))
}

/// Attempts to load .env from the current directory, then next to the executable.
///
/// Must run before [`Args`] are parsed so the `env` fallbacks see the values.
/// Returns the file that was loaded, if any. The logger is not up yet, so
/// failures are returned for the caller to report.
pub fn try_load_dotenv() -> Result<Option<PathBuf>, String> {
    if let Ok(path) = dotenvy::dotenv() {
        return Ok(Some(path));
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let env_path = exe_dir.join(ENV_FILE_NAME);
            if env_path.exists() {
                return match dotenvy::from_path(&env_path) {
                    Ok(()) => Ok(Some(env_path)),
                    Err(e) => Err(format!("Failed to parse .env at {:?}: {e}", env_path)),
                };
            }
        }
    }

    Ok(None)
}
