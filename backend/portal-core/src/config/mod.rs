pub mod presets;

use crate::DEFAULT_GATEWAY_BASE_URL;
use crate::error::config::ConfigError;

use presets::{
    DEFAULT_ERROR_MESSAGE, DEFAULT_USER_AGENT, default_error_fallbacks, default_error_patterns,
    default_negative_indicators, default_positive_indicators, default_token_rules,
};

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CONFIG_FILE_NAME: &str = "portal.toml";
const CONFIG_VERSION: u32 = 1;

// ============================================
// CONFIG STRUCTS
// ============================================

/// Where the gateway lives and which paths the login flow uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub challenge_path: String,
    #[serde(default = "default_login_path")]
    pub submit_path: String,
    /// Fixed fields sent with every submit (e.g. a redirect target).
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            challenge_path: default_login_path(),
            submit_path: default_login_path(),
            extra_fields: BTreeMap::new(),
        }
    }
}

/// Form field names expected by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormFields {
    #[serde(default = "default_username_field")]
    pub username: String,
    #[serde(default = "default_password_field")]
    pub password: String,
    #[serde(default = "default_token_field")]
    pub token: String,
}

impl FormFields {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            token: token.into(),
        }
    }
}

impl Default for FormFields {
    fn default() -> Self {
        Self::new(
            default_username_field(),
            default_password_field(),
            default_token_field(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Captive portals terminate TLS with self-signed certificates on a
    /// private gateway address. Only affects the portal client.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: default_accept_invalid_certs(),
            max_redirects: default_max_redirects(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// One token extraction pattern. Capture group 1 (or a group named `token`)
/// holds the token value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRule {
    pub name: String,
    pub pattern: String,
}

impl TokenRule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenConfig {
    /// Tried in order; the first rule that matches wins.
    #[serde(default = "default_token_rules")]
    pub rules: Vec<TokenRule>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            rules: default_token_rules(),
        }
    }
}

/// Maps a lower-case body substring to the message shown on failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndicatorMessage {
    pub indicator: String,
    pub message: String,
}

impl IndicatorMessage {
    pub fn new(indicator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            indicator: indicator.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationConfig {
    #[serde(default = "default_positive_indicators")]
    pub positive_indicators: Vec<String>,
    #[serde(default = "default_negative_indicators")]
    pub negative_indicators: Vec<String>,
    /// HTML error container regexes, tried before `error_fallbacks`.
    #[serde(default = "default_error_patterns")]
    pub error_patterns: Vec<String>,
    #[serde(default = "default_error_message")]
    pub default_error_message: String,
    /// Treat a 200 with neither positive nor negative indicators as success.
    #[serde(default)]
    pub accept_without_indicators: bool,
    /// Substring to message table, tried in order after `error_patterns`.
    #[serde(default = "default_error_fallbacks")]
    pub error_fallbacks: Vec<IndicatorMessage>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            positive_indicators: default_positive_indicators(),
            negative_indicators: default_negative_indicators(),
            error_patterns: default_error_patterns(),
            default_error_message: default_error_message(),
            accept_without_indicators: false,
            error_fallbacks: default_error_fallbacks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeepAliveConfig {
    #[serde(default = "default_keep_alive_path")]
    pub path: String,
    #[serde(default = "default_keep_alive_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl KeepAliveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            path: default_keep_alive_path(),
            interval_secs: default_keep_alive_interval_secs(),
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

/// Per-deployment description of one captive portal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub fields: FormFields,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::csrf_form(DEFAULT_GATEWAY_BASE_URL)
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}
fn default_login_path() -> String {
    "/login".to_string()
}
fn default_username_field() -> String {
    "username".to_string()
}
fn default_password_field() -> String {
    "password".to_string()
}
fn default_token_field() -> String {
    "csrf_token".to_string()
}
fn default_accept_invalid_certs() -> bool {
    true
}
fn default_max_redirects() -> usize {
    10
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_error_message() -> String {
    DEFAULT_ERROR_MESSAGE.to_string()
}
fn default_keep_alive_path() -> String {
    "/keep-alive".to_string()
}
fn default_keep_alive_interval_secs() -> u64 {
    300
}
fn default_session_timeout_secs() -> u64 {
    1800
}

// ============================================
// IMPLEMENTATION
// ============================================

impl PortalConfig {
    /// Load config from a TOML file.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(
                "Portal config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read portal config: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        let config: PortalConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse portal config: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Portal config loaded from {}", path.display());
        Ok(config)
    }

    /// Save config to a TOML file using atomic write (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, serialization, write or rename fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::WriteError {
                location: ErrorLocation::from(Location::caller()),
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
                location: ErrorLocation::from(Location::caller()),
                reason: e.to_string(),
            })?;

        let temp_path = path.with_extension("toml.tmp");

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("Portal config saved to {}", path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] on the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(validation_error(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        let base_url = Url::parse(&self.endpoint.base_url).map_err(|e| {
            validation_error(format!(
                "Invalid base_url '{}': {e}",
                self.endpoint.base_url
            ))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(validation_error(format!(
                "base_url must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        for (name, path) in [
            ("challenge_path", &self.endpoint.challenge_path),
            ("submit_path", &self.endpoint.submit_path),
            ("keep_alive.path", &self.keep_alive.path),
        ] {
            if !path.starts_with('/') {
                return Err(validation_error(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }

        for (name, field) in [
            ("fields.username", &self.fields.username),
            ("fields.password", &self.fields.password),
            ("fields.token", &self.fields.token),
        ] {
            if field.trim().is_empty() {
                return Err(validation_error(format!("{name} cannot be empty")));
            }
        }

        if self.transport.request_timeout_secs == 0 {
            return Err(validation_error(
                "transport.request_timeout_secs must be greater than 0",
            ));
        }

        if self.keep_alive.interval_secs == 0 {
            return Err(validation_error(
                "keep_alive.interval_secs must be greater than 0",
            ));
        }

        if self.keep_alive.session_timeout_secs <= self.keep_alive.interval_secs {
            return Err(validation_error(format!(
                "keep_alive.session_timeout_secs ({}) must exceed interval_secs ({})",
                self.keep_alive.session_timeout_secs, self.keep_alive.interval_secs
            )));
        }

        if self.token.rules.is_empty() {
            return Err(validation_error("token.rules cannot be empty"));
        }

        for rule in &self.token.rules {
            let regex = compile_pattern(&rule.pattern, &format!("token rule '{}'", rule.name))?;
            if regex.captures_len() < 2 {
                return Err(validation_error(format!(
                    "token rule '{}' has no capture group",
                    rule.name
                )));
            }
        }

        for pattern in &self.classification.error_patterns {
            compile_pattern(pattern, "error pattern")?;
        }

        Ok(())
    }
}

#[track_caller]
fn validation_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}

#[track_caller]
pub(crate) fn compile_pattern(pattern: &str, what: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| validation_error(format!("Invalid regex in {what}: {e}")))
}
