//! Built-in rule sets and portal variants.
//!
//! Gateways in the field differ in paths, token field names and quoting
//! style. Everything here is plain data; a deployment that needs something
//! else overrides it in `portal.toml`.

use super::{
    ClassificationConfig, EndpointConfig, FormFields, IndicatorMessage, KeepAliveConfig,
    PortalConfig, TokenConfig, TokenRule, TransportConfig,
};

use std::collections::BTreeMap;

/// Ordered token rules. Capture group 1 holds the token; first match wins.
const TOKEN_RULES: &[(&str, &str)] = &[
    (
        "csrf_token_input",
        r#"(?i)name\s*=\s*["']csrf_token["'][^>]*?value\s*=\s*["']([^"']+)["']"#,
    ),
    (
        "csrf_token_input_value_first",
        r#"(?i)value\s*=\s*["']([^"']+)["'][^>]*?name\s*=\s*["']csrf_token["']"#,
    ),
    (
        "underscore_token_input",
        r#"(?i)name\s*=\s*["']_token["'][^>]*?value\s*=\s*["']([^"']+)["']"#,
    ),
    (
        "magic_input",
        r#"(?i)name\s*=\s*["']magic["'][^>]*?value\s*=\s*["']([^"']+)["']"#,
    ),
    ("fgtauth_redirect", r#"fgtauth\?([0-9A-Za-z]+)"#),
    (
        "csrf_meta",
        r#"(?i)<meta[^>]*?name\s*=\s*["']csrf-token["'][^>]*?content\s*=\s*["']([^"']+)["']"#,
    ),
    (
        "json_key",
        r#"["'](?:csrf_token|csrf|_token|magic)["']\s*:\s*["']([^"']+)["']"#,
    ),
    ("bare_csrf", r#"\bcsrf(?:_token)?\s*[=:]\s*["']([^"']+)["']"#),
];

const POSITIVE_INDICATORS: &[&str] = &["success", "authenticated", "welcome", "keepalive?", "logout"];

const NEGATIVE_INDICATORS: &[&str] = &[
    "invalid",
    "incorrect",
    "failed",
    "error",
    "unauthorized",
    "concurrent authentication is over limit",
];

/// HTML containers that usually wrap the portal's own error text.
const ERROR_PATTERNS: &[&str] = &[
    r#"(?is)<div[^>]*class\s*=\s*["'][^"']*\b(?:error|alert|danger)\b[^"']*["'][^>]*>\s*([^<]+?)\s*<"#,
    r#"(?is)<span[^>]*class\s*=\s*["'][^"']*\berror\b[^"']*["'][^>]*>\s*([^<]+?)\s*<"#,
    r#"(?is)<p[^>]*class\s*=\s*["'][^"']*\b(?:error|message)\b[^"']*["'][^>]*>\s*([^<]+?)\s*<"#,
];

const ERROR_FALLBACKS: &[(&str, &str)] = &[
    (
        "concurrent authentication is over limit",
        "Concurrent authentication is over limit",
    ),
    ("invalid", "Invalid credentials"),
    ("incorrect", "Incorrect username or password"),
    ("unauthorized", "Unauthorized"),
    ("failed", "Authentication failed"),
    ("error", "The portal reported an error"),
];

pub(crate) const DEFAULT_ERROR_MESSAGE: &str = "Login failed";

pub(crate) const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub(crate) fn default_token_rules() -> Vec<TokenRule> {
    TOKEN_RULES
        .iter()
        .map(|(name, pattern)| TokenRule::new(*name, *pattern))
        .collect()
}

pub(crate) fn default_positive_indicators() -> Vec<String> {
    POSITIVE_INDICATORS.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_negative_indicators() -> Vec<String> {
    NEGATIVE_INDICATORS.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_error_patterns() -> Vec<String> {
    ERROR_PATTERNS.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_error_fallbacks() -> Vec<IndicatorMessage> {
    ERROR_FALLBACKS
        .iter()
        .map(|(indicator, message)| IndicatorMessage::new(*indicator, *message))
        .collect()
}

impl PortalConfig {
    /// Form login guarded by a `csrf_token` hidden input; GET and POST on `/login`.
    pub fn csrf_form(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointConfig {
                base_url: base_url.into(),
                challenge_path: "/login".to_string(),
                submit_path: "/login".to_string(),
                extra_fields: BTreeMap::new(),
            },
            fields: FormFields::new("username", "password", "csrf_token"),
            keep_alive: KeepAliveConfig {
                path: "/keep-alive".to_string(),
                ..KeepAliveConfig::default()
            },
            ..Self::base()
        }
    }

    /// Gateway that hands out a `magic` value on `/login?` and expects it
    /// back on `/` together with a `4Tredir` redirect target.
    pub fn magic_token(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let redirect_target = format!("{}/login?", base_url.trim_end_matches('/'));

        Self {
            endpoint: EndpointConfig {
                base_url,
                challenge_path: "/login?".to_string(),
                submit_path: "/".to_string(),
                extra_fields: BTreeMap::from([("4Tredir".to_string(), redirect_target)]),
            },
            fields: FormFields::new("username", "password", "magic"),
            keep_alive: KeepAliveConfig {
                path: "/keepalive?".to_string(),
                ..KeepAliveConfig::default()
            },
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            version: super::CONFIG_VERSION,
            endpoint: EndpointConfig::default(),
            fields: FormFields::default(),
            transport: TransportConfig::default(),
            token: TokenConfig::default(),
            classification: ClassificationConfig::default(),
            keep_alive: KeepAliveConfig::default(),
        }
    }
}
