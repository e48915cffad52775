pub mod authenticator;
pub mod classify;
pub mod config;
pub mod error;
pub mod extraction;
pub mod keepalive;
pub mod log_sink;
pub mod transport;

#[cfg(test)]
mod tests;

pub use authenticator::{AuthAttemptResult, Credentials, PortalAuthenticator};
pub use config::PortalConfig;
pub use keepalive::{SessionKeepAlive, SessionState, TickOutcome};
pub use log_sink::{BufferedLogSink, LogCrateSink, LogSink};
pub use transport::PortalTransport;

pub const DEFAULT_GATEWAY_HOST: &str = "172.18.10.10";
pub const DEFAULT_GATEWAY_PORT: u16 = 8090;
pub const DEFAULT_GATEWAY_BASE_URL: &str =
    const_format::concatcp!("http://", DEFAULT_GATEWAY_HOST, ":", DEFAULT_GATEWAY_PORT);

/// Maximum characters of a response body copied into a log line.
pub const BODY_PREVIEW_LIMIT: usize = 200;
