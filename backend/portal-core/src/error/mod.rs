pub mod auth;
pub mod config;
pub mod transport;

pub use auth::{AuthError, AuthFailureKind};
pub use config::ConfigError;
pub use transport::TransportError;

