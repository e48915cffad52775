//! Shared value types for the portal login workspace.
//!
//! This crate holds small data types used by more than one layer. It has no
//! networking and no business logic.
//!
//! ## Architecture
//!
//! - **common** (this crate): Error locations, status codes, secret wrappers
//! - **portal-core**: Authentication workflow and session keep-alive
//! - **portal-login**: Command-line front end wiring everything together

pub mod error;
pub mod http_status;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_secret::RedactedSecret;

#[cfg(test)]
mod tests;
