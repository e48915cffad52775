mod authenticator;
mod config;
mod error;
mod helpers;
mod session;
