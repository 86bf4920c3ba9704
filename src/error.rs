//! Crate-level errors surfaced at startup.
//!
//! Request-path tracing failures never reach this type; they are logged and
//! counted where they happen.

use thiserror::Error;

use crate::config::ConfigError;
use crate::tracer::TracerError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("tracer error: {0}")]
    Tracer(#[from] TracerError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
