//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (queue sizes > 0, sampler params)
//! - Validate addresses and URLs before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TraceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{SamplerType, TraceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &TraceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    match config.sampler.sampler_type {
        SamplerType::Const => {
            if config.sampler.param != 0.0 && config.sampler.param != 1.0 {
                errors.push(ValidationError::new(
                    "sampler.param",
                    "const sampler expects 0 or 1",
                ));
            }
        }
    }

    let reporter = &config.reporter;
    if reporter.queue_size == 0 {
        errors.push(ValidationError::new("reporter.queue_size", "must be greater than 0"));
    }
    if reporter.batch_size == 0 {
        errors.push(ValidationError::new("reporter.batch_size", "must be greater than 0"));
    } else if reporter.batch_size > reporter.queue_size {
        errors.push(ValidationError::new(
            "reporter.batch_size",
            "must not exceed reporter.queue_size",
        ));
    }
    if reporter.flush_interval_ms == 0 {
        errors.push(ValidationError::new("reporter.flush_interval_ms", "must be greater than 0"));
    }
    if reporter.shutdown_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "reporter.shutdown_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.tags.max_value_length == 0 {
        errors.push(ValidationError::new("tags.max_value_length", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.outbound_secs == 0 {
        errors.push(ValidationError::new("timeouts.outbound_secs", "must be greater than 0"));
    }

    if url::Url::parse(&config.downstream.hello_url).is_err() {
        errors.push(ValidationError::new(
            "downstream.hello_url",
            format!("invalid URL {:?}", config.downstream.hello_url),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
