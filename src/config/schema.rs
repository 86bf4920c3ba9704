//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the traced
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TraceConfig {
    /// Service identity reported with every span.
    pub service: ServiceConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Sampling policy.
    pub sampler: SamplerConfig,

    /// Span reporting pipeline.
    pub reporter: ReporterConfig,

    /// Tag limits.
    pub tags: TagConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Downstream service called by the demo `/ping` handler.
    pub downstream: DownstreamConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name attached to every reported span.
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "trace-propagation".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Supported sampler types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplerType {
    /// Same decision for every trace: `param` 1 samples, 0 does not.
    #[default]
    Const,
}

/// Sampling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplerConfig {
    #[serde(rename = "type")]
    pub sampler_type: SamplerType,

    /// Sampler parameter; for `const` either 0 or 1.
    pub param: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sampler_type: SamplerType::Const,
            param: 1.0,
        }
    }
}

/// Output format for logs and logged spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Span reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Emit finished spans as log events. When false, spans are discarded.
    pub log_spans: bool,

    /// Format of logged spans.
    pub log_format: LogFormat,

    /// Maximum number of spans waiting to be exported.
    pub queue_size: usize,

    /// Spans exported per sink call.
    pub batch_size: usize,

    /// Export interval for partial batches, in milliseconds.
    pub flush_interval_ms: u64,

    /// Upper bound on the final flush at shutdown, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            log_spans: true,
            log_format: LogFormat::Text,
            queue_size: 1000,
            batch_size: 100,
            flush_interval_ms: 1000,
            shutdown_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TagConfig {
    /// String tag values longer than this are truncated.
    pub max_value_length: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            max_value_length: 65535,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout of outbound calls in seconds.
    pub outbound_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            outbound_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// URL requested by `/ping`.
    pub hello_url: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            hello_url: "http://localhost:8080/hello".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Expose a Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "trace_propagation=info,tower_http=info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
