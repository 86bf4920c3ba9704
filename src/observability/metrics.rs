//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tracing_spans_started_total` (counter): spans created, by kind
//! - `tracing_spans_reported_total` (counter): spans accepted by the sink
//! - `tracing_spans_dropped_total` (counter): spans lost, by reason
//! - `tracing_decode_failures_total` (counter): malformed inbound trace headers
//! - `tracing_sink_errors_total` (counter): failed sink exports/flushes
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exposition is optional and configured at startup

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_span_started(kind: &'static str) {
    counter!("tracing_spans_started_total", "kind" => kind).increment(1);
}

pub fn record_spans_reported(count: usize) {
    counter!("tracing_spans_reported_total").increment(count as u64);
}

pub fn record_span_dropped(reason: &'static str) {
    record_span_dropped_n(reason, 1);
}

pub fn record_span_dropped_n(reason: &'static str, count: usize) {
    counter!("tracing_spans_dropped_total", "reason" => reason).increment(count as u64);
}

pub fn record_decode_failure() {
    counter!("tracing_decode_failures_total").increment(1);
}

pub fn record_sink_error() {
    counter!("tracing_sink_errors_total").increment(1);
}
