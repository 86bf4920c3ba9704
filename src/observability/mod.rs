//! Observability of the service itself.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters for the span pipeline)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! Distributed tracing spans are not part of this module; see `tracer` and
//! `propagation`.

pub mod logging;
pub mod metrics;
