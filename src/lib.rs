//! HTTP trace-context propagation.
//!
//! Extracts a trace identity from inbound requests, wraps each request in a
//! server span, hands the active span to handlers explicitly, and injects
//! child identities into outbound requests so downstream services continue
//! the same trace.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod propagation;
pub mod tracer;

pub use config::TraceConfig;
pub use error::Error;
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
pub use propagation::{ActiveSpanContext, PropagationEngine, TraceIdentity};
pub use tracer::{TracerFacade, TracerHandle};
