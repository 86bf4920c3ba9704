//! HTTP adapter subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware.rs (server span, ActiveSpanContext into extensions)
//!     → handler (extract.rs: CurrentSpan)
//!         → client.rs (client span, headers injected, reqwest call)
//!     → middleware.rs (status + errors tagged, span reported)
//!     → Send to client
//! ```
//!
//! The propagation core knows nothing about axum or reqwest; this module is
//! the only place that does.

pub mod client;
pub mod extract;
pub mod middleware;
pub mod server;

pub use client::TracedClient;
pub use extract::CurrentSpan;
pub use middleware::{trace_middleware, ErrorSummary, TRACE_ID_HEADER};
pub use server::HttpServer;
