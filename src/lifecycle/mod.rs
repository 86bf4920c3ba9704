//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → Tracer → Propagation engine → HTTP server
//!
//! Shutdown (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → Stop accepting → Drain requests
//!     → Flush spans → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: tracer before anything that creates spans
//! - Ordered shutdown: spans are flushed only after the server has drained
//! - Span flush has a timeout: never blocks exit indefinitely

pub mod signals;
pub mod startup;

pub use signals::Shutdown;
pub use startup::Application;
