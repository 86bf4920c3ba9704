//! Tracer subsystem.
//!
//! # Data Flow
//! ```text
//! facade.rs (lifecycle: Uninitialized → Ready → Shutdown)
//!     → instance.rs (Tracer: start spans, extract/inject, report)
//!     → span.rs (Span → FinishedSpan)
//!     → reporter.rs (bounded queue → flush task → SpanSink)
//! ```
//!
//! # Design Decisions
//! - One tracer per process, created explicitly and shared as `Arc<Tracer>`
//! - Sampling decided at root creation (sampler.rs), inherited by children
//! - Reporting is fire-and-forget; failures are counted, never propagated

pub mod facade;
pub mod instance;
pub mod reporter;
pub mod sampler;
pub mod span;

pub use facade::{Closer, TracerError, TracerFacade};
pub use instance::{Tracer, TracerHandle};
pub use reporter::{LoggingSink, MemorySink, NullSink, ReportError, SinkError, SpanSink};
pub use sampler::{ConstSampler, SamplingPolicy};
pub use span::{FinishedSpan, Span, SpanKind, TagValue};
