//! Trace-context propagation.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → codec.rs (decode uber-trace-id + uberctx-* baggage)
//!     → engine.rs (server span: child of the decoded identity, or a new root)
//!     → ActiveSpanContext (request extensions)
//!     → engine.rs (client span per outbound call)
//!     → codec.rs (encode into outbound headers)
//! ```
//!
//! # Design Decisions
//! - Decoding never fails a request; absent or malformed headers start a new trace
//! - Decode input and encode output are separate carriers
//! - Identities are immutable values; spans hold their own copy

pub mod carrier;
pub mod codec;
pub mod engine;
pub mod identity;

pub use carrier::HeaderCarrier;
pub use codec::{decode, encode, DecodeError, BAGGAGE_PREFIX, TRACE_HEADER};
pub use engine::{ActiveSpanContext, InboundRequest, PropagationEngine};
pub use identity::{SpanId, TraceId, TraceIdentity};
