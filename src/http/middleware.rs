//! Tracing middleware.
//!
//! # Responsibilities
//! - Start the server span before the handler runs (`on_request_start`)
//! - Expose the `ActiveSpanContext` to handlers via request extensions
//! - Finish the server span with the response status (`on_request_end`)
//!
//! # Design Decisions
//! - The span lives in a drop guard: if the handler panics or the request
//!   future is dropped (timeout, client gone) the span is still reported,
//!   tagged as cancelled
//! - Handlers report failures by attaching `ErrorSummary` to the response

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::SystemTime;

use crate::propagation::{InboundRequest, PropagationEngine};
use crate::tracer::Span;

/// Response header carrying the trace id of the server span.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Error description attached to a response by a handler; recorded as the
/// `request.errors` tag of the server span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSummary(pub String);

impl ErrorSummary {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Attach `self` to `response`.
    pub fn attach(self, mut response: Response) -> Response {
        response.extensions_mut().insert(self);
        response
    }
}

/// Holds a server span until the request completes.
struct ServerSpanGuard {
    engine: PropagationEngine,
    span: Option<Span>,
}

impl ServerSpanGuard {
    fn new(engine: PropagationEngine, span: Span) -> Self {
        Self {
            engine,
            span: Some(span),
        }
    }

    fn finish(mut self, status_code: u16, error_summary: Option<&str>) {
        if let Some(span) = self.span.take() {
            self.engine.on_request_end(span, status_code, error_summary);
        }
    }
}

impl Drop for ServerSpanGuard {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            let reason = if std::thread::panicking() {
                "handler panicked"
            } else {
                "request cancelled"
            };
            tracing::debug!(
                trace_id = %span.identity().trace_id,
                reason,
                "Server span finished without a response"
            );
            self.engine.cancel_server_span(span, reason, SystemTime::now());
        }
    }
}

/// Middleware function wrapping every request in a server span.
///
/// Install with `axum::middleware::from_fn_with_state(engine, trace_middleware)`.
pub async fn trace_middleware(
    State(engine): State<PropagationEngine>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let remote_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let path = request.uri().path().to_string();
    let method = request.method().to_string();

    let (span, context) = engine.on_request_start(&InboundRequest {
        headers: request.headers(),
        url_path: &path,
        method: &method,
        remote_ip,
    });
    let guard = ServerSpanGuard::new(engine, span);

    let trace_id = context.trace_id().to_hex();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;

    let error_summary = response
        .extensions()
        .get::<ErrorSummary>()
        .map(|summary| summary.0.clone());
    guard.finish(response.status().as_u16(), error_summary.as_deref());

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
