//! Propagation engine.
//!
//! # Responsibilities
//! - Join or root a trace for every inbound request (server span)
//! - Hand the active span to the handler as an explicit `ActiveSpanContext`
//! - Bracket outbound calls with client spans and inject their identity
//! - Finalize spans with outcome tags
//!
//! # Design Decisions
//! - Tracing never fails the request: decode errors root a new trace,
//!   a missing parent context yields a sentinel span
//! - The active span is passed explicitly; there is no ambient lookup
//! - Ordering between server and client spans of one request is the caller's
//!   contract and is not enforced here

use chrono::{DateTime, SecondsFormat, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;
use url::Url;

use crate::observability::metrics;
use crate::propagation::carrier::HeaderCarrier;
use crate::propagation::codec::DecodeError;
use crate::propagation::identity::{TraceId, TraceIdentity};
use crate::tracer::span::{tags, Span, SpanKind};
use crate::tracer::TracerHandle;

/// Component tag of server spans.
pub const SERVER_COMPONENT: &str = "http-server";

/// Component tag of client spans.
pub const CLIENT_COMPONENT: &str = "http-client";

/// Build profile reported as `http.server.mode` on server spans.
pub const SERVER_MODE: &str = if cfg!(debug_assertions) {
    "debug"
} else {
    "release"
};

/// Read-only view of the span driving the current request.
///
/// Cheap to clone; stored in request extensions for the lifetime of one
/// request and passed to anything that starts child spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSpanContext {
    inner: Arc<ActiveSpan>,
}

#[derive(Debug, PartialEq, Eq)]
struct ActiveSpan {
    identity: TraceIdentity,
    operation_name: String,
}

impl ActiveSpanContext {
    fn of(span: &Span) -> Self {
        Self {
            inner: Arc::new(ActiveSpan {
                identity: span.identity().clone(),
                operation_name: span.operation_name().to_string(),
            }),
        }
    }

    pub fn identity(&self) -> &TraceIdentity {
        &self.inner.identity
    }

    pub fn trace_id(&self) -> TraceId {
        self.inner.identity.trace_id
    }

    pub fn operation_name(&self) -> &str {
        &self.inner.operation_name
    }

    /// `trace:span:parent:flags`, suitable for logs and response headers.
    pub fn to_header_value(&self) -> String {
        self.inner.identity.to_string()
    }
}

/// Inbound request metadata consumed by `on_request_start`.
#[derive(Debug)]
pub struct InboundRequest<'a, C: HeaderCarrier + ?Sized> {
    pub headers: &'a C,
    pub url_path: &'a str,
    pub method: &'a str,
    pub remote_ip: Option<IpAddr>,
}

/// Creates and finalizes spans around request lifecycles.
#[derive(Debug, Clone)]
pub struct PropagationEngine {
    tracer: TracerHandle,
}

impl PropagationEngine {
    pub fn new(tracer: TracerHandle) -> Self {
        Self { tracer }
    }

    pub fn tracer(&self) -> &TracerHandle {
        &self.tracer
    }

    /// Lifecycle entry point used by framework adapters.
    pub fn on_request_start<C>(&self, request: &InboundRequest<'_, C>) -> (Span, ActiveSpanContext)
    where
        C: HeaderCarrier + ?Sized,
    {
        self.begin_server_span(
            request.headers,
            request.url_path,
            request.method,
            request.remote_ip,
            SystemTime::now(),
        )
    }

    /// Lifecycle exit point used by framework adapters.
    pub fn on_request_end(&self, span: Span, status_code: u16, error_summary: Option<&str>) {
        self.finish_server_span(span, status_code, error_summary, SystemTime::now());
    }

    /// Start the server span of an inbound request, named after its path.
    pub fn begin_server_span<C>(
        &self,
        headers: &C,
        url_path: &str,
        method: &str,
        remote_ip: Option<IpAddr>,
        now: SystemTime,
    ) -> (Span, ActiveSpanContext)
    where
        C: HeaderCarrier + ?Sized,
    {
        self.begin_server_span_named(url_path, headers, url_path, method, remote_ip, now)
    }

    /// Like `begin_server_span` with a caller-chosen operation name.
    pub fn begin_server_span_named<C>(
        &self,
        operation_name: &str,
        headers: &C,
        url_path: &str,
        method: &str,
        remote_ip: Option<IpAddr>,
        now: SystemTime,
    ) -> (Span, ActiveSpanContext)
    where
        C: HeaderCarrier + ?Sized,
    {
        let parent = match self.tracer.extract(headers) {
            Ok(parent) => Some(parent),
            Err(DecodeError::Absent) => None,
            Err(e) => {
                metrics::record_decode_failure();
                tracing::warn!(error = %e, path = %url_path, "Ignoring malformed trace header, starting new trace");
                None
            }
        };

        let mut span = self
            .tracer
            .start_span(operation_name, SpanKind::Server, parent.as_ref(), now);
        span.set_tag(tags::HTTP_URL, url_path);
        span.set_tag(tags::HTTP_METHOD, method);
        match remote_ip {
            Some(IpAddr::V4(ip)) => span.set_tag(tags::PEER_IPV4, ip.to_string()),
            Some(IpAddr::V6(ip)) => span.set_tag(tags::PEER_IPV6, ip.to_string()),
            None => {}
        }
        span.set_tag(tags::COMPONENT, SERVER_COMPONENT);
        span.set_tag(tags::REQUEST_TIME, rfc3339(now));
        span.set_tag(tags::SERVER_MODE, SERVER_MODE);
        if let Some(forwarded) = headers.get("x-forwarded-for") {
            span.set_tag(tags::FORWARDED_FOR, forwarded);
        }
        if let Some(agent) = headers.get("user-agent") {
            span.set_tag(tags::USER_AGENT, agent);
        }

        tracing::trace!(
            trace_id = %span.identity().trace_id,
            span_id = %span.identity().span_id,
            joined = parent.is_some(),
            "Server span started"
        );

        let context = ActiveSpanContext::of(&span);
        (span, context)
    }

    /// Record the outcome of the request and report the server span.
    pub fn finish_server_span(
        &self,
        mut span: Span,
        status_code: u16,
        error_summary: Option<&str>,
        now: SystemTime,
    ) {
        let errors = error_summary.unwrap_or_default();
        span.set_tag(tags::HTTP_STATUS_CODE, status_code);
        span.set_tag(tags::REQUEST_ERRORS, errors);
        if status_code >= 500 || !errors.is_empty() {
            span.set_tag(tags::ERROR, true);
        }
        self.report(span, now);
    }

    /// Report a server span whose request never produced a response
    /// (timeout, client disconnect, panic).
    pub fn cancel_server_span(&self, mut span: Span, reason: &str, now: SystemTime) {
        span.set_tag(tags::REQUEST_CANCELLED, true);
        span.set_tag(tags::REQUEST_ERRORS, reason);
        span.set_tag(tags::ERROR, true);
        self.report(span, now);
    }

    /// Start a client span for an outbound call and inject it into
    /// `outbound_headers`.
    ///
    /// Without a parent context this returns `Span::noop()` and leaves the
    /// headers untouched.
    pub fn begin_client_span<C>(
        &self,
        parent_context: Option<&ActiveSpanContext>,
        outbound_headers: &mut C,
        url: &str,
        method: &str,
        now: SystemTime,
    ) -> Span
    where
        C: HeaderCarrier + ?Sized,
    {
        let Some(parent) = parent_context else {
            return Span::noop();
        };

        let target = OutboundTarget::parse(url);
        let mut span = self.tracer.start_span(
            &target.path,
            SpanKind::Client,
            Some(parent.identity()),
            now,
        );
        span.set_tag(tags::COMPONENT, CLIENT_COMPONENT);
        span.set_tag(tags::HTTP_METHOD, method);
        span.set_tag(tags::HTTP_URL, url);
        if let Some(host) = target.host {
            span.set_tag(tags::PEER_HOSTNAME, host);
        }
        if let Some(port) = target.port {
            span.set_tag(tags::PEER_PORT, port);
        }

        self.tracer.inject(span.identity(), outbound_headers);
        span
    }

    /// Report a client span. Call even when the outbound call failed.
    pub fn finish_client_span(&self, span: Span, now: SystemTime) {
        self.report(span, now);
    }

    /// Report a client span together with what the call produced.
    pub fn finish_client_span_with_outcome(
        &self,
        mut span: Span,
        status_code: Option<u16>,
        error: Option<&str>,
        now: SystemTime,
    ) {
        if let Some(status) = status_code {
            span.set_tag(tags::HTTP_STATUS_CODE, status);
            if status >= 500 {
                span.set_tag(tags::ERROR, true);
            }
        }
        if let Some(error) = error {
            span.set_tag(tags::ERROR, true);
            span.set_tag(tags::REQUEST_ERRORS, error);
        }
        self.report(span, now);
    }

    fn report(&self, span: Span, now: SystemTime) {
        if let Some(finished) = span.finish(now) {
            self.tracer.report(finished);
        }
    }
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Host, port and path of an outbound URL, as far as they can be recovered.
#[derive(Debug, Default, PartialEq, Eq)]
struct OutboundTarget {
    host: Option<String>,
    port: Option<u16>,
    path: String,
}

impl OutboundTarget {
    fn parse(raw: &str) -> Self {
        if let Ok(url) = Url::parse(raw) {
            return Self {
                host: url.host_str().map(str::to_string),
                port: url.port(),
                path: url.path().to_string(),
            };
        }

        // Url rejects e.g. non-numeric ports; recover what we can by hand.
        let rest = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let authority = authority.rsplit('@').next().unwrap_or(authority);
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().ok()),
            None => (authority, None),
        };
        let path = path.split(['?', '#']).next().unwrap_or("/");

        Self {
            host: (!host.is_empty()).then(|| host.to_string()),
            port,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        }
    }
}
