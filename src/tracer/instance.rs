//! The tracer: span creation, extract/inject, reporting.

use std::sync::Arc;
use std::time::SystemTime;

use crate::observability::metrics;
use crate::propagation::carrier::HeaderCarrier;
use crate::propagation::codec::{self, DecodeError};
use crate::propagation::identity::TraceIdentity;
use crate::tracer::reporter::Reporter;
use crate::tracer::sampler::SamplingPolicy;
use crate::tracer::span::{FinishedSpan, Span, SpanKind};

/// Shared handle to a tracer.
pub type TracerHandle = Arc<Tracer>;

/// Default upper bound for string tag values.
pub const DEFAULT_MAX_TAG_VALUE_LENGTH: usize = 65535;

pub struct Tracer {
    service_name: String,
    sampler: Arc<dyn SamplingPolicy>,
    reporter: Reporter,
    max_tag_value_length: usize,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("service_name", &self.service_name)
            .field("max_tag_value_length", &self.max_tag_value_length)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    pub(crate) fn new(
        service_name: String,
        sampler: Arc<dyn SamplingPolicy>,
        reporter: Reporter,
        max_tag_value_length: usize,
    ) -> Self {
        Self {
            service_name,
            sampler,
            reporter,
            max_tag_value_length,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Start a span. With a parent the span joins the parent's trace and
    /// inherits its sampling decision; without one it roots a new trace and
    /// the sampling policy decides.
    pub fn start_span(
        &self,
        operation_name: &str,
        kind: SpanKind,
        parent: Option<&TraceIdentity>,
        now: SystemTime,
    ) -> Span {
        let identity = match parent {
            Some(parent) => parent.new_child(),
            None => {
                let root = TraceIdentity::new_root(true);
                let sampled = self.sampler.should_sample(root.trace_id, operation_name);
                root.with_sampled(sampled)
            }
        };
        metrics::record_span_started(kind.as_str());
        Span::start(
            &self.service_name,
            identity,
            operation_name,
            kind,
            now,
            self.max_tag_value_length,
        )
    }

    /// Decode a propagated identity from inbound headers.
    pub fn extract<C>(&self, headers: &C) -> Result<TraceIdentity, DecodeError>
    where
        C: HeaderCarrier + ?Sized,
    {
        codec::decode(headers)
    }

    /// Encode `identity` into outbound headers.
    pub fn inject<C>(&self, identity: &TraceIdentity, headers: &mut C)
    where
        C: HeaderCarrier + ?Sized,
    {
        codec::encode(identity, headers)
    }

    /// Hand a finished span to the reporter. Failures are logged and swallowed.
    pub fn report(&self, span: FinishedSpan) {
        let span_id = span.identity.span_id;
        if let Err(e) = self.reporter.report(span) {
            tracing::debug!(span_id = %span_id, error = %e, "Dropping span");
        }
    }
}
