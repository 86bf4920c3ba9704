//! Spans and finished-span records.
//!
//! # Design Decisions
//! - `Span::finish` consumes the span, so a span cannot be finished twice
//! - `FinishedSpan` has no mutators; once produced it only moves to the reporter
//! - Sentinel spans (`Span::noop`) accept tags and finishing but record nothing

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::propagation::identity::TraceIdentity;

/// Standard tag keys.
pub mod tags {
    pub const SPAN_KIND: &str = "span.kind";
    pub const COMPONENT: &str = "component";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const PEER_IPV4: &str = "peer.ipv4";
    pub const PEER_IPV6: &str = "peer.ipv6";
    pub const PEER_HOSTNAME: &str = "peer.hostname";
    pub const PEER_PORT: &str = "peer.port";
    pub const ERROR: &str = "error";
    pub const REQUEST_ERRORS: &str = "request.errors";
    pub const REQUEST_CANCELLED: &str = "request.cancelled";
    pub const FORWARDED_FOR: &str = "http.headers.x-forwarded-for";
    pub const USER_AGENT: &str = "http.headers.user-agent";
    pub const REQUEST_TIME: &str = "request.time";
    pub const SERVER_MODE: &str = "http.server.mode";
}

/// Which side of an RPC a span describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Server,
    Client,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Server => "server",
            SpanKind::Client => "client",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::String(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<u16> for TagValue {
    fn from(v: u16) -> Self {
        TagValue::Int(v as i64)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => f.write_str(s),
            TagValue::Int(i) => write!(f, "{}", i),
            TagValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// An in-flight span.
#[derive(Debug)]
pub struct Span {
    identity: TraceIdentity,
    operation_name: String,
    kind: SpanKind,
    start_time: SystemTime,
    tags: BTreeMap<String, TagValue>,
    max_tag_value_length: usize,
    service_name: String,
    recording: bool,
}

impl Span {
    pub(crate) fn start(
        service_name: &str,
        identity: TraceIdentity,
        operation_name: impl Into<String>,
        kind: SpanKind,
        start_time: SystemTime,
        max_tag_value_length: usize,
    ) -> Self {
        let mut span = Self {
            identity,
            operation_name: operation_name.into(),
            kind,
            start_time,
            tags: BTreeMap::new(),
            max_tag_value_length,
            service_name: service_name.to_string(),
            recording: true,
        };
        span.set_tag(tags::SPAN_KIND, kind.as_str());
        span
    }

    /// A sentinel span: no identity, records nothing, reports nothing.
    pub fn noop() -> Self {
        Self {
            identity: TraceIdentity::invalid(),
            operation_name: String::new(),
            kind: SpanKind::Client,
            start_time: SystemTime::UNIX_EPOCH,
            tags: BTreeMap::new(),
            max_tag_value_length: 0,
            service_name: String::new(),
            recording: false,
        }
    }

    /// Set a tag, truncating string values to the tracer's limit.
    pub fn set_tag(&mut self, key: &str, value: impl Into<TagValue>) {
        if !self.recording {
            return;
        }
        let value = match value.into() {
            TagValue::String(s) => TagValue::String(truncate(s, self.max_tag_value_length)),
            other => other,
        };
        self.tags.insert(key.to_string(), value);
    }

    pub fn identity(&self) -> &TraceIdentity {
        &self.identity
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    /// False for sentinel spans.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Close the span at `end_time`. Sentinel spans produce nothing.
    pub fn finish(self, end_time: SystemTime) -> Option<FinishedSpan> {
        if !self.recording {
            return None;
        }
        // Clock skew must not produce an end before the start.
        let end_time = end_time.max(self.start_time);
        Some(FinishedSpan {
            service_name: self.service_name,
            identity: self.identity,
            operation_name: self.operation_name,
            kind: self.kind,
            start_time: self.start_time,
            end_time,
            tags: self.tags,
        })
    }
}

fn truncate(mut value: String, max: usize) -> String {
    if value.len() <= max {
        return value;
    }
    let mut cut = max;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    value.truncate(cut);
    value
}

/// A closed span, ready for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    pub service_name: String,
    pub identity: TraceIdentity,
    pub operation_name: String,
    pub kind: SpanKind,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub tags: BTreeMap<String, TagValue>,
}

impl FinishedSpan {
    pub fn duration(&self) -> Duration {
        self.end_time
            .duration_since(self.start_time)
            .unwrap_or_default()
    }

    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }
}
