//! Wire codec for trace identities.
//!
//! # Format
//! ```text
//! uber-trace-id: {trace_id}:{span_id}:{parent_span_id}:{flags}
//! uberctx-{key}: {value}        (one header per baggage item)
//! ```
//! Baggage values are percent-encoded on the wire and unescaped on decode;
//! `+` decodes to a space.
//! All ids are lowercase hex. A parent id of `0` means "no parent". Only the
//! sampling bit (`0x01`) of the flags is carried; other bits are dropped on
//! decode and never written on encode.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::propagation::carrier::HeaderCarrier;
use crate::propagation::identity::{SpanId, TraceId, TraceIdentity};

/// Primary header carrying the encoded identity.
pub const TRACE_HEADER: &str = "uber-trace-id";

/// Prefix of baggage headers.
pub const BAGGAGE_PREFIX: &str = "uberctx-";

const FLAG_SAMPLED: u8 = 0x01;

/// Why an identity could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The primary header is missing. Start a new trace.
    #[error("trace header absent")]
    Absent,

    /// The primary header is present but unusable. Treated like `Absent`.
    #[error("malformed trace header {value:?}: {reason}")]
    Malformed { value: String, reason: &'static str },
}

/// Read a trace identity (and its baggage) from `headers`.
pub fn decode<C>(headers: &C) -> Result<TraceIdentity, DecodeError>
where
    C: HeaderCarrier + ?Sized,
{
    let raw = headers.get(TRACE_HEADER).ok_or(DecodeError::Absent)?;
    let mut identity = parse_trace_header(raw)?;
    identity.baggage = decode_baggage(headers);
    Ok(identity)
}

/// Write `identity` into `headers`.
///
/// Any trace header or baggage header already present is removed first, so an
/// outbound request never carries data from a previous hop.
pub fn encode<C>(identity: &TraceIdentity, headers: &mut C)
where
    C: HeaderCarrier + ?Sized,
{
    let stale: Vec<String> = headers
        .keys()
        .into_iter()
        .filter(|k| is_baggage_key(k) || k.eq_ignore_ascii_case(TRACE_HEADER))
        .map(str::to_string)
        .collect();
    for key in stale {
        headers.remove(&key);
    }

    headers.set(TRACE_HEADER, format_trace_header(identity));
    for (key, value) in &identity.baggage {
        headers.set(
            &format!("{}{}", BAGGAGE_PREFIX, key),
            urlencoding::encode(value).into_owned(),
        );
    }
}

fn format_trace_header(identity: &TraceIdentity) -> String {
    let parent = identity.parent_span_id.map(|p| p.as_u64()).unwrap_or(0);
    let flags = if identity.sampled { FLAG_SAMPLED } else { 0 };
    format!(
        "{}:{}:{:x}:{:x}",
        identity.trace_id.to_hex(),
        identity.span_id.to_hex(),
        parent,
        flags
    )
}

fn parse_trace_header(raw: &str) -> Result<TraceIdentity, DecodeError> {
    let malformed = |reason| DecodeError::Malformed {
        value: raw.to_string(),
        reason,
    };

    // Some clients URL-escape the value.
    let value = raw.trim().replace("%3A", ":").replace("%3a", ":");
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 4 {
        return Err(malformed("expected 4 colon-separated fields"));
    }

    let trace_id = TraceId::from_hex(parts[0]).ok_or_else(|| malformed("invalid trace id"))?;
    if !trace_id.is_valid() {
        return Err(malformed("trace id is zero"));
    }

    let span_id = SpanId::from_hex(parts[1]).ok_or_else(|| malformed("invalid span id"))?;
    if !span_id.is_valid() {
        return Err(malformed("span id is zero"));
    }

    let parent = SpanId::from_hex(parts[2]).ok_or_else(|| malformed("invalid parent span id"))?;

    let flags = parts[3];
    if flags.is_empty() || flags.len() > 2 || !flags.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed("invalid flags"));
    }
    let flags = u8::from_str_radix(flags, 16).map_err(|_| malformed("invalid flags"))?;

    Ok(TraceIdentity {
        trace_id,
        span_id,
        parent_span_id: parent.is_valid().then_some(parent),
        sampled: flags & FLAG_SAMPLED != 0,
        baggage: BTreeMap::new(),
    })
}

fn decode_baggage<C>(headers: &C) -> BTreeMap<String, String>
where
    C: HeaderCarrier + ?Sized,
{
    let mut baggage = BTreeMap::new();
    for key in headers.keys() {
        if !is_baggage_key(key) {
            continue;
        }
        let name = key[BAGGAGE_PREFIX.len()..].to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        if let Some(value) = headers.get(key) {
            baggage.insert(name, unescape_baggage(value));
        }
    }
    baggage
}

/// Values that are not valid escapes are kept as received.
fn unescape_baggage(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(value) => value.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn is_baggage_key(key: &str) -> bool {
    key.len() >= BAGGAGE_PREFIX.len()
        && key.as_bytes()[..BAGGAGE_PREFIX.len()].eq_ignore_ascii_case(BAGGAGE_PREFIX.as_bytes())
}
