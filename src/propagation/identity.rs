//! Trace identity types.
//!
//! # Responsibilities
//! - Strongly typed trace and span identifiers
//! - Random, non-zero id generation
//! - The immutable `TraceIdentity` carried across process boundaries

use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

/// 128-bit trace identifier. Zero is reserved as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u128);

impl TraceId {
    pub const INVALID: TraceId = TraceId(0);

    /// Generate a random, non-zero trace id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let value: u128 = rng.gen();
            if value != 0 {
                return Self(value);
            }
        }
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Parse from 1 to 32 hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() || hex.len() > 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u128::from_str_radix(hex, 16).ok().map(Self)
    }

    /// Lowercase hex: 16 digits for 64-bit ids, 32 when the high half is set.
    pub fn to_hex(&self) -> String {
        if self.0 >> 64 == 0 {
            format!("{:016x}", self.0)
        } else {
            format!("{:032x}", self.0)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 64-bit span identifier. Zero is reserved as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(u64);

impl SpanId {
    pub const INVALID: SpanId = SpanId(0);

    /// Generate a random, non-zero span id.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(1..=u64::MAX))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse from 1 to 16 hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() || hex.len() > 16 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Position of a span within a trace tree, plus the baggage that travels with it.
///
/// Values are immutable once built; the `with_*` methods return new identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceIdentity {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    /// `None` for the root span of a trace.
    pub parent_span_id: Option<SpanId>,
    pub sampled: bool,
    pub baggage: BTreeMap<String, String>,
}

impl TraceIdentity {
    /// Identity of a fresh root span.
    pub fn new_root(sampled: bool) -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            parent_span_id: None,
            sampled,
            baggage: BTreeMap::new(),
        }
    }

    /// Identity of a new child of `self`: same trace, same sampling decision,
    /// same baggage, fresh span id.
    pub fn new_child(&self) -> Self {
        let mut span_id = SpanId::generate();
        while span_id == self.span_id {
            span_id = SpanId::generate();
        }
        Self {
            trace_id: self.trace_id,
            span_id,
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
            baggage: self.baggage.clone(),
        }
    }

    /// The all-zero identity used by sentinel spans.
    pub fn invalid() -> Self {
        Self {
            trace_id: TraceId::INVALID,
            span_id: SpanId::INVALID,
            parent_span_id: None,
            sampled: false,
            baggage: BTreeMap::new(),
        }
    }

    pub fn with_baggage_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }

    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.sampled = sampled;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

impl fmt::Display for TraceIdentity {
    /// `trace:span:parent:flags`, the same layout the header uses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self.parent_span_id.map(|p| p.as_u64()).unwrap_or(0);
        write!(
            f,
            "{}:{}:{:x}:{:x}",
            self.trace_id,
            self.span_id,
            parent,
            if self.sampled { 1 } else { 0 }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_non_zero() {
        for _ in 0..1000 {
            assert!(TraceId::generate().is_valid());
            assert!(SpanId::generate().is_valid());
        }
    }

    #[test]
    fn hex_parsing_rejects_garbage() {
        assert_eq!(TraceId::from_hex("abc123"), Some(TraceId::from_u128(0xabc123)));
        assert_eq!(TraceId::from_hex(""), None);
        assert_eq!(TraceId::from_hex("+abc"), None);
        assert_eq!(TraceId::from_hex("xyz"), None);
        assert_eq!(TraceId::from_hex(&"f".repeat(33)), None);
        assert_eq!(SpanId::from_hex(&"1".repeat(17)), None);
        assert_eq!(SpanId::from_hex("1"), Some(SpanId::from_u64(1)));
    }

    #[test]
    fn trace_id_hex_width() {
        assert_eq!(TraceId::from_u128(0xdeadbeef).to_hex(), "00000000deadbeef");
        assert_eq!(TraceId::from_u128(1 << 64).to_hex().len(), 32);
    }

    #[test]
    fn child_keeps_trace_and_baggage() {
        let root = TraceIdentity::new_root(true).with_baggage_item("tenant", "acme");
        let child = root.new_child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));
        assert_ne!(child.span_id, root.span_id);
        assert!(child.sampled);
        assert_eq!(child.baggage.get("tenant").map(String::as_str), Some("acme"));
    }
}
