//! Sampling policy.
//!
//! The decision is taken once, when a root span is created, and travels with
//! the trace in the `sampled` flag. Child spans never consult the policy.

use crate::propagation::identity::TraceId;

/// Decides whether a new trace is recorded.
pub trait SamplingPolicy: Send + Sync {
    fn should_sample(&self, trace_id: TraceId, operation_name: &str) -> bool;
}

/// Samples all traces or none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstSampler {
    decision: bool,
}

impl ConstSampler {
    pub fn new(decision: bool) -> Self {
        Self { decision }
    }

    pub fn always() -> Self {
        Self::new(true)
    }

    pub fn never() -> Self {
        Self::new(false)
    }
}

impl Default for ConstSampler {
    fn default() -> Self {
        Self::always()
    }
}

impl SamplingPolicy for ConstSampler {
    fn should_sample(&self, _trace_id: TraceId, _operation_name: &str) -> bool {
        self.decision
    }
}
