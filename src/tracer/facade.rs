//! Tracer lifecycle.
//!
//! # States
//! ```text
//! Uninitialized ──initialize──▶ Ready ──shutdown──▶ Shutdown
//! ```
//!
//! # Design Decisions
//! - The facade is an ordinary value, constructed at startup and passed to
//!   whoever needs a tracer; there is no hidden global
//! - A second `initialize` is rejected with `AlreadyInitialized`, never
//!   silently ignored
//! - Reads (`current_tracer`) are lock-free; transitions serialize on a mutex

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::ReporterConfig;
use crate::tracer::instance::{Tracer, TracerHandle, DEFAULT_MAX_TAG_VALUE_LENGTH};
use crate::tracer::reporter::{LoggingSink, NullSink, Reporter, ReporterCloser, SpanSink};
use crate::tracer::sampler::SamplingPolicy;

/// Tracer lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TracerError {
    #[error("tracer already initialized")]
    AlreadyInitialized,
    #[error("tracer not initialized")]
    NotInitialized,
    #[error("tracer has been shut down")]
    ShutDown,
    #[error("service name must not be empty")]
    InvalidServiceName,
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Ready(TracerHandle),
    Shutdown,
}

/// Flushes and releases the reporter of an initialized tracer.
///
/// Dropping a closer without calling `close` stops the flush task as well,
/// abandoning whatever is still queued.
#[derive(Debug)]
pub struct Closer {
    reporter: ReporterCloser,
}

impl Closer {
    /// Flush buffered spans, waiting at most the configured shutdown timeout.
    pub async fn close(self) {
        self.reporter.close().await;
    }
}

/// Owner of the process-wide tracer.
#[derive(Debug)]
pub struct TracerFacade {
    state: ArcSwap<State>,
    transition: Mutex<()>,
    max_tag_value_length: usize,
}

impl TracerFacade {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(State::Uninitialized),
            transition: Mutex::new(()),
            max_tag_value_length: DEFAULT_MAX_TAG_VALUE_LENGTH,
        }
    }

    /// Limit applied to string tag values of every span the tracer creates.
    pub fn with_max_tag_value_length(mut self, max: usize) -> Self {
        self.max_tag_value_length = max;
        self
    }

    /// Build the tracer, reporting to a log sink when `log_spans` is set and
    /// discarding spans otherwise.
    pub fn initialize(
        &self,
        service_name: &str,
        sampling_policy: Arc<dyn SamplingPolicy>,
        reporter_config: &ReporterConfig,
    ) -> Result<(TracerHandle, Closer), TracerError> {
        let sink: Arc<dyn SpanSink> = if reporter_config.log_spans {
            Arc::new(LoggingSink::new(reporter_config.log_format))
        } else {
            Arc::new(NullSink)
        };
        self.initialize_with_sink(service_name, sampling_policy, reporter_config, sink)
    }

    /// Build the tracer with an explicit sink. Must run inside a tokio runtime.
    pub fn initialize_with_sink(
        &self,
        service_name: &str,
        sampling_policy: Arc<dyn SamplingPolicy>,
        reporter_config: &ReporterConfig,
        sink: Arc<dyn SpanSink>,
    ) -> Result<(TracerHandle, Closer), TracerError> {
        if service_name.trim().is_empty() {
            return Err(TracerError::InvalidServiceName);
        }

        let _guard = self
            .transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match &**self.state.load() {
            State::Uninitialized => {}
            State::Ready(_) => return Err(TracerError::AlreadyInitialized),
            State::Shutdown => return Err(TracerError::ShutDown),
        }

        let (reporter, reporter_closer) = Reporter::spawn(reporter_config, sink);
        let tracer = Arc::new(Tracer::new(
            service_name.to_string(),
            sampling_policy,
            reporter,
            self.max_tag_value_length,
        ));
        self.state.store(Arc::new(State::Ready(tracer.clone())));

        tracing::info!(
            service = %service_name,
            queue_size = reporter_config.queue_size,
            log_spans = reporter_config.log_spans,
            "Tracer initialized"
        );

        Ok((
            tracer,
            Closer {
                reporter: reporter_closer,
            },
        ))
    }

    /// The active tracer.
    pub fn current_tracer(&self) -> Result<TracerHandle, TracerError> {
        match &**self.state.load() {
            State::Ready(tracer) => Ok(tracer.clone()),
            State::Uninitialized => Err(TracerError::NotInitialized),
            State::Shutdown => Err(TracerError::ShutDown),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(**self.state.load(), State::Ready(_))
    }

    /// Move to `Shutdown` and flush. Spans still in flight are reported if
    /// they finish before the flush completes and dropped otherwise.
    pub async fn shutdown(&self, closer: Closer) {
        {
            let _guard = self
                .transition
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.state.store(Arc::new(State::Shutdown));
        }
        tracing::info!("Tracer shutting down");
        closer.close().await;
    }
}

impl Default for TracerFacade {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::identity::TraceIdentity;
    use crate::tracer::reporter::MemorySink;
    use crate::tracer::sampler::ConstSampler;
    use crate::tracer::span::SpanKind;
    use std::time::SystemTime;

    fn sampler() -> Arc<dyn SamplingPolicy> {
        Arc::new(ConstSampler::always())
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let facade = TracerFacade::new();
        assert_eq!(
            facade.current_tracer().unwrap_err(),
            TracerError::NotInitialized
        );

        let (tracer, closer) = facade
            .initialize("svc", sampler(), &ReporterConfig::default())
            .unwrap();
        assert!(facade.is_ready());
        assert!(Arc::ptr_eq(&tracer, &facade.current_tracer().unwrap()));

        facade.shutdown(closer).await;
        assert_eq!(facade.current_tracer().unwrap_err(), TracerError::ShutDown);
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let facade = TracerFacade::new();
        let (tracer, closer) = facade
            .initialize("svc", sampler(), &ReporterConfig::default())
            .unwrap();

        let err = facade
            .initialize("other", sampler(), &ReporterConfig::default())
            .unwrap_err();
        assert_eq!(err, TracerError::AlreadyInitialized);
        assert_eq!(facade.current_tracer().unwrap().service_name(), "svc");
        assert_eq!(tracer.service_name(), "svc");

        facade.shutdown(closer).await;
        let err = facade
            .initialize("svc", sampler(), &ReporterConfig::default())
            .unwrap_err();
        assert_eq!(err, TracerError::ShutDown);
    }

    #[tokio::test]
    async fn empty_service_name_is_rejected() {
        let facade = TracerFacade::new();
        let err = facade
            .initialize("  ", sampler(), &ReporterConfig::default())
            .unwrap_err();
        assert_eq!(err, TracerError::InvalidServiceName);
        assert!(!facade.is_ready());
    }

    #[tokio::test]
    async fn shutdown_flushes_reported_spans() {
        let facade = TracerFacade::new();
        let sink = MemorySink::new();
        let (tracer, closer) = facade
            .initialize_with_sink(
                "svc",
                sampler(),
                &ReporterConfig::default(),
                Arc::new(sink.clone()),
            )
            .unwrap();

        let now = SystemTime::now();
        let root = tracer.start_span("/a", SpanKind::Server, None, now);
        let child = tracer.start_span("/b", SpanKind::Client, Some(root.identity()), now);
        tracer.report(child.finish(now).unwrap());
        tracer.report(root.finish(now).unwrap());

        facade.shutdown(closer).await;
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn never_sampler_marks_roots_unsampled() {
        let facade = TracerFacade::new();
        let sink = MemorySink::new();
        let (tracer, closer) = facade
            .initialize_with_sink(
                "svc",
                Arc::new(ConstSampler::never()),
                &ReporterConfig::default(),
                Arc::new(sink.clone()),
            )
            .unwrap();

        let now = SystemTime::now();
        let root = tracer.start_span("/a", SpanKind::Server, None, now);
        assert!(!root.identity().sampled);

        // A propagated sampled parent wins over the local policy.
        let parent = TraceIdentity::new_root(true);
        let child = tracer.start_span("/b", SpanKind::Server, Some(&parent), now);
        assert!(child.identity().sampled);

        tracer.report(root.finish(now).unwrap());
        tracer.report(child.finish(now).unwrap());
        facade.shutdown(closer).await;
        assert_eq!(sink.len(), 1);
    }
}
