//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (metrics, span reporter)
//! - Bind listeners and begin accepting traffic
//! - Flush the tracer once the server has stopped
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Order: metrics → tracer → propagation engine → HTTP server
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{SamplerType, TraceConfig};
use crate::error::Error;
use crate::http::HttpServer;
use crate::observability::metrics;
use crate::propagation::PropagationEngine;
use crate::tracer::{Closer, ConstSampler, SamplingPolicy, SpanSink, TracerFacade};

/// A fully wired service, ready to serve.
pub struct Application {
    facade: TracerFacade,
    closer: Closer,
    engine: PropagationEngine,
    server: HttpServer,
}

impl Application {
    /// Build every subsystem from `config`, reporting spans as configured.
    /// Must run inside a tokio runtime.
    pub fn build(config: TraceConfig) -> Result<Self, Error> {
        Self::build_inner(config, None)
    }

    /// Like `build`, with spans going to `sink`.
    pub fn build_with_sink(config: TraceConfig, sink: Arc<dyn SpanSink>) -> Result<Self, Error> {
        Self::build_inner(config, Some(sink))
    }

    fn build_inner(config: TraceConfig, sink: Option<Arc<dyn SpanSink>>) -> Result<Self, Error> {
        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse::<SocketAddr>() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(_) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let facade = TracerFacade::new().with_max_tag_value_length(config.tags.max_value_length);
        let sampler = sampler_from_config(&config);
        let (tracer, closer) = match sink {
            Some(sink) => facade.initialize_with_sink(
                &config.service.name,
                sampler,
                &config.reporter,
                sink,
            )?,
            None => facade.initialize(&config.service.name, sampler, &config.reporter)?,
        };

        let engine = PropagationEngine::new(tracer);
        let server = HttpServer::new(config, engine.clone())?;

        Ok(Self {
            facade,
            closer,
            engine,
            server,
        })
    }

    pub fn engine(&self) -> &PropagationEngine {
        &self.engine
    }

    pub fn facade(&self) -> &TracerFacade {
        &self.facade
    }

    pub fn server(&self) -> &HttpServer {
        &self.server
    }

    /// Serve on `listener` until `shutdown` fires, then flush the tracer.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), Error> {
        let Self {
            facade,
            closer,
            server,
            ..
        } = self;

        let served = server.run(listener, shutdown).await;
        facade.shutdown(closer).await;
        served.map_err(Error::from)
    }
}

fn sampler_from_config(config: &TraceConfig) -> Arc<dyn SamplingPolicy> {
    match config.sampler.sampler_type {
        SamplerType::Const => Arc::new(ConstSampler::new(config.sampler.param >= 1.0)),
    }
}
