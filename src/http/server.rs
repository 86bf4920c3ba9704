//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the example handlers
//! - Wire up middleware (span propagation, timeout, request logging)
//! - Bind server to listener
//! - Issue traced outbound calls from handlers
//!
//! # Routes
//! - `GET /ping`: calls the configured downstream `/hello`, answers `pong`
//! - `GET /hello`: answers `world`

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::TraceConfig;
use crate::http::client::TracedClient;
use crate::http::extract::CurrentSpan;
use crate::http::middleware::{trace_middleware, ErrorSummary};
use crate::propagation::PropagationEngine;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: TracedClient,
    pub hello_url: String,
}

/// HTTP server of the example service.
pub struct HttpServer {
    router: Router,
    config: TraceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: TraceConfig, engine: PropagationEngine) -> Result<Self, reqwest::Error> {
        let client = TracedClient::new(
            engine.clone(),
            Duration::from_secs(config.timeouts.outbound_secs),
        )?;
        let state = AppState {
            client,
            hello_url: config.downstream.hello_url.clone(),
        };

        let router = Self::build_router(&config, engine, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The timeout sits outside the tracing middleware so that a timed-out
    /// request still finishes its span (as cancelled).
    #[allow(deprecated)]
    fn build_router(config: &TraceConfig, engine: PropagationEngine, state: AppState) -> Router {
        Router::new()
            .route("/ping", get(ping_handler))
            .route("/hello", get(hello_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .layer(middleware::from_fn_with_state(engine, trace_middleware)),
            )
    }

    /// The router, for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }
}

/// Calls the downstream `/hello` under the current span.
async fn ping_handler(
    State(state): State<AppState>,
    CurrentSpan(span): CurrentSpan,
) -> Response {
    let pong = Json(json!({ "message": "pong" })).into_response();

    match state.client.get(span.as_ref(), &state.hello_url).await {
        Ok(response) if response.status().is_success() => pong,
        Ok(response) => {
            let summary = format!("downstream returned {}", response.status());
            tracing::warn!(url = %state.hello_url, status = %response.status(), "Downstream call unsuccessful");
            ErrorSummary::new(summary).attach(pong)
        }
        Err(e) => {
            tracing::warn!(url = %state.hello_url, error = %e, "Downstream call failed");
            ErrorSummary::new(format!("downstream call failed: {}", e)).attach(pong)
        }
    }
}

async fn hello_handler() -> impl IntoResponse {
    Json(json!({ "message": "world" }))
}
