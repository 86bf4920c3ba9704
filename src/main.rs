//! Traced HTTP service.
//!
//! ```text
//!     Inbound request (uber-trace-id?)
//!         → trace middleware: extract or root, start server span
//!         → handler: CurrentSpan → TracedClient
//!               → client span, inject uber-trace-id → downstream
//!         → trace middleware: tag status, finish server span
//!         → reporter (batched, non-blocking) → log sink
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use trace_propagation::config::{resolve_config, ConfigOverrides};
use trace_propagation::lifecycle::{Application, Shutdown};
use trace_propagation::observability::logging;

#[derive(Parser)]
#[command(name = "trace-propagation")]
#[command(about = "HTTP service propagating uber-trace-id trace context", long_about = None)]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `service.name`
    #[arg(long)]
    service_name: Option<String>,

    /// Overrides `listener.bind_address`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(
        args.config.as_deref(),
        ConfigOverrides {
            service_name: args.service_name,
            bind_address: args.bind,
        },
    )?;

    logging::init_logging(&config.observability);

    tracing::info!(
        service = %config.service.name,
        bind_address = %config.listener.bind_address,
        sampler_param = config.sampler.param,
        log_spans = config.reporter.log_spans,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let app = Application::build(config)?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    shutdown.trigger_on_signal();

    app.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
