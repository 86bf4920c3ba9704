//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TraceConfig (validated, immutable)
//!     → handed to startup, which builds the tracer and server from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, resolve_config, ConfigError, ConfigOverrides};
pub use schema::TraceConfig;
pub use schema::{
    DownstreamConfig, ListenerConfig, LogFormat, ObservabilityConfig, ReporterConfig,
    SamplerConfig, SamplerType, ServiceConfig, TagConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
