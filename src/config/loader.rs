//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::TraceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub service_name: Option<String>,
    pub bind_address: Option<String>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut TraceConfig) {
        if let Some(name) = self.service_name {
            config.service.name = name;
        }
        if let Some(bind) = self.bind_address {
            config.listener.bind_address = bind;
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<TraceConfig, ConfigError> {
    resolve_config(Some(path), ConfigOverrides::default())
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<TraceConfig, ConfigError> {
    let config: TraceConfig = toml::from_str(content)?;
    validated(config)
}

/// Read `path` (defaults when `None`), apply `overrides`, then validate the
/// result once.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<TraceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str::<TraceConfig>(&fs::read_to_string(path)?)?,
        None => TraceConfig::default(),
    };
    overrides.apply(&mut config);
    validated(config)
}

fn validated(config: TraceConfig) -> Result<TraceConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
