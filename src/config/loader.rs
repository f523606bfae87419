//! Configuration Loader
//!
//! Layers, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. An optional settings file (TOML, YAML or JSON, detected from the extension)
//! 3. Environment variables prefixed `CROSSFLOW_`, nested with `__`
//!    (`CROSSFLOW_ENGINE__RETRY_ATTEMPTS=5`, `CROSSFLOW_HEALTH__INTERVAL_MS=10000`)
//!
//! The merged result is validated before it is returned.

use super::error::{ConfigResult, ConfigurationError};
use super::{HealthConfig, OrchestratorConfig};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "CROSSFLOW";

/// Everything read at orchestrator construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: OrchestratorConfig,
    pub health: HealthConfig,
}

impl Settings {
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        self.health.validate()
    }
}

/// Load settings from defaults, `path` (if given) and the environment.
pub fn load_settings(path: Option<&Path>) -> ConfigResult<Settings> {
    load_settings_with_env(path, Environment::with_prefix(ENV_PREFIX))
}

/// Like [`load_settings`] with an explicit environment source, so tests can
/// supply variables without touching the process environment.
pub fn load_settings_with_env(
    path: Option<&Path>,
    environment: Environment,
) -> ConfigResult<Settings> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(
            environment
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ConfigurationError::load_failed(source_name(path), e))?;

    let settings: Settings = config
        .try_deserialize()
        .map_err(|e| ConfigurationError::load_failed(source_name(path), e))?;

    settings.validate()?;

    debug!(
        source = %source_name(path),
        retry_attempts = settings.engine.retry_attempts,
        timeout_ms = settings.engine.timeout_ms,
        health_interval_ms = settings.health.interval_ms,
        "Configuration loaded"
    );

    Ok(settings)
}

fn source_name(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "environment".to_string(),
    }
}
