//! # Orchestrator Configuration
//!
//! Tunable runtime parameters for the engine and the health monitor.
//!
//! - [`OrchestratorConfig`]: retry, timeout, batching and instrumentation toggles
//! - [`HealthConfig`]: probe interval, probe timeout and probe retries
//! - [`ConfigStore`]: shared, live-updatable holder of both
//! - [`loader`]: layered loading from defaults, an optional file and the environment
//!
//! Every operation snapshots the engine config when it starts, so an
//! [`ConfigStore::update`] affects the next invocation and never one that is
//! already running. The health monitor reads its settings at the start of
//! each cycle and re-arms its interval when `interval_ms` changes.

pub mod error;
pub mod loader;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{load_settings, Settings};

/// Delay growth between retry attempts of one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `retry_delay_ms` between every attempt.
    Fixed,
    /// `retry_delay_ms * multiplier^(retry - 1)`, capped at `max_delay_ms`.
    Exponential { multiplier: f64, max_delay_ms: u64 },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Fixed
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Retries after the initial attempt of a step.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Per-step timeout. An elapsed timeout is a retryable failure.
    pub timeout_ms: u64,
    pub enable_batching: bool,
    pub batch_size: usize,
    pub enable_metrics: bool,
    pub enable_logging: bool,
    pub backoff: BackoffStrategy,
    /// Wall-clock budget for a whole composite operation.
    pub operation_deadline_ms: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
            timeout_ms: 30_000,
            enable_batching: true,
            batch_size: 10,
            enable_metrics: true,
            enable_logging: true,
            backoff: BackoffStrategy::Fixed,
            operation_deadline_ms: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn operation_deadline(&self) -> Option<Duration> {
        self.operation_deadline_ms.map(Duration::from_millis)
    }

    /// Apply a partial update, keeping every field the update leaves unset.
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            retry_attempts: update.retry_attempts.unwrap_or(self.retry_attempts),
            retry_delay_ms: update.retry_delay_ms.unwrap_or(self.retry_delay_ms),
            timeout_ms: update.timeout_ms.unwrap_or(self.timeout_ms),
            enable_batching: update.enable_batching.unwrap_or(self.enable_batching),
            batch_size: update.batch_size.unwrap_or(self.batch_size),
            enable_metrics: update.enable_metrics.unwrap_or(self.enable_metrics),
            enable_logging: update.enable_logging.unwrap_or(self.enable_logging),
            backoff: update.backoff.unwrap_or(self.backoff),
            operation_deadline_ms: update
                .operation_deadline_ms
                .unwrap_or(self.operation_deadline_ms),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.batch_size",
                "must be greater than 0",
            ));
        }
        if let BackoffStrategy::Exponential { multiplier, .. } = self.backoff {
            if !(multiplier >= 1.0) {
                return Err(ConfigurationError::invalid_value(
                    "engine.backoff.multiplier",
                    "must be at least 1.0",
                ));
            }
        }
        if self.operation_deadline_ms == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "engine.operation_deadline_ms",
                "must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

/// Partial engine and health configuration for live updates.
///
/// Accepts both snake_case and the camelCase names used by API clients
/// (`retryAttempts`, `timeout`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    #[serde(alias = "retryAttempts")]
    pub retry_attempts: Option<u32>,
    #[serde(alias = "retryDelay", alias = "retryDelayMs")]
    pub retry_delay_ms: Option<u64>,
    #[serde(alias = "timeout", alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
    #[serde(alias = "enableBatching")]
    pub enable_batching: Option<bool>,
    #[serde(alias = "batchSize")]
    pub batch_size: Option<usize>,
    #[serde(alias = "enableMetrics")]
    pub enable_metrics: Option<bool>,
    #[serde(alias = "enableLogging")]
    pub enable_logging: Option<bool>,
    pub backoff: Option<BackoffStrategy>,
    /// `Some(None)` clears the deadline.
    #[serde(alias = "operationDeadlineMs", with = "double_option")]
    pub operation_deadline_ms: Option<Option<u64>>,
    #[serde(
        alias = "interval_ms",
        alias = "healthCheckInterval",
        alias = "healthCheckIntervalMs"
    )]
    pub health_interval_ms: Option<u64>,
    #[serde(
        alias = "probeTimeoutMs",
        alias = "healthProbeTimeout",
        alias = "healthProbeTimeoutMs"
    )]
    pub probe_timeout_ms: Option<u64>,
    #[serde(alias = "retries", alias = "healthCheckRetries")]
    pub health_retries: Option<u32>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<u64>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u64>::deserialize(deserializer).map(Some)
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_ms: u64,
    /// Independent of the engine's step timeout.
    pub probe_timeout_ms: u64,
    /// Re-attempts of a failed probe within one cycle.
    pub retries: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            probe_timeout_ms: 5_000,
            retries: 3,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Apply the health fields of a partial update.
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            interval_ms: update.health_interval_ms.unwrap_or(self.interval_ms),
            probe_timeout_ms: update.probe_timeout_ms.unwrap_or(self.probe_timeout_ms),
            retries: update.health_retries.unwrap_or(self.retries),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "health.interval_ms",
                "must be greater than 0",
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "health.probe_timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LiveConfig {
    engine: OrchestratorConfig,
    health: HealthConfig,
}

/// Shared holder of the live engine and health configuration.
///
/// Clones share state. Every accepted update bumps a version that
/// [`ConfigStore::changes`] subscribers observe.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<LiveConfig>>,
    version: Arc<watch::Sender<u64>>,
}

impl ConfigStore {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_health(config, HealthConfig::default())
    }

    pub fn with_health(engine: OrchestratorConfig, health: HealthConfig) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(LiveConfig { engine, health })),
            version: Arc::new(version),
        }
    }

    /// Copy of the current engine configuration.
    pub fn get(&self) -> OrchestratorConfig {
        self.inner.read().engine.clone()
    }

    /// Copy of the current health monitor configuration.
    pub fn health(&self) -> HealthConfig {
        self.inner.read().health.clone()
    }

    /// Merge `update` over the current configuration, preserving every field
    /// it leaves unset, and return the new engine configuration.
    ///
    /// The merged result is validated first; on error nothing changes.
    pub fn update(&self, update: &ConfigUpdate) -> ConfigResult<OrchestratorConfig> {
        let engine = {
            let mut live = self.inner.write();
            let engine = live.engine.merged(update);
            let health = live.health.merged(update);
            engine.validate()?;
            health.validate()?;
            live.engine = engine.clone();
            live.health = health;
            engine
        };
        self.version.send_modify(|version| *version += 1);
        Ok(engine)
    }

    /// Receiver notified after every accepted update.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::with_health(OrchestratorConfig::default(), HealthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_preserves_unspecified_fields() {
        let store = ConfigStore::new(OrchestratorConfig {
            enable_metrics: false,
            ..OrchestratorConfig::default()
        });

        let update: ConfigUpdate =
            serde_json::from_value(serde_json::json!({"retryAttempts": 10, "timeout": 15000}))
                .unwrap();
        let updated = store.update(&update).unwrap();

        assert_eq!(updated.retry_attempts, 10);
        assert_eq!(updated.timeout_ms, 15_000);
        assert!(!updated.enable_metrics);
        assert_eq!(updated.batch_size, 10);
        assert_eq!(store.get(), updated);
    }

    #[test]
    fn test_deadline_can_be_set_and_cleared() {
        let store = ConfigStore::default();

        let set: ConfigUpdate =
            serde_json::from_value(serde_json::json!({"operation_deadline_ms": 500})).unwrap();
        assert_eq!(store.update(&set).unwrap().operation_deadline_ms, Some(500));

        let untouched = store.update(&ConfigUpdate::default()).unwrap();
        assert_eq!(untouched.operation_deadline_ms, Some(500));

        let clear: ConfigUpdate =
            serde_json::from_value(serde_json::json!({"operation_deadline_ms": null})).unwrap();
        assert_eq!(store.update(&clear).unwrap().operation_deadline_ms, None);
    }

    #[test]
    fn test_rejected_update_keeps_previous_config() {
        let store = ConfigStore::default();
        let bad = ConfigUpdate {
            batch_size: Some(0),
            ..ConfigUpdate::default()
        };
        assert!(store.update(&bad).is_err());
        assert_eq!(store.get().batch_size, 10);

        let nan = ConfigUpdate {
            backoff: Some(BackoffStrategy::Exponential {
                multiplier: f64::NAN,
                max_delay_ms: 1_000,
            }),
            ..ConfigUpdate::default()
        };
        assert!(store.update(&nan).is_err());
        assert_eq!(store.get().backoff, BackoffStrategy::Fixed);

        let zero_timeout = ConfigUpdate {
            timeout_ms: Some(0),
            retry_attempts: Some(7),
            ..ConfigUpdate::default()
        };
        assert!(store.update(&zero_timeout).is_err());
        assert_eq!(store.get().retry_attempts, 3);
    }

    #[test]
    fn test_health_settings_update_live() {
        let store = ConfigStore::default();
        let mut changes = store.changes();

        let update: ConfigUpdate = serde_json::from_value(serde_json::json!({
            "healthCheckInterval": 10,
            "healthProbeTimeout": 5,
            "healthCheckRetries": 0
        }))
        .unwrap();
        store.update(&update).unwrap();

        assert_eq!(
            store.health(),
            HealthConfig {
                interval_ms: 10,
                probe_timeout_ms: 5,
                retries: 0,
            }
        );
        assert_eq!(store.get(), OrchestratorConfig::default());
        assert!(changes.has_changed().unwrap());

        let zero_interval = ConfigUpdate {
            health_interval_ms: Some(0),
            ..ConfigUpdate::default()
        };
        assert!(store.update(&zero_interval).is_err());
        assert_eq!(store.health().interval_ms, 10);
    }

    #[test]
    fn test_get_returns_a_copy() {
        let store = ConfigStore::default();
        let mut snapshot = store.get();
        snapshot.retry_attempts = 99;
        assert_eq!(store.get().retry_attempts, 3);
    }

    #[test]
    fn test_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());
        assert!(HealthConfig::default().validate().is_ok());

        let zero_batch = OrchestratorConfig {
            batch_size: 0,
            ..OrchestratorConfig::default()
        };
        assert!(zero_batch.validate().is_err());

        let shrinking = OrchestratorConfig {
            backoff: BackoffStrategy::Exponential {
                multiplier: 0.5,
                max_delay_ms: 1000,
            },
            ..OrchestratorConfig::default()
        };
        assert!(shrinking.validate().is_err());

        let no_interval = HealthConfig {
            interval_ms: 0,
            ..HealthConfig::default()
        };
        assert!(no_interval.validate().is_err());
    }
}
