//! # Service Health
//!
//! Per-service probe results, the aggregate verdict and the recurring
//! [`HealthMonitor`].
//!
//! Aggregation rule over `n` probed services with `h` healthy:
//!
//! | condition   | overall     |
//! |-------------|-------------|
//! | `h == n`    | `healthy`   |
//! | `2h >= n`   | `degraded`  |
//! | otherwise   | `unhealthy` |

pub mod monitor;
pub mod probe;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use monitor::{HealthMonitor, MonitorState};
pub use probe::{AdapterProbe, HealthProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub service_name: String,
    pub version: String,
    /// Wall time of the probe including retries.
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    /// Why the probe failed, when it did.
    #[serde(default)]
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub fn new(
        service_name: impl Into<String>,
        status: HealthStatus,
        version: impl Into<String>,
    ) -> Self {
        Self {
            status,
            service_name: service_name.into(),
            version: version.into(),
            response_time_ms: None,
            error: None,
        }
    }

    pub fn failed(service_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            service_name: service_name.into(),
            version: "unknown".to_string(),
            response_time_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn with_response_time(mut self, response_time_ms: f64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }
}

/// Aggregate health of every probed service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealthCheck {
    pub per_service: BTreeMap<String, HealthCheckResult>,
    pub overall: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl SystemHealthCheck {
    pub fn from_results(results: impl IntoIterator<Item = HealthCheckResult>) -> Self {
        let per_service: BTreeMap<String, HealthCheckResult> = results
            .into_iter()
            .map(|r| (r.service_name.clone(), r))
            .collect();
        let overall = aggregate_health(per_service.values().map(|r| r.status));

        Self {
            per_service,
            overall,
            timestamp: Utc::now(),
        }
    }

    pub fn healthy_count(&self) -> usize {
        self.per_service
            .values()
            .filter(|r| r.status == HealthStatus::Healthy)
            .count()
    }

    pub fn status_of(&self, service: &str) -> Option<HealthStatus> {
        self.per_service.get(service).map(|r| r.status)
    }
}

/// Overall verdict for a set of per-service statuses.
///
/// Only `healthy` counts towards the total; `degraded` and `unknown` services
/// weigh the same as `unhealthy` ones. An empty set is vacuously healthy.
pub fn aggregate_health(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
    let (healthy, total) = statuses.into_iter().fold((0usize, 0usize), |(h, t), s| {
        (h + usize::from(s == HealthStatus::Healthy), t + 1)
    });

    if healthy == total {
        HealthStatus::Healthy
    } else if healthy * 2 >= total {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}
