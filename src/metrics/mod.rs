//! # Orchestrator Metrics
//!
//! Process-wide counters over executed operations and health probes.
//!
//! The average operation time is a running mean
//! (`avg_n = (avg_{n-1} * (n - 1) + duration) / n`), so no history is kept.
//! Service availability is a binary gauge: 100 after a healthy probe, 0 after
//! anything else.

mod telemetry;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::health::{HealthStatus, SystemHealthCheck};

/// Point-in-time view of the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorMetrics {
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub average_operation_time_ms: f64,
    /// Percent per service name.
    pub service_availability: BTreeMap<String, f64>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub uptime_ms: u64,
}

impl OrchestratorMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }
        self.successful_operations as f64 / self.total_operations as f64
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_operations: u64,
    successful_operations: u64,
    failed_operations: u64,
    average_operation_time_ms: f64,
    service_availability: BTreeMap<String, f64>,
    last_health_check: Option<DateTime<Utc>>,
}

/// Thread-safe accumulator behind [`OrchestratorMetrics`].
///
/// Counters live under one lock so a snapshot never observes
/// `total != successful + failed`.
#[derive(Debug)]
pub struct MetricsCollector {
    started_at: Instant,
    counters: Mutex<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn record_operation(&self, operation: &str, success: bool, duration_ms: f64) {
        {
            let mut counters = self.counters.lock();
            counters.total_operations += 1;
            if success {
                counters.successful_operations += 1;
            } else {
                counters.failed_operations += 1;
            }

            let n = counters.total_operations as f64;
            counters.average_operation_time_ms =
                (counters.average_operation_time_ms * (n - 1.0) + duration_ms) / n;
        }

        telemetry::record_operation(operation, success, duration_ms);
    }

    pub fn record_health_check(&self, health: &SystemHealthCheck) {
        let availability: Vec<(String, f64)> = health
            .per_service
            .iter()
            .map(|(service, result)| {
                let percent = if result.status == HealthStatus::Healthy {
                    100.0
                } else {
                    0.0
                };
                (service.clone(), percent)
            })
            .collect();

        {
            let mut counters = self.counters.lock();
            for (service, percent) in &availability {
                counters
                    .service_availability
                    .insert(service.clone(), *percent);
            }
            counters.last_health_check = Some(health.timestamp);
        }

        telemetry::record_health_check(health.overall.as_str(), &availability);
    }

    pub fn snapshot(&self) -> OrchestratorMetrics {
        let counters = self.counters.lock();
        OrchestratorMetrics {
            total_operations: counters.total_operations,
            successful_operations: counters.successful_operations,
            failed_operations: counters.failed_operations,
            average_operation_time_ms: counters.average_operation_time_ms,
            service_availability: counters.service_availability.clone(),
            last_health_check: counters.last_health_check,
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
