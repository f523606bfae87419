//! # Health Monitor
//!
//! Periodically probes every registered service, aggregates the results and
//! feeds them to the metrics collector and the event bus.
//!
//! Lifecycle is `Stopped -> Running` on [`HealthMonitor::start`] and
//! `Running -> Stopped` on [`HealthMonitor::dispose`]. A cycle can also be
//! triggered on demand with [`HealthMonitor::check_now`], whether or not the
//! background loop is running.
//!
//! Settings come from the shared [`ConfigStore`]: probe timeout and retries
//! are read at the start of every cycle, and the loop re-arms its interval as
//! soon as an update changes `interval_ms`.

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::probe::HealthProbe;
use super::{HealthCheckResult, HealthStatus, SystemHealthCheck};
use crate::config::{ConfigStore, HealthConfig};
use crate::events::{EventBus, OrchestratorEvent};
use crate::metrics::MetricsCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

struct Runner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    probes: Vec<Arc<dyn HealthProbe>>,
    config: ConfigStore,
    metrics: Arc<MetricsCollector>,
    events: Arc<EventBus>,
    last_statuses: DashMap<String, HealthStatus>,
    last_check: Mutex<Option<SystemHealthCheck>>,
    runner: Mutex<Option<Runner>>,
}

impl HealthMonitor {
    pub fn new(
        probes: Vec<Arc<dyn HealthProbe>>,
        config: ConfigStore,
        metrics: Arc<MetricsCollector>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            probes,
            config,
            metrics,
            events,
            last_statuses: DashMap::new(),
            last_check: Mutex::new(None),
            runner: Mutex::new(None),
        }
    }

    /// Current health settings.
    pub fn config(&self) -> HealthConfig {
        self.config.health()
    }

    pub fn state(&self) -> MonitorState {
        match self.runner.lock().as_ref() {
            Some(runner) if !runner.handle.is_finished() => MonitorState::Running,
            _ => MonitorState::Stopped,
        }
    }

    /// Result of the most recent cycle.
    pub fn last_check(&self) -> Option<SystemHealthCheck> {
        self.last_check.lock().clone()
    }

    /// Start the background loop. The first cycle runs immediately.
    ///
    /// Must be called from within a Tokio runtime. Returns `false` if the
    /// monitor was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut runner = self.runner.lock();
        if matches!(runner.as_ref(), Some(r) if !r.handle.is_finished()) {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::downgrade(self),
            self.config.changes(),
            shutdown_rx,
        ));
        *runner = Some(Runner { shutdown, handle });

        if self.config.get().enable_logging {
            let health = self.config.health();
            info!(
                interval_ms = health.interval_ms,
                probe_timeout_ms = health.probe_timeout_ms,
                probes = self.probes.len(),
                "Health monitor started"
            );
        }
        true
    }

    /// Stop the background loop and wait for it to exit. An in-flight cycle
    /// finishes first.
    pub async fn dispose(&self) {
        let runner = self.runner.lock().take();
        let Some(runner) = runner else {
            return;
        };

        let _ = runner.shutdown.send(true);
        let joined = runner.handle.await;
        if self.config.get().enable_logging {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    warn!(error = %e, "Health monitor task ended abnormally");
                }
            }
            info!("Health monitor stopped");
        }
    }

    /// Probe every service once, record and publish the result.
    pub async fn check_now(&self) -> SystemHealthCheck {
        let engine = self.config.get();
        let settings = self.config.health();
        let results = join_all(
            self.probes
                .iter()
                .map(|probe| self.probe_service(probe.as_ref(), &settings, engine.enable_logging)),
        )
        .await;
        let health = SystemHealthCheck::from_results(results);

        if engine.enable_metrics {
            self.metrics.record_health_check(&health);
        }

        let mut changed_services: Vec<String> = health
            .per_service
            .iter()
            .filter_map(|(service, result)| {
                let previous = self.last_statuses.insert(service.clone(), result.status);
                (previous != Some(result.status)).then(|| service.clone())
            })
            .collect();
        changed_services.sort();

        let previous_overall = self
            .last_check
            .lock()
            .replace(health.clone())
            .map(|previous| previous.overall);

        if engine.enable_logging {
            if health.overall == HealthStatus::Healthy {
                debug!(
                    overall = %health.overall,
                    healthy = health.healthy_count(),
                    total = health.per_service.len(),
                    "Health check completed"
                );
            } else {
                warn!(
                    overall = %health.overall,
                    healthy = health.healthy_count(),
                    total = health.per_service.len(),
                    changed = ?changed_services,
                    "Health check reports unhealthy services"
                );
            }
        }

        self.events.publish(
            OrchestratorEvent::ServiceHealthChange {
                health: health.clone(),
                previous_overall,
                changed_services,
                timestamp: Utc::now(),
            },
            engine.enable_logging,
        );

        health
    }

    /// Probe one service, re-attempting failed probes up to `retries` times.
    /// A failure or timeout on every attempt yields an unhealthy result.
    async fn probe_service(
        &self,
        probe: &dyn HealthProbe,
        settings: &HealthConfig,
        log_attempts: bool,
    ) -> HealthCheckResult {
        let started = Instant::now();
        let attempts = settings.retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match timeout(settings.probe_timeout(), probe.probe()).await {
                Ok(Ok(health)) => {
                    return HealthCheckResult::new(probe.service_name(), health.status, health.version)
                        .with_response_time(elapsed_ms(started));
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                }
                Err(_) => {
                    last_error = format!(
                        "health probe timed out after {}ms",
                        settings.probe_timeout_ms
                    );
                }
            }
            if log_attempts {
                debug!(
                    service = probe.service_name(),
                    attempt = attempt,
                    error = %last_error,
                    "Health probe attempt failed"
                );
            }
        }

        HealthCheckResult::failed(probe.service_name(), last_error)
            .with_response_time(elapsed_ms(started))
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("probes", &self.probes.len())
            .field("config", &self.config.health())
            .field("state", &self.state())
            .finish()
    }
}

async fn run_loop(
    monitor: Weak<HealthMonitor>,
    mut config_changes: watch::Receiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(mut period) = monitor.upgrade().map(|m| m.config().interval()) else {
        return;
    };
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The owner is gone; nothing left to report to.
                let Some(monitor) = monitor.upgrade() else { break };
                monitor.check_now().await;
            }
            changed = config_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(monitor) = monitor.upgrade() else { break };
                let current = monitor.config().interval();
                if current != period {
                    period = current;
                    ticker = rearmed(period);
                    if monitor.config.get().enable_logging {
                        debug!(interval_ms = period.as_millis() as u64, "Health check interval changed");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Interval whose first tick is one full period away.
fn rearmed(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigUpdate, OrchestratorConfig};
    use crate::error::{ServiceError, ServiceResult};
    use crate::services::{ServiceHealth, ServiceKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct ScriptedProbe {
        name: &'static str,
        failures_before_success: u32,
        calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedProbe {
        fn healthy(name: &'static str) -> Self {
            Self {
                name,
                failures_before_success: 0,
                calls: AtomicU32::new(0),
                delay: None,
            }
        }

        fn flaky(name: &'static str, failures: u32) -> Self {
            Self {
                failures_before_success: failures,
                ..Self::healthy(name)
            }
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        fn service_name(&self) -> &str {
            self.name
        }

        async fn probe(&self) -> ServiceResult<ServiceHealth> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if call < self.failures_before_success {
                Err(ServiceError::network(ServiceKind::Content, "health_check", "refused"))
            } else {
                Ok(ServiceHealth::healthy("1.0.0"))
            }
        }
    }

    fn monitor_with(probes: Vec<Arc<dyn HealthProbe>>, config: HealthConfig) -> Arc<HealthMonitor> {
        monitor_with_store(probes, ConfigStore::with_health(OrchestratorConfig::default(), config))
    }

    fn monitor_with_store(probes: Vec<Arc<dyn HealthProbe>>, store: ConfigStore) -> Arc<HealthMonitor> {
        Arc::new(HealthMonitor::new(
            probes,
            store,
            Arc::new(MetricsCollector::new()),
            Arc::new(EventBus::default()),
        ))
    }

    #[tokio::test]
    async fn test_probe_retries_until_success() {
        let flaky = Arc::new(ScriptedProbe::flaky("content", 2));
        let monitor = monitor_with(
            vec![flaky.clone()],
            HealthConfig {
                retries: 2,
                ..HealthConfig::default()
            },
        );

        let health = monitor.check_now().await;
        assert_eq!(health.status_of("content"), Some(HealthStatus::Healthy));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_probe_is_unhealthy() {
        let flaky = Arc::new(ScriptedProbe::flaky("content", 10));
        let monitor = monitor_with(
            vec![flaky.clone()],
            HealthConfig {
                retries: 1,
                ..HealthConfig::default()
            },
        );

        let health = monitor.check_now().await;
        let result = &health.per_service["content"];
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.as_deref().unwrap().contains("refused"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let slow = Arc::new(ScriptedProbe {
            delay: Some(Duration::from_millis(200)),
            ..ScriptedProbe::healthy("workflow")
        });
        let monitor = monitor_with(
            vec![slow, Arc::new(ScriptedProbe::healthy("identity"))],
            HealthConfig {
                probe_timeout_ms: 20,
                retries: 0,
                ..HealthConfig::default()
            },
        );

        let health = monitor.check_now().await;
        assert_eq!(health.status_of("workflow"), Some(HealthStatus::Unhealthy));
        assert_eq!(health.status_of("identity"), Some(HealthStatus::Healthy));
        assert_eq!(health.overall, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_start_and_dispose() {
        let monitor = monitor_with(
            vec![Arc::new(ScriptedProbe::healthy("identity"))],
            HealthConfig {
                interval_ms: 10,
                ..HealthConfig::default()
            },
        );
        assert_eq!(monitor.state(), MonitorState::Stopped);

        assert!(monitor.start());
        assert!(!monitor.start());
        assert_eq!(monitor.state(), MonitorState::Running);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.last_check().is_some());

        monitor.dispose().await;
        assert_eq!(monitor.state(), MonitorState::Stopped);

        // Disposing twice is harmless.
        monitor.dispose().await;
    }

    #[tokio::test]
    async fn test_retry_count_follows_store_updates() {
        let flaky = Arc::new(ScriptedProbe::flaky("content", 10));
        let store = ConfigStore::with_health(
            OrchestratorConfig::default(),
            HealthConfig {
                retries: 0,
                ..HealthConfig::default()
            },
        );
        let monitor = monitor_with_store(vec![flaky.clone()], store.clone());

        monitor.check_now().await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);

        store
            .update(&ConfigUpdate {
                health_retries: Some(2),
                ..ConfigUpdate::default()
            })
            .unwrap();
        assert_eq!(monitor.config().retries, 2);

        monitor.check_now().await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_interval_change_rearms_running_loop() {
        let identity = Arc::new(ScriptedProbe::healthy("identity"));
        let store = ConfigStore::with_health(
            OrchestratorConfig::default(),
            HealthConfig {
                interval_ms: 60_000,
                ..HealthConfig::default()
            },
        );
        let monitor = monitor_with_store(vec![identity.clone()], store.clone());

        assert!(monitor.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Only the immediate first tick has fired.
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);

        store
            .update(&ConfigUpdate {
                health_interval_ms: Some(10),
                ..ConfigUpdate::default()
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let cycles = identity.calls.load(Ordering::SeqCst);
        assert!(cycles >= 3, "expected the shorter interval to apply, saw {cycles} cycles");

        monitor.dispose().await;
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lifecycle_and_attempt_logs_follow_enable_logging() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = ConfigStore::with_health(
            OrchestratorConfig {
                enable_logging: false,
                ..OrchestratorConfig::default()
            },
            HealthConfig {
                interval_ms: 10,
                retries: 1,
                ..HealthConfig::default()
            },
        );
        let monitor = monitor_with_store(vec![Arc::new(ScriptedProbe::flaky("content", 100))], store.clone());

        assert!(monitor.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.dispose().await;

        let quiet = logs.text();
        assert!(!quiet.contains("Health monitor started"), "{quiet}");
        assert!(!quiet.contains("Health monitor stopped"), "{quiet}");
        assert!(!quiet.contains("Health probe attempt failed"), "{quiet}");

        store
            .update(&ConfigUpdate {
                enable_logging: Some(true),
                ..ConfigUpdate::default()
            })
            .unwrap();
        assert!(monitor.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.dispose().await;

        let loud = logs.text();
        assert!(loud.contains("Health monitor started"));
        assert!(loud.contains("Health probe attempt failed"));
        assert!(loud.contains("Health monitor stopped"));
    }
}
