//! # Orchestrator Engine
//!
//! Executes named composite operations against the service adapters and
//! reports every invocation as a single [`OperationResult`].
//!
//! ## Invocation lifecycle
//!
//! 1. Look up the operation and validate its step plan. Unknown or empty
//!    operations fail here, before any event or metric.
//! 2. Snapshot the live config, assign an operation id, publish
//!    `operation_start`.
//! 3. Run the operation's steps through a [`StepContext`]. Panics inside the
//!    operation are caught and reported as failures.
//! 4. Publish `operation_complete` or `operation_error`, record metrics, and
//!    return the result.
//!
//! The caller always gets a well-formed result; nothing inside an operation
//! escapes as an `Err` or a panic.

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::batch::BatchOperation;
use super::context::StepContext;
use super::operations::{
    self, CollaborationInput, CollaborationResult, CollaborationSetup, CompositeOperation,
    DocumentProcessing, DocumentProcessingInput, DocumentProcessingResult, DynOperation,
    Onboarding, OnboardingInput, OnboardingResult, SearchAndTrigger, SearchAndTriggerInput,
    SearchAndTriggerResult,
};
use super::types::{validate_plan, OperationResult, StepSpec};
use crate::config::{ConfigStore, ConfigUpdate, OrchestratorConfig, Settings};
use crate::error::{OrchestratorError, Result, ServiceErrors};
use crate::events::publisher::panic_message;
use crate::events::{EventBus, OrchestratorEvent, SubscriptionId};
use crate::health::{AdapterProbe, HealthMonitor, HealthProbe, SystemHealthCheck};
use crate::logging;
use crate::metrics::{MetricsCollector, OrchestratorMetrics};
use crate::services::ServiceAdapters;

const EVENT_BUFFER: usize = 1000;

/// The orchestration core: operation registry, config, metrics, events and
/// health monitoring behind one handle.
pub struct Orchestrator {
    services: ServiceAdapters,
    config: ConfigStore,
    metrics: Arc<MetricsCollector>,
    events: Arc<EventBus>,
    health: Arc<HealthMonitor>,
    operations: RwLock<HashMap<&'static str, Arc<dyn DynOperation>>>,
}

impl Orchestrator {
    /// Build an orchestrator that probes every adapter's `health_check`.
    pub fn new(services: ServiceAdapters, settings: Settings) -> Result<Self> {
        let probes = AdapterProbe::for_all(&services);
        Self::with_probes(services, settings, probes)
    }

    /// Build an orchestrator with custom health probe strategies.
    pub fn with_probes(
        services: ServiceAdapters,
        settings: Settings,
        probes: Vec<Arc<dyn HealthProbe>>,
    ) -> Result<Self> {
        settings.validate()?;

        let config = ConfigStore::with_health(settings.engine, settings.health);
        let metrics = Arc::new(MetricsCollector::new());
        let events = Arc::new(EventBus::new(EVENT_BUFFER));
        let health = Arc::new(HealthMonitor::new(
            probes,
            config.clone(),
            metrics.clone(),
            events.clone(),
        ));

        let operations = operations::builtin()
            .into_iter()
            .map(|op| (op.operation_name(), op))
            .collect();

        Ok(Self {
            services,
            config,
            metrics,
            events,
            health,
            operations: RwLock::new(operations),
        })
    }

    pub fn services(&self) -> &ServiceAdapters {
        &self.services
    }

    /// Register a custom composite operation under its name.
    ///
    /// Rejects plans that declare no steps or reference undeclared steps, and
    /// names that are already taken.
    pub fn register_operation<O: CompositeOperation>(&self, operation: O) -> Result<()> {
        let name = operation.name();
        validate_plan(name, &operation.steps())?;

        let mut operations = self.operations.write();
        if operations.contains_key(name) {
            return Err(OrchestratorError::Configuration(format!(
                "operation '{name}' is already registered"
            )));
        }
        operations.insert(name, Arc::new(operation));
        debug!(operation = name, "Registered composite operation");
        Ok(())
    }

    /// Registered operation names, sorted.
    pub fn operation_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.read().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Execute a registered operation by name with a JSON input.
    pub async fn execute(&self, operation: &str, input: Value) -> OperationResult<Value> {
        let registered = self.operations.read().get(operation).cloned();
        let Some(registered) = registered else {
            return rejected(OrchestratorError::UnknownOperation(operation.to_string()));
        };

        let steps = registered.plan();
        self.instrument(registered.operation_name(), &steps, |ctx| async move {
            registered.run_json(&ctx, input).await
        })
        .await
    }

    /// Execute a typed operation directly, without going through the
    /// registry.
    pub async fn run_operation<O: CompositeOperation>(
        &self,
        operation: &O,
        input: O::Input,
    ) -> OperationResult<O::Output> {
        let steps = operation.steps();
        self.instrument(operation.name(), &steps, |ctx| async move {
            operation.run(&ctx, input).await
        })
        .await
    }

    pub async fn onboard_user(&self, input: OnboardingInput) -> OperationResult<OnboardingResult> {
        self.run_operation(&Onboarding, input).await
    }

    pub async fn process_document(
        &self,
        input: DocumentProcessingInput,
    ) -> OperationResult<DocumentProcessingResult> {
        self.run_operation(&DocumentProcessing, input).await
    }

    pub async fn search_and_trigger(
        &self,
        input: SearchAndTriggerInput,
    ) -> OperationResult<SearchAndTriggerResult> {
        self.run_operation(&SearchAndTrigger, input).await
    }

    pub async fn setup_collaboration(
        &self,
        input: CollaborationInput,
    ) -> OperationResult<CollaborationResult> {
        self.run_operation(&CollaborationSetup, input).await
    }

    /// Execute `operation` once per input.
    ///
    /// With batching enabled, items run concurrently in chunks of
    /// `batch_size`; otherwise one at a time. Each item is a full invocation
    /// with its own events and metrics.
    pub async fn execute_batch(&self, operation: &str, inputs: Vec<Value>) -> BatchOperation<Value> {
        let config = self.config.get();
        let mut batch = BatchOperation::new(operation, inputs);
        let chunk_size = if config.enable_batching {
            config.batch_size.max(1)
        } else {
            1
        };

        let mut start = 0;
        while start < batch.items.len() {
            let end = (start + chunk_size).min(batch.items.len());
            batch.mark_running(start..end);

            let chunk: Vec<Value> = batch.items[start..end]
                .iter()
                .map(|item| item.input.clone())
                .collect();
            let results = join_all(chunk.into_iter().map(|input| self.execute(operation, input))).await;
            for (offset, result) in results.into_iter().enumerate() {
                batch.finish_item(start + offset, result);
            }
            start = end;
        }

        batch.finalize();
        if config.enable_logging {
            debug!(
                batch_id = %batch.id,
                operation = operation,
                items = batch.items.len(),
                completed = batch.completed_count(),
                failed = batch.failed_count(),
                "Batch finished"
            );
        }
        batch
    }

    /// Copy of the live engine configuration.
    pub fn get_config(&self) -> OrchestratorConfig {
        self.config.get()
    }

    /// Merge `update` into the live configuration. Engine settings take effect
    /// on the next invocation and running invocations keep their snapshot.
    /// Health settings apply from the monitor's next cycle.
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<OrchestratorConfig> {
        Ok(self.config.update(update)?)
    }

    pub fn metrics(&self) -> OrchestratorMetrics {
        self.metrics.snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Async tap on every published event.
    pub fn event_receiver(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.receiver()
    }

    /// Run one health cycle now.
    pub async fn health_check(&self) -> SystemHealthCheck {
        self.health.check_now().await
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Start periodic health monitoring. Returns `false` if already running.
    pub fn start_health_monitoring(&self) -> bool {
        self.health.start()
    }

    /// Stop background work. The orchestrator stays usable for direct calls.
    pub async fn dispose(&self) {
        self.health.dispose().await;
    }

    async fn instrument<T, F, Fut>(
        &self,
        operation: &'static str,
        steps: &[StepSpec],
        run: F,
    ) -> OperationResult<T>
    where
        F: FnOnce(StepContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Err(e) = validate_plan(operation, steps) {
            return rejected(e);
        }

        let config = self.config.get();
        let operation_id = Uuid::new_v4();
        let ctx = StepContext::new(operation_id, operation, self.services.clone(), &config);
        let started = Instant::now();

        self.events.publish(
            OrchestratorEvent::OperationStart {
                operation_id,
                operation: operation.to_string(),
                timestamp: Utc::now(),
            },
            config.enable_logging,
        );

        let outcome = match AssertUnwindSafe(run(ctx.clone())).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(OrchestratorError::Panicked {
                operation: operation.to_string(),
                message: panic_message(panic.as_ref()),
            }),
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let result = match outcome {
            Ok(data) => {
                let service_errors = ctx.service_errors();
                if config.enable_logging {
                    let details = (!service_errors.is_empty()).then(|| format!("{service_errors:?}"));
                    logging::log_composite_operation(
                        operation,
                        operation_id,
                        if details.is_some() { "degraded" } else { "completed" },
                        duration_ms,
                        details.as_deref(),
                    );
                }
                self.events.publish(
                    OrchestratorEvent::OperationComplete {
                        operation_id,
                        operation: operation.to_string(),
                        duration_ms,
                        service_errors: service_errors.clone(),
                        timestamp: Utc::now(),
                    },
                    config.enable_logging,
                );
                OperationResult::success(data, duration_ms, service_errors)
            }
            Err(error) => {
                let service_errors = error
                    .service_errors()
                    .cloned()
                    .unwrap_or_else(|| ctx.service_errors());
                let partial = match &error {
                    OrchestratorError::StepFailed { partial, .. } => partial.clone(),
                    _ => None,
                };
                let message = error.to_string();
                if config.enable_logging {
                    let context = (!service_errors.is_empty()).then(|| format!("{service_errors:?}"));
                    logging::log_operation_error(operation, operation_id, &message, context.as_deref());
                }
                self.events.publish(
                    OrchestratorEvent::OperationError {
                        operation_id,
                        operation: operation.to_string(),
                        error: message.clone(),
                        duration_ms,
                        service_errors: service_errors.clone(),
                        partial,
                        timestamp: Utc::now(),
                    },
                    config.enable_logging,
                );
                OperationResult::failure(message, duration_ms, service_errors)
            }
        };

        if config.enable_metrics {
            self.metrics
                .record_operation(operation, result.is_success(), duration_ms);
        }
        result.with_operation_id(operation_id)
    }
}

/// Result for an invocation refused before it started.
fn rejected<T>(error: OrchestratorError) -> OperationResult<T> {
    OperationResult::failure(error.to_string(), 0.0, ServiceErrors::new())
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("operations", &self.operation_names())
            .field("config", &self.config.get())
            .field("health", &self.health)
            .finish()
    }
}
