//! Per-invocation execution context shared by every step of one operation.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use super::retry::RetryPolicy;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result, ServiceError, ServiceErrors, ServiceResult};
use crate::services::{ServiceAdapters, ServiceKind};

/// Handle given to a composite operation while it runs.
///
/// Cloning is cheap; clones share the recorded service errors, so steps
/// fanned out concurrently all report into the same map.
#[derive(Clone)]
pub struct StepContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    operation_id: Uuid,
    operation: String,
    services: ServiceAdapters,
    policy: RetryPolicy,
    deadline: Option<(Instant, u64)>,
    service_errors: Mutex<ServiceErrors>,
}

impl StepContext {
    pub(crate) fn new(
        operation_id: Uuid,
        operation: &str,
        services: ServiceAdapters,
        config: &OrchestratorConfig,
    ) -> Self {
        let deadline = config
            .operation_deadline_ms
            .map(|ms| (Instant::now() + std::time::Duration::from_millis(ms), ms));

        Self {
            inner: Arc::new(ContextInner {
                operation_id,
                operation: operation.to_string(),
                services,
                policy: RetryPolicy::from_config(config),
                deadline,
                service_errors: Mutex::new(ServiceErrors::new()),
            }),
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.inner.operation_id
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn services(&self) -> &ServiceAdapters {
        &self.inner.services
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    /// Run a step whose output the operation cannot do without.
    ///
    /// On failure the error is recorded and returned as
    /// [`OrchestratorError::StepFailed`] carrying every service error seen so
    /// far; callers propagate it with `?`.
    pub async fn required<T, F, Fut>(&self, step: &str, service: ServiceKind, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        match self.run_step(step, service, call).await {
            Ok(value) => Ok(value),
            Err(source) => {
                self.record_error(&source);
                Err(OrchestratorError::StepFailed {
                    step: step.to_string(),
                    source,
                    service_errors: self.service_errors(),
                    partial: None,
                })
            }
        }
    }

    /// Run a step the operation can complete without. A failure is recorded
    /// under the step's service and surfaces as `None`.
    pub async fn optional<T, F, Fut>(&self, step: &str, service: ServiceKind, call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        match self.run_step(step, service, call).await {
            Ok(value) => Some(value),
            Err(error) => {
                self.record_error(&error);
                None
            }
        }
    }

    /// Record a failure against `error.service`. Several failures of the same
    /// service are joined with `"; "`.
    pub fn record_error(&self, error: &ServiceError) {
        let mut errors = self.inner.service_errors.lock();
        errors
            .entry(error.service.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&error.message);
            })
            .or_insert_with(|| error.message.clone());
    }

    /// Snapshot of the errors recorded so far.
    pub fn service_errors(&self) -> ServiceErrors {
        self.inner.service_errors.lock().clone()
    }

    async fn run_step<T, F, Fut>(&self, step: &str, service: ServiceKind, call: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let attempts = self.inner.policy.execute(service, step, call);
        match self.inner.deadline {
            None => attempts.await,
            Some((deadline, deadline_ms)) => match timeout_at(deadline, attempts).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::deadline_exceeded(service, step, deadline_ms)),
            },
        }
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("operation_id", &self.inner.operation_id)
            .field("operation", &self.inner.operation)
            .field("policy", &self.inner.policy)
            .finish()
    }
}
