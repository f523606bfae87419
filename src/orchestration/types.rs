//! Core orchestration types: operation results and step declarations.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result, ServiceErrors};
use crate::services::ServiceKind;

/// Outcome of one composite operation invocation.
///
/// Exactly one of `data` and `error` is present: results are built by the
/// constructors, deserialization rejects any other shape, and fields are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawOperationResult<T>")]
pub struct OperationResult<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: f64,
    #[serde(default, skip_serializing_if = "ServiceErrors::is_empty")]
    service_errors: ServiceErrors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation_id: Option<Uuid>,
}

/// Wire form of [`OperationResult`], checked before it becomes one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
struct RawOperationResult<T> {
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    duration_ms: f64,
    #[serde(default)]
    service_errors: ServiceErrors,
    #[serde(default)]
    operation_id: Option<Uuid>,
}

impl<T> TryFrom<RawOperationResult<T>> for OperationResult<T> {
    type Error = String;

    fn try_from(raw: RawOperationResult<T>) -> std::result::Result<Self, Self::Error> {
        match (raw.success, raw.data.is_some(), raw.error.is_some()) {
            (true, true, false) | (false, false, true) => Ok(Self {
                success: raw.success,
                data: raw.data,
                error: raw.error,
                duration_ms: raw.duration_ms,
                service_errors: raw.service_errors,
                operation_id: raw.operation_id,
            }),
            (true, _, _) => Err("a successful result needs data and no error".to_string()),
            (false, _, _) => Err("a failed result needs an error and no data".to_string()),
        }
    }
}

impl<T> OperationResult<T> {
    pub fn success(data: T, duration_ms: f64, service_errors: ServiceErrors) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
            service_errors,
            operation_id: None,
        }
    }

    pub fn failure(error: impl Into<String>, duration_ms: f64, service_errors: ServiceErrors) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
            service_errors,
            operation_id: None,
        }
    }

    pub(crate) fn with_operation_id(mut self, operation_id: Uuid) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Succeeded, but at least one optional step failed.
    pub fn is_degraded(&self) -> bool {
        self.success && !self.service_errors.is_empty()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Per-service failure messages; empty when every step succeeded.
    pub fn service_errors(&self) -> &ServiceErrors {
        &self.service_errors
    }

    /// `None` for invocations rejected before execution.
    pub fn operation_id(&self) -> Option<Uuid> {
        self.operation_id
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            duration_ms: self.duration_ms,
            service_errors: self.service_errors,
            operation_id: self.operation_id,
        }
    }
}

/// Declaration of one step of a composite operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub name: &'static str,
    pub service: ServiceKind,
    /// A required step's failure fails the whole operation.
    pub required: bool,
    /// Steps whose output this step consumes; empty means it only needs the
    /// operation input and may run concurrently with its siblings.
    pub depends_on: &'static [&'static str],
}

impl StepSpec {
    pub const fn required(name: &'static str, service: ServiceKind) -> Self {
        Self {
            name,
            service,
            required: true,
            depends_on: &[],
        }
    }

    pub const fn optional(name: &'static str, service: ServiceKind) -> Self {
        Self {
            name,
            service,
            required: false,
            depends_on: &[],
        }
    }

    pub const fn after(mut self, depends_on: &'static [&'static str]) -> Self {
        self.depends_on = depends_on;
        self
    }
}

/// Reject plans that cannot be executed: no steps, duplicate step names, or
/// dependencies on steps that are not declared earlier in the plan.
pub fn validate_plan(operation: &str, steps: &[StepSpec]) -> Result<()> {
    if steps.is_empty() {
        return Err(OrchestratorError::EmptyOperation(operation.to_string()));
    }

    let mut declared = HashSet::new();
    for step in steps {
        for dependency in step.depends_on {
            if !declared.contains(dependency) {
                return Err(OrchestratorError::Configuration(format!(
                    "step '{}' of operation '{}' depends on undeclared step '{}'",
                    step.name, operation, dependency
                )));
            }
        }
        if !declared.insert(step.name) {
            return Err(OrchestratorError::Configuration(format!(
                "operation '{}' declares step '{}' twice",
                operation, step.name
            )));
        }
    }
    Ok(())
}
