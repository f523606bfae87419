//! Error types for the orchestration core.
//!
//! Two layers: [`ServiceError`] describes a single adapter call failure and
//! carries the retry classification; [`OrchestratorError`] describes why a
//! composite operation as a whole could not produce its result.

use crate::services::ServiceKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Per-service error messages recorded during one composite operation,
/// keyed by service name.
pub type ServiceErrors = BTreeMap<String, String>;

/// Underlying cause of a [`ServiceError`], shared so the error stays `Clone`.
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single call against one backend service.
///
/// Equality compares the classification and message only; the attached
/// `source` is left out.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{service}.{operation} failed: {message}")]
pub struct ServiceError {
    pub service: ServiceKind,
    pub operation: String,
    pub status_code: Option<u16>,
    pub retryable: bool,
    pub message: String,
    #[serde(skip)]
    #[source]
    pub source: Option<ErrorSource>,
}

impl PartialEq for ServiceError {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service
            && self.operation == other.operation
            && self.status_code == other.status_code
            && self.retryable == other.retryable
            && self.message == other.message
    }
}

impl Eq for ServiceError {}

impl ServiceError {
    /// Build an error from an HTTP-style status code and classify it.
    ///
    /// 5xx, 408 and 429 are transient. 401/403 are authorization failures and
    /// never retried. Every other 4xx is a validation failure.
    pub fn from_status(
        service: ServiceKind,
        operation: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            operation: operation.into(),
            status_code: Some(status_code),
            retryable: is_retryable_status(status_code),
            message: message.into(),
            source: None,
        }
    }

    /// Transport-level failure (connection refused, reset, DNS...).
    pub fn network(
        service: ServiceKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            operation: operation.into(),
            status_code: None,
            retryable: true,
            message: message.into(),
            source: None,
        }
    }

    /// The call did not complete within the step timeout.
    pub fn timeout(service: ServiceKind, operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            service,
            operation: operation.into(),
            status_code: None,
            retryable: true,
            message: format!("timed out after {timeout_ms}ms"),
            source: None,
        }
    }

    /// The operation-wide deadline elapsed while this call was pending.
    /// Retrying cannot help, so it is never retried.
    pub fn deadline_exceeded(
        service: ServiceKind,
        operation: impl Into<String>,
        deadline_ms: u64,
    ) -> Self {
        Self {
            service,
            operation: operation.into(),
            status_code: None,
            retryable: false,
            message: format!("operation deadline of {deadline_ms}ms exceeded"),
            source: None,
        }
    }

    /// Rejected input. Never retried.
    pub fn validation(
        service: ServiceKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::from_status(service, operation, 400, message)
    }

    /// Authentication or authorization failure. Never retried.
    pub fn unauthorized(
        service: ServiceKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::from_status(service, operation, 401, message)
    }

    /// The service answered but is not able to serve requests.
    pub fn unavailable(
        service: ServiceKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::from_status(service, operation, 503, message)
    }

    /// Attach the lower-level error that caused this failure.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Whether the failure is an authorization rejection (401/403).
    pub fn is_authorization(&self) -> bool {
        matches!(self.status_code, Some(401) | Some(403))
    }
}

fn is_retryable_status(status_code: u16) -> bool {
    match status_code {
        401 | 403 => false,
        408 | 429 => true,
        500..=599 => true,
        _ => false,
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failure of a composite operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Operation '{0}' declares no steps")]
    EmptyOperation(String),

    #[error("Invalid input for operation '{operation}': {reason}")]
    InvalidInput { operation: String, reason: String },

    /// A step whose output the operation needs failed after retries.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: ServiceError,
        service_errors: ServiceErrors,
        partial: Option<serde_json::Value>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to serialize output of operation '{operation}': {reason}")]
    Serialization { operation: String, reason: String },

    #[error("Operation '{operation}' panicked: {message}")]
    Panicked { operation: String, message: String },
}

impl OrchestratorError {
    pub fn invalid_input(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Service errors aggregated up to the point of failure.
    pub fn service_errors(&self) -> Option<&ServiceErrors> {
        match self {
            Self::StepFailed { service_errors, .. } => Some(service_errors),
            _ => None,
        }
    }

    /// Attach results obtained before a required step failed.
    pub fn with_partial(self, value: serde_json::Value) -> Self {
        match self {
            Self::StepFailed {
                step,
                source,
                service_errors,
                ..
            } => Self::StepFailed {
                step,
                source,
                service_errors,
                partial: Some(value),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
