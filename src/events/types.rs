//! Orchestrator lifecycle and health events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceErrors;
use crate::health::{HealthStatus, SystemHealthCheck};

/// Discriminant of an [`OrchestratorEvent`], for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OperationStart,
    OperationComplete,
    OperationError,
    ServiceHealthChange,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OperationStart => "operation_start",
            EventKind::OperationComplete => "operation_complete",
            EventKind::OperationError => "operation_error",
            EventKind::ServiceHealthChange => "service_health_change",
        }
    }
}

/// Events published on the [`EventBus`](super::EventBus).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    OperationStart {
        operation_id: Uuid,
        operation: String,
        timestamp: DateTime<Utc>,
    },
    OperationComplete {
        operation_id: Uuid,
        operation: String,
        duration_ms: f64,
        /// Optional-step failures tolerated by this operation.
        service_errors: ServiceErrors,
        timestamp: DateTime<Utc>,
    },
    OperationError {
        operation_id: Uuid,
        operation: String,
        error: String,
        duration_ms: f64,
        service_errors: ServiceErrors,
        /// Results obtained before the failing step, when the operation
        /// reported any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    ServiceHealthChange {
        health: SystemHealthCheck,
        previous_overall: Option<HealthStatus>,
        /// Services whose status differs from the previous cycle.
        changed_services: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl OrchestratorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            OrchestratorEvent::OperationStart { .. } => EventKind::OperationStart,
            OrchestratorEvent::OperationComplete { .. } => EventKind::OperationComplete,
            OrchestratorEvent::OperationError { .. } => EventKind::OperationError,
            OrchestratorEvent::ServiceHealthChange { .. } => EventKind::ServiceHealthChange,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            OrchestratorEvent::OperationStart { timestamp, .. }
            | OrchestratorEvent::OperationComplete { timestamp, .. }
            | OrchestratorEvent::OperationError { timestamp, .. }
            | OrchestratorEvent::ServiceHealthChange { timestamp, .. } => *timestamp,
        }
    }

    /// Operation the event belongs to, if any. Health events have none.
    pub fn operation_id(&self) -> Option<Uuid> {
        match self {
            OrchestratorEvent::OperationStart { operation_id, .. }
            | OrchestratorEvent::OperationComplete { operation_id, .. }
            | OrchestratorEvent::OperationError { operation_id, .. } => Some(*operation_id),
            OrchestratorEvent::ServiceHealthChange { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag_matches_kind() {
        let event = OrchestratorEvent::OperationStart {
            operation_id: Uuid::new_v4(),
            operation: "onboarding".to_string(),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.kind().as_str());
        assert_eq!(event.operation_id(), value["operation_id"].as_str().and_then(|s| s.parse::<Uuid>().ok()));
    }
}
