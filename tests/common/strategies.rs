use proptest::prelude::*;

use crossflow_core::health::HealthStatus;
use crossflow_core::services::ServiceKind;

/// Strategy for any per-service health status
pub fn health_status_strategy() -> impl Strategy<Value = HealthStatus> {
    prop_oneof![
        Just(HealthStatus::Healthy),
        Just(HealthStatus::Degraded),
        Just(HealthStatus::Unhealthy),
        Just(HealthStatus::Unknown),
    ]
}

/// Strategy for the statuses of the four services
pub fn service_statuses_strategy() -> impl Strategy<Value = Vec<(ServiceKind, HealthStatus)>> {
    prop::collection::vec(health_status_strategy(), 4).prop_map(|statuses| {
        ServiceKind::ALL.iter().copied().zip(statuses).collect()
    })
}

/// Strategy for a sequence of operation outcomes: (success, duration_ms)
pub fn operation_outcomes_strategy() -> impl Strategy<Value = Vec<(bool, f64)>> {
    prop::collection::vec((any::<bool>(), 0.0f64..5_000.0), 0..50)
}

/// Strategy for which services fail during an onboarding run
pub fn failing_services_strategy() -> impl Strategy<Value = Vec<ServiceKind>> {
    prop::sample::subsequence(ServiceKind::ALL.to_vec(), 0..=4)
}
