//! OpenTelemetry instruments mirroring the in-process collector.
//!
//! Instruments come from the global meter provider. Without an installed
//! exporter the global provider is a no-op, so recording is always safe.
//!
//! - `crossflow.operations.total{operation, outcome}`
//! - `crossflow.operation.duration{operation}` (ms)
//! - `crossflow.health.checks.total{overall}`
//! - `crossflow.service.availability{service}` (percent)

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

static ORCHESTRATOR_METER: OnceLock<Meter> = OnceLock::new();
static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();

fn meter() -> &'static Meter {
    ORCHESTRATOR_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("crossflow-orchestrator"))
}

struct Instruments {
    operations_total: Counter<u64>,
    operation_duration: Histogram<f64>,
    health_checks_total: Counter<u64>,
    service_availability: Gauge<f64>,
}

fn instruments() -> &'static Instruments {
    INSTRUMENTS.get_or_init(|| Instruments {
        operations_total: meter()
            .u64_counter("crossflow.operations.total")
            .with_description("Composite operations executed, by outcome")
            .build(),
        operation_duration: meter()
            .f64_histogram("crossflow.operation.duration")
            .with_description("Composite operation duration in milliseconds")
            .with_unit("ms")
            .build(),
        health_checks_total: meter()
            .u64_counter("crossflow.health.checks.total")
            .with_description("Health check cycles completed, by overall verdict")
            .build(),
        service_availability: meter()
            .f64_gauge("crossflow.service.availability")
            .with_description("Service availability from the last probe (0 or 100)")
            .with_unit("%")
            .build(),
    })
}

pub(crate) fn record_operation(operation: &str, success: bool, duration_ms: f64) {
    let outcome = if success { "success" } else { "failure" };
    let instruments = instruments();
    instruments.operations_total.add(
        1,
        &[
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("outcome", outcome),
        ],
    );
    instruments.operation_duration.record(
        duration_ms,
        &[KeyValue::new("operation", operation.to_string())],
    );
}

pub(crate) fn record_health_check(overall: &'static str, availability: &[(String, f64)]) {
    let instruments = instruments();
    instruments
        .health_checks_total
        .add(1, &[KeyValue::new("overall", overall)]);
    for (service, percent) in availability {
        instruments
            .service_availability
            .record(*percent, &[KeyValue::new("service", service.clone())]);
    }
}
