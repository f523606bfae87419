use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossflow_core::health::aggregate_health;
use crossflow_core::services::memory::InMemoryServices;
use crossflow_core::{HealthStatus, MetricsCollector, Orchestrator, OrchestratorConfig, Settings};
use serde_json::json;

fn quiet_settings() -> Settings {
    Settings {
        engine: OrchestratorConfig {
            enable_logging: false,
            ..OrchestratorConfig::default()
        },
        ..Settings::default()
    }
}

fn benchmark_onboarding(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let services = InMemoryServices::new();
    let orchestrator = Orchestrator::new(services.adapters(), quiet_settings()).unwrap();
    let input = json!({"email": "john@example.com", "password": "password123"});

    c.bench_function("onboarding_in_memory", |b| {
        b.iter(|| {
            runtime.block_on(orchestrator.execute("onboarding", black_box(input.clone())))
        })
    });
}

fn benchmark_batch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let services = InMemoryServices::new();
    let orchestrator = Orchestrator::new(services.adapters(), quiet_settings()).unwrap();
    let inputs: Vec<_> = (0..50)
        .map(|_| json!({"email": "john@example.com", "password": "password123"}))
        .collect();

    c.bench_function("onboarding_batch_50", |b| {
        b.iter(|| runtime.block_on(orchestrator.execute_batch("onboarding", inputs.clone())))
    });
}

fn benchmark_metrics(c: &mut Criterion) {
    let collector = MetricsCollector::new();
    c.bench_function("record_operation", |b| {
        b.iter(|| collector.record_operation("onboarding", true, black_box(12.5)))
    });
}

fn benchmark_aggregation(c: &mut Criterion) {
    let statuses = [
        HealthStatus::Healthy,
        HealthStatus::Degraded,
        HealthStatus::Healthy,
        HealthStatus::Unhealthy,
    ];
    c.bench_function("aggregate_health", |b| {
        b.iter(|| aggregate_health(black_box(statuses)))
    });
}

criterion_group!(
    benches,
    benchmark_onboarding,
    benchmark_batch,
    benchmark_metrics,
    benchmark_aggregation
);
criterion_main!(benches);
