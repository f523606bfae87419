#![allow(dead_code)]

pub mod faults;
pub mod strategies;

pub use faults::*;

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

use crossflow_core::config::{HealthConfig, OrchestratorConfig, Settings};
use crossflow_core::events::{EventKind, OrchestratorEvent};
use crossflow_core::services::memory::InMemoryServices;
use crossflow_core::services::{Document, Workflow};
use crossflow_core::Orchestrator;

/// Engine settings with millisecond delays so retries don't slow tests down.
pub fn fast_settings() -> Settings {
    Settings {
        engine: OrchestratorConfig {
            retry_attempts: 2,
            retry_delay_ms: 1,
            timeout_ms: 2_000,
            enable_logging: false,
            ..OrchestratorConfig::default()
        },
        health: HealthConfig {
            interval_ms: 20,
            probe_timeout_ms: 100,
            retries: 0,
        },
    }
}

/// In-memory services behind a fault injector, plus the orchestrator wired
/// to them.
pub struct TestHarness {
    pub services: InMemoryServices,
    pub faults: Arc<FaultInjector>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(fast_settings())
    }

    pub fn with_engine(engine: OrchestratorConfig) -> Self {
        Self::with_settings(Settings {
            engine,
            ..fast_settings()
        })
    }

    pub fn with_settings(settings: Settings) -> Self {
        let services = InMemoryServices::new();
        let faults = FaultInjector::new();
        let orchestrator = Orchestrator::new(faulty_adapters(&services, &faults), settings)
            .expect("test settings are valid");
        Self {
            services,
            faults,
            orchestrator,
        }
    }

    pub fn seed_document(&self, id: &str, title: &str, tags: &[&str]) {
        self.services.content.insert_document(Document {
            id: id.to_string(),
            title: title.to_string(),
            owner_id: "user_john".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 1024,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
        });
    }

    pub fn seed_workflow(&self, id: &str, status: &str, triggers: &[&str]) {
        self.services.workflow.add_workflow(Workflow {
            id: id.to_string(),
            name: id.replace('_', " "),
            status: status.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        });
    }

    /// Subscribe a recorder to the orchestrator's events.
    pub fn record_events(&self) -> EventRecorder {
        let recorder = EventRecorder::default();
        let events = recorder.events.clone();
        self.orchestrator
            .subscribe(move |event| events.lock().push(event.clone()));
        recorder
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<OrchestratorEvent>>>,
}

impl EventRecorder {
    pub fn events(&self) -> Vec<OrchestratorEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(OrchestratorEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

pub fn onboarding_input(email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "email": email, "password": password })
}

/// Initialize a test subscriber once; ignores an already installed one.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("crossflow_core=debug")
        .with_test_writer()
        .try_init();
}
