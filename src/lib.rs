#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Crossflow Core
//!
//! Cross-service orchestration core: runs multi-step business operations that
//! span independently deployed identity, messaging, content and workflow
//! services, and reports each one as a single well-formed result.
//!
//! ## Overview
//!
//! A caller invokes the [`Orchestrator`] with an operation name and input. The
//! engine publishes a start event, runs the operation's steps against the
//! service adapters (concurrently where steps are independent, in sequence
//! where one needs another's output), retries transient step failures,
//! records metrics and publishes a completion or error event.
//!
//! Optional steps degrade gracefully: their failures are collected per service
//! in `service_errors` while the operation still succeeds. A failing required
//! step fails the operation. Completed steps are never compensated, so
//! operations are at-least-once and non-atomic.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Engine, composite operations, retry and batching
//! - [`services`] - Service adapter traits, payloads and in-memory adapters
//! - [`health`] - Health probes, aggregation and the periodic monitor
//! - [`metrics`] - Operation and availability metrics, OpenTelemetry export
//! - [`events`] - Lifecycle and health event bus
//! - [`config`] - Engine and health configuration, layered loading
//! - [`error`] - Service and orchestrator error types
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crossflow_core::config::Settings;
//! use crossflow_core::orchestration::OnboardingInput;
//! use crossflow_core::services::memory::InMemoryServices;
//! use crossflow_core::Orchestrator;
//!
//! # async fn example() -> crossflow_core::Result<()> {
//! let services = InMemoryServices::new();
//! let orchestrator = Orchestrator::new(services.adapters(), Settings::default())?;
//!
//! let result = orchestrator
//!     .onboard_user(OnboardingInput {
//!         email: "john@example.com".to_string(),
//!         password: "password123".to_string(),
//!     })
//!     .await;
//!
//! if let Some(onboarding) = result.data() {
//!     println!("Welcome {}", onboarding.user.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod orchestration;
pub mod services;

pub use config::{ConfigStore, ConfigUpdate, HealthConfig, OrchestratorConfig, Settings};
pub use error::{OrchestratorError, Result, ServiceError, ServiceErrors, ServiceResult};
pub use events::{EventBus, EventKind, OrchestratorEvent, SubscriptionId};
pub use health::{HealthCheckResult, HealthMonitor, HealthProbe, HealthStatus, SystemHealthCheck};
pub use metrics::{MetricsCollector, OrchestratorMetrics};
pub use orchestration::{CompositeOperation, OperationResult, Orchestrator, StepSpec};
pub use services::{ServiceAdapters, ServiceKind};
