//! # Orchestration
//!
//! Composite operation execution: step plans, bounded retries, partial-failure
//! aggregation and batching.
//!
//! ## Components
//!
//! - [`engine::Orchestrator`]: the entry point; runs operations and owns the
//!   config store, metrics, event bus and health monitor
//! - [`operations`]: the [`CompositeOperation`] trait and built-in operations
//! - [`context::StepContext`]: per-invocation step runner shared by all steps
//! - [`retry::RetryPolicy`]: per-step retry loop with timeout and backoff
//! - [`error_classifier`]: categorization of step failures for retry and logs
//! - [`batch`]: grouped execution with per-item status
//!
//! A required step that fails makes the invocation fail; an optional step
//! that fails is recorded under its service in `service_errors` and the
//! invocation still succeeds (degraded success).

pub mod batch;
pub mod context;
pub mod engine;
pub mod error_classifier;
pub mod operations;
pub mod retry;
pub mod types;

pub use batch::{BatchItem, BatchOperation, BatchStatus, ItemStatus};
pub use context::StepContext;
pub use engine::Orchestrator;
pub use error_classifier::{
    ErrorCategory, ErrorClassification, ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
pub use operations::{
    CollaborationInput, CollaborationResult, CollaborationSetup, CompositeOperation,
    DocumentProcessing, DocumentProcessingInput, DocumentProcessingResult, Onboarding,
    OnboardingInput, OnboardingResult, SearchAndTrigger, SearchAndTriggerInput,
    SearchAndTriggerResult,
};
pub use retry::RetryPolicy;
pub use types::{validate_plan, OperationResult, StepSpec};
