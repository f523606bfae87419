//! # Composite Operations
//!
//! A composite operation is a named composition of adapter calls executed as
//! one unit. Each operation declares its steps up front (see [`StepSpec`]) and
//! runs them through a [`StepContext`], which applies the retry policy and
//! records optional-step failures.
//!
//! Built-in operations:
//!
//! | name                  | required steps                           |
//! |-----------------------|------------------------------------------|
//! | `onboarding`          | `authenticate`                           |
//! | `document_processing` | `upload_file`                            |
//! | `search_and_trigger`  | `search_documents`                       |
//! | `collaboration_setup` | `current_user`, `create_conversation`    |
//!
//! Steps that already completed are never undone when a later required step
//! fails: side effects such as sent notifications persist, and a caller that
//! retries the whole operation may repeat them.

mod collaboration;
mod document_processing;
mod onboarding;
mod search_and_trigger;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::context::StepContext;
use super::types::StepSpec;
use crate::error::{OrchestratorError, Result};

pub use collaboration::{CollaborationInput, CollaborationResult, CollaborationSetup};
pub use document_processing::{DocumentProcessing, DocumentProcessingInput, DocumentProcessingResult};
pub use onboarding::{Onboarding, OnboardingInput, OnboardingResult};
pub use search_and_trigger::{SearchAndTrigger, SearchAndTriggerInput, SearchAndTriggerResult};

/// A strongly typed composite operation.
#[async_trait]
pub trait CompositeOperation: Send + Sync + 'static {
    type Input: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    /// Registry key.
    fn name(&self) -> &'static str;

    fn steps(&self) -> Vec<StepSpec>;

    async fn run(&self, ctx: &StepContext, input: Self::Input) -> Result<Self::Output>;
}

/// JSON-in, JSON-out view of a [`CompositeOperation`], used by the
/// name-keyed registry.
#[async_trait]
pub(crate) trait DynOperation: Send + Sync {
    fn operation_name(&self) -> &'static str;

    fn plan(&self) -> Vec<StepSpec>;

    async fn run_json(&self, ctx: &StepContext, input: Value) -> Result<Value>;
}

#[async_trait]
impl<O: CompositeOperation> DynOperation for O {
    fn operation_name(&self) -> &'static str {
        self.name()
    }

    fn plan(&self) -> Vec<StepSpec> {
        self.steps()
    }

    async fn run_json(&self, ctx: &StepContext, input: Value) -> Result<Value> {
        let input: O::Input = serde_json::from_value(input)
            .map_err(|e| OrchestratorError::invalid_input(self.name(), e.to_string()))?;
        let output = self.run(ctx, input).await?;
        serde_json::to_value(output).map_err(|e| OrchestratorError::Serialization {
            operation: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}

/// The operations every orchestrator registers at construction.
pub(crate) fn builtin() -> Vec<std::sync::Arc<dyn DynOperation>> {
    vec![
        std::sync::Arc::new(Onboarding),
        std::sync::Arc::new(DocumentProcessing),
        std::sync::Arc::new(SearchAndTrigger),
        std::sync::Arc::new(CollaborationSetup),
    ]
}
