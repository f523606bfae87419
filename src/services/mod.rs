//! # Service Client Adapters
//!
//! One async trait per backend domain. The orchestrator only ever talks to
//! these traits, so transports (HTTP, gRPC, in-process fakes) are swapped
//! without touching orchestration logic.
//!
//! Adapters never retry. They classify their failures through
//! [`ServiceError`](crate::error::ServiceError) and leave retry decisions to
//! the engine.

pub mod memory;
pub mod types;

use crate::error::ServiceResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use types::*;

/// The backend domains the orchestrator coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Identity,
    Messaging,
    Content,
    Workflow,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Identity,
        ServiceKind::Messaging,
        ServiceKind::Content,
        ServiceKind::Workflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Identity => "identity",
            ServiceKind::Messaging => "messaging",
            ServiceKind::Content => "content",
            ServiceKind::Workflow => "workflow",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication and user identity.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServiceResult<AuthSession>;

    async fn fetch_current_user(&self) -> ServiceResult<User>;

    async fn refresh_credentials(&self, refresh_token: &str) -> ServiceResult<TokenPair>;

    /// Lightweight liveness probe.
    async fn health_check(&self) -> ServiceResult<ServiceHealth>;
}

/// Notifications, direct messages and conversations.
#[async_trait]
pub trait MessagingService: Send + Sync {
    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> ServiceResult<Vec<Notification>>;

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> ServiceResult<Notification>;

    async fn send_message(&self, message: &NewMessage) -> ServiceResult<Message>;

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> ServiceResult<Vec<Conversation>>;

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> ServiceResult<Conversation>;

    async fn health_check(&self) -> ServiceResult<ServiceHealth>;
}

/// Documents, search and file storage.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>>;

    async fn search_documents(&self, request: &SearchRequest) -> ServiceResult<SearchResults>;

    async fn upload_file(&self, upload: &FileUpload) -> ServiceResult<Document>;

    async fn list_document_versions(&self, document_id: &str)
        -> ServiceResult<Vec<DocumentVersion>>;

    async fn health_check(&self) -> ServiceResult<ServiceHealth>;
}

/// Workflow definitions and AI task execution.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn list_workflows(&self, query: &WorkflowQuery) -> ServiceResult<Vec<Workflow>>;

    async fn execute_workflow(
        &self,
        request: &ExecuteWorkflowRequest,
    ) -> ServiceResult<WorkflowExecution>;

    async fn list_ai_tasks(&self, query: &AiTaskQuery) -> ServiceResult<Vec<AiTask>>;

    async fn execute_ai_task(
        &self,
        request: &ExecuteAiTaskRequest,
    ) -> ServiceResult<AiTaskExecution>;

    async fn health_check(&self) -> ServiceResult<ServiceHealth>;
}

/// The full set of adapters an orchestrator owns.
#[derive(Clone)]
pub struct ServiceAdapters {
    pub identity: Arc<dyn IdentityService>,
    pub messaging: Arc<dyn MessagingService>,
    pub content: Arc<dyn ContentService>,
    pub workflow: Arc<dyn WorkflowService>,
}

impl ServiceAdapters {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        messaging: Arc<dyn MessagingService>,
        content: Arc<dyn ContentService>,
        workflow: Arc<dyn WorkflowService>,
    ) -> Self {
        Self {
            identity,
            messaging,
            content,
            workflow,
        }
    }

    /// Invoke the health probe of one adapter.
    pub async fn health_check(&self, service: ServiceKind) -> ServiceResult<ServiceHealth> {
        match service {
            ServiceKind::Identity => self.identity.health_check().await,
            ServiceKind::Messaging => self.messaging.health_check().await,
            ServiceKind::Content => self.content.health_check().await,
            ServiceKind::Workflow => self.workflow.health_check().await,
        }
    }
}

impl fmt::Debug for ServiceAdapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAdapters").finish_non_exhaustive()
    }
}
