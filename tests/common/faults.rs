use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossflow_core::error::{ServiceError, ServiceResult};
use crossflow_core::services::memory::InMemoryServices;
use crossflow_core::services::*;

/// What happens when a faulted method is called.
#[derive(Debug, Clone, Default)]
pub struct Fault {
    pub error: Option<ServiceError>,
    /// How many calls fail; `None` fails every call.
    pub times: Option<u32>,
    pub delay: Option<Duration>,
    pub panic: bool,
}

/// Per-method fault table and call counter, keyed `"service.method"`.
#[derive(Debug, Default)]
pub struct FaultInjector {
    faults: Mutex<HashMap<String, Fault>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FaultInjector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, method: &str, fault: Fault) {
        self.faults.lock().insert(method.to_string(), fault);
    }

    /// Fail every call to `method`.
    pub fn fail(&self, method: &str, error: ServiceError) {
        self.set(
            method,
            Fault {
                error: Some(error),
                ..Fault::default()
            },
        );
    }

    /// Fail the first `times` calls to `method`.
    pub fn fail_times(&self, method: &str, error: ServiceError, times: u32) {
        self.set(
            method,
            Fault {
                error: Some(error),
                times: Some(times),
                ..Fault::default()
            },
        );
    }

    pub fn delay(&self, method: &str, delay: Duration) {
        self.set(
            method,
            Fault {
                delay: Some(delay),
                ..Fault::default()
            },
        );
    }

    pub fn panic_on(&self, method: &str) {
        self.set(
            method,
            Fault {
                panic: true,
                ..Fault::default()
            },
        );
    }

    pub fn calls(&self, method: &str) -> u32 {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    /// Called at the top of every wrapped adapter method.
    pub async fn enter(&self, method: &str) -> ServiceResult<()> {
        *self.calls.lock().entry(method.to_string()).or_default() += 1;
        let Some(fault) = self.faults.lock().get(method).cloned() else {
            return Ok(());
        };

        if let Some(delay) = fault.delay {
            tokio::time::sleep(delay).await;
        }
        if fault.panic {
            panic!("injected panic in {method}");
        }
        if let Some(error) = fault.error {
            let mut failures = self.failures.lock();
            let failed = failures.entry(method.to_string()).or_default();
            if fault.times.map_or(true, |times| *failed < times) {
                *failed += 1;
                return Err(error);
            }
        }
        Ok(())
    }
}

pub struct FaultyIdentity {
    inner: Arc<dyn IdentityService>,
    faults: Arc<FaultInjector>,
}

#[async_trait]
impl IdentityService for FaultyIdentity {
    async fn authenticate(&self, credentials: &Credentials) -> ServiceResult<AuthSession> {
        self.faults.enter("identity.authenticate").await?;
        self.inner.authenticate(credentials).await
    }

    async fn fetch_current_user(&self) -> ServiceResult<User> {
        self.faults.enter("identity.fetch_current_user").await?;
        self.inner.fetch_current_user().await
    }

    async fn refresh_credentials(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        self.faults.enter("identity.refresh_credentials").await?;
        self.inner.refresh_credentials(refresh_token).await
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        self.faults.enter("identity.health_check").await?;
        self.inner.health_check().await
    }
}

pub struct FaultyMessaging {
    inner: Arc<dyn MessagingService>,
    faults: Arc<FaultInjector>,
}

#[async_trait]
impl MessagingService for FaultyMessaging {
    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> ServiceResult<Vec<Notification>> {
        self.faults.enter("messaging.list_notifications").await?;
        self.inner.list_notifications(filter).await
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> ServiceResult<Notification> {
        self.faults.enter("messaging.create_notification").await?;
        self.inner.create_notification(notification).await
    }

    async fn send_message(&self, message: &NewMessage) -> ServiceResult<Message> {
        self.faults.enter("messaging.send_message").await?;
        self.inner.send_message(message).await
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> ServiceResult<Vec<Conversation>> {
        self.faults.enter("messaging.list_conversations").await?;
        self.inner.list_conversations(filter).await
    }

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> ServiceResult<Conversation> {
        self.faults.enter("messaging.create_conversation").await?;
        self.inner.create_conversation(conversation).await
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        self.faults.enter("messaging.health_check").await?;
        self.inner.health_check().await
    }
}

pub struct FaultyContent {
    inner: Arc<dyn ContentService>,
    faults: Arc<FaultInjector>,
}

#[async_trait]
impl ContentService for FaultyContent {
    async fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>> {
        self.faults.enter("content.list_documents").await?;
        self.inner.list_documents(query).await
    }

    async fn search_documents(&self, request: &SearchRequest) -> ServiceResult<SearchResults> {
        self.faults.enter("content.search_documents").await?;
        self.inner.search_documents(request).await
    }

    async fn upload_file(&self, upload: &FileUpload) -> ServiceResult<Document> {
        self.faults.enter("content.upload_file").await?;
        self.inner.upload_file(upload).await
    }

    async fn list_document_versions(
        &self,
        document_id: &str,
    ) -> ServiceResult<Vec<DocumentVersion>> {
        self.faults.enter("content.list_document_versions").await?;
        self.inner.list_document_versions(document_id).await
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        self.faults.enter("content.health_check").await?;
        self.inner.health_check().await
    }
}

pub struct FaultyWorkflow {
    inner: Arc<dyn WorkflowService>,
    faults: Arc<FaultInjector>,
}

#[async_trait]
impl WorkflowService for FaultyWorkflow {
    async fn list_workflows(&self, query: &WorkflowQuery) -> ServiceResult<Vec<Workflow>> {
        self.faults.enter("workflow.list_workflows").await?;
        self.inner.list_workflows(query).await
    }

    async fn execute_workflow(
        &self,
        request: &ExecuteWorkflowRequest,
    ) -> ServiceResult<WorkflowExecution> {
        self.faults.enter("workflow.execute_workflow").await?;
        self.inner.execute_workflow(request).await
    }

    async fn list_ai_tasks(&self, query: &AiTaskQuery) -> ServiceResult<Vec<AiTask>> {
        self.faults.enter("workflow.list_ai_tasks").await?;
        self.inner.list_ai_tasks(query).await
    }

    async fn execute_ai_task(
        &self,
        request: &ExecuteAiTaskRequest,
    ) -> ServiceResult<AiTaskExecution> {
        self.faults.enter("workflow.execute_ai_task").await?;
        self.inner.execute_ai_task(request).await
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        self.faults.enter("workflow.health_check").await?;
        self.inner.health_check().await
    }
}

/// Wrap in-memory adapters so every call goes through `faults` first.
pub fn faulty_adapters(services: &InMemoryServices, faults: &Arc<FaultInjector>) -> ServiceAdapters {
    let adapters = services.adapters();
    ServiceAdapters::new(
        Arc::new(FaultyIdentity {
            inner: adapters.identity,
            faults: faults.clone(),
        }),
        Arc::new(FaultyMessaging {
            inner: adapters.messaging,
            faults: faults.clone(),
        }),
        Arc::new(FaultyContent {
            inner: adapters.content,
            faults: faults.clone(),
        }),
        Arc::new(FaultyWorkflow {
            inner: adapters.workflow,
            faults: faults.clone(),
        }),
    )
}
