//! In-process adapters backed by plain collections.
//!
//! Used by the `crossflow` binary's default wiring and as a baseline in tests.
//! They never fail transiently; validation and authorization failures are
//! reported exactly as a remote service would report them.

use super::*;
use crate::error::ServiceError;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

const MEMORY_SERVICE_VERSION: &str = "memory-1.0.0";

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Identity store with a seeded demo account.
#[derive(Debug)]
pub struct InMemoryIdentityService {
    accounts: Mutex<HashMap<String, (String, User)>>,
    sessions: Mutex<HashMap<String, String>>,
    current_user: Mutex<Option<User>>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            current_user: Mutex::new(None),
        }
    }

    /// Store with the `john@example.com` / `password123` account.
    pub fn with_demo_account() -> Self {
        let service = Self::new();
        service.add_account(
            "password123",
            User {
                id: "user_john".to_string(),
                email: "john@example.com".to_string(),
                name: "John Doe".to_string(),
                roles: vec!["member".to_string()],
            },
        );
        service
    }

    pub fn add_account(&self, password: &str, user: User) {
        self.accounts
            .lock()
            .insert(user.email.clone(), (password.to_string(), user));
    }

    fn issue_tokens(&self, user_id: &str) -> TokenPair {
        let tokens = TokenPair {
            access_token: new_id("at"),
            refresh_token: new_id("rt"),
        };
        self.sessions
            .lock()
            .insert(tokens.refresh_token.clone(), user_id.to_string());
        tokens
    }
}

impl Default for InMemoryIdentityService {
    fn default() -> Self {
        Self::with_demo_account()
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn authenticate(&self, credentials: &Credentials) -> ServiceResult<AuthSession> {
        let user = {
            let accounts = self.accounts.lock();
            match accounts.get(&credentials.email) {
                Some((password, user)) if *password == credentials.password => user.clone(),
                _ => {
                    return Err(ServiceError::unauthorized(
                        ServiceKind::Identity,
                        "authenticate",
                        "Invalid credentials",
                    ))
                }
            }
        };

        let tokens = self.issue_tokens(&user.id);
        *self.current_user.lock() = Some(user.clone());

        Ok(AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user,
        })
    }

    async fn fetch_current_user(&self) -> ServiceResult<User> {
        self.current_user.lock().clone().ok_or_else(|| {
            ServiceError::unauthorized(ServiceKind::Identity, "fetch_current_user", "Not authenticated")
        })
    }

    async fn refresh_credentials(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        let user_id = self.sessions.lock().remove(refresh_token).ok_or_else(|| {
            ServiceError::unauthorized(
                ServiceKind::Identity,
                "refresh_credentials",
                "Unknown refresh token",
            )
        })?;
        Ok(self.issue_tokens(&user_id))
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        Ok(ServiceHealth::healthy(MEMORY_SERVICE_VERSION))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMessagingService {
    notifications: Mutex<Vec<Notification>>,
    messages: Mutex<Vec<Message>>,
    conversations: Mutex<Vec<Conversation>>,
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> ServiceResult<Vec<Notification>> {
        let notifications = self.notifications.lock();
        let matching = notifications
            .iter()
            .filter(|n| {
                filter
                    .recipient_id
                    .as_ref()
                    .map_or(true, |r| n.recipient_id.as_ref() == Some(r))
            })
            .filter(|n| !filter.unread_only || !n.read)
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> ServiceResult<Notification> {
        if notification.title.trim().is_empty() {
            return Err(ServiceError::validation(
                ServiceKind::Messaging,
                "create_notification",
                "title must not be empty",
            ));
        }

        let created = Notification {
            id: new_id("ntf"),
            kind: notification.kind.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            recipient_id: notification.recipient_id.clone(),
            data: notification.data.clone(),
            read: false,
            created_at: Utc::now(),
        };
        self.notifications.lock().push(created.clone());
        Ok(created)
    }

    async fn send_message(&self, message: &NewMessage) -> ServiceResult<Message> {
        let known = self
            .conversations
            .lock()
            .iter()
            .any(|c| c.id == message.conversation_id);
        if !known {
            return Err(ServiceError::from_status(
                ServiceKind::Messaging,
                "send_message",
                404,
                format!("conversation {} not found", message.conversation_id),
            ));
        }

        let sent = Message {
            id: new_id("msg"),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            sent_at: Utc::now(),
        };
        self.messages.lock().push(sent.clone());
        Ok(sent)
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> ServiceResult<Vec<Conversation>> {
        let conversations = self.conversations.lock();
        Ok(conversations
            .iter()
            .filter(|c| {
                filter
                    .participant_id
                    .as_ref()
                    .map_or(true, |p| c.participants.contains(p))
            })
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> ServiceResult<Conversation> {
        if conversation.participants.is_empty() {
            return Err(ServiceError::validation(
                ServiceKind::Messaging,
                "create_conversation",
                "a conversation needs at least one participant",
            ));
        }

        let created = Conversation {
            id: new_id("conv"),
            name: conversation.name.clone(),
            participants: conversation.participants.clone(),
            created_at: Utc::now(),
        };
        self.conversations.lock().push(created.clone());
        Ok(created)
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        Ok(ServiceHealth::healthy(MEMORY_SERVICE_VERSION))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryContentService {
    documents: Mutex<Vec<Document>>,
    versions: Mutex<HashMap<String, Vec<DocumentVersion>>>,
}

impl InMemoryContentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, document: Document) {
        self.versions.lock().insert(
            document.id.clone(),
            vec![DocumentVersion {
                document_id: document.id.clone(),
                version: 1,
                created_at: document.created_at,
            }],
        );
        self.documents.lock().push(document);
    }
}

#[async_trait]
impl ContentService for InMemoryContentService {
    async fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>> {
        let owner = query
            .filters
            .as_ref()
            .and_then(|f| f.get("owner_id"))
            .and_then(|v| v.as_str());

        let documents = self.documents.lock();
        Ok(documents
            .iter()
            .filter(|d| owner.map_or(true, |o| d.owner_id == o))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn search_documents(&self, request: &SearchRequest) -> ServiceResult<SearchResults> {
        if request.limit == 0 {
            return Err(ServiceError::validation(
                ServiceKind::Content,
                "search_documents",
                "limit must be greater than zero",
            ));
        }

        let needle = request.query.to_lowercase();
        let mut matches: Vec<Document> = self
            .documents
            .lock()
            .iter()
            .filter(|d| {
                d.title.to_lowercase().contains(&needle)
                    || d.tags.iter().any(|t| t.to_lowercase() == needle)
            })
            .cloned()
            .collect();

        match request.sort_by.as_str() {
            "title" => matches.sort_by(|a, b| a.title.cmp(&b.title)),
            _ => matches.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        if request.sort_order == SortOrder::Desc {
            matches.reverse();
        }

        let total = matches.len();
        matches.truncate(request.limit);

        Ok(SearchResults {
            documents: matches,
            total,
            page: 1,
            limit: request.limit,
            query: request.query.clone(),
        })
    }

    async fn upload_file(&self, upload: &FileUpload) -> ServiceResult<Document> {
        if upload.file_name.trim().is_empty() {
            return Err(ServiceError::validation(
                ServiceKind::Content,
                "upload_file",
                "file name must not be empty",
            ));
        }

        let document = Document {
            id: new_id("doc"),
            title: upload.file_name.clone(),
            owner_id: upload.owner_id.clone(),
            content_type: upload.content_type.clone(),
            size_bytes: upload.content.len() as u64,
            tags: Vec::new(),
            created_at: Utc::now(),
        };
        self.insert_document(document.clone());
        Ok(document)
    }

    async fn list_document_versions(
        &self,
        document_id: &str,
    ) -> ServiceResult<Vec<DocumentVersion>> {
        self.versions.lock().get(document_id).cloned().ok_or_else(|| {
            ServiceError::from_status(
                ServiceKind::Content,
                "list_document_versions",
                404,
                format!("document {document_id} not found"),
            )
        })
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        Ok(ServiceHealth::healthy(MEMORY_SERVICE_VERSION))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWorkflowService {
    workflows: Mutex<Vec<Workflow>>,
    ai_tasks: Mutex<Vec<AiTask>>,
    executions: Mutex<Vec<WorkflowExecution>>,
}

impl InMemoryWorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workflow(&self, workflow: Workflow) {
        self.workflows.lock().push(workflow);
    }

    pub fn add_ai_task(&self, task: AiTask) {
        self.ai_tasks.lock().push(task);
    }

    pub fn executions(&self) -> Vec<WorkflowExecution> {
        self.executions.lock().clone()
    }
}

#[async_trait]
impl WorkflowService for InMemoryWorkflowService {
    async fn list_workflows(&self, query: &WorkflowQuery) -> ServiceResult<Vec<Workflow>> {
        let workflows = self.workflows.lock();
        Ok(workflows
            .iter()
            .filter(|w| query.status.as_ref().map_or(true, |s| &w.status == s))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn execute_workflow(
        &self,
        request: &ExecuteWorkflowRequest,
    ) -> ServiceResult<WorkflowExecution> {
        let active = self
            .workflows
            .lock()
            .iter()
            .find(|w| w.id == request.id)
            .map(Workflow::is_active);

        match active {
            None => Err(ServiceError::from_status(
                ServiceKind::Workflow,
                "execute_workflow",
                404,
                format!("workflow {} not found", request.id),
            )),
            Some(false) => Err(ServiceError::from_status(
                ServiceKind::Workflow,
                "execute_workflow",
                409,
                format!("workflow {} is not active", request.id),
            )),
            Some(true) => {
                let execution = WorkflowExecution {
                    execution_id: new_id("exec"),
                    workflow_id: request.id.clone(),
                    status: match request.execution_mode {
                        ExecutionMode::Sync => "completed".to_string(),
                        ExecutionMode::Async => "running".to_string(),
                    },
                    started_at: Utc::now(),
                };
                self.executions.lock().push(execution.clone());
                Ok(execution)
            }
        }
    }

    async fn list_ai_tasks(&self, query: &AiTaskQuery) -> ServiceResult<Vec<AiTask>> {
        let tasks = self.ai_tasks.lock();
        Ok(tasks
            .iter()
            .filter(|t| query.task_type.as_ref().map_or(true, |k| &t.task_type == k))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn execute_ai_task(
        &self,
        request: &ExecuteAiTaskRequest,
    ) -> ServiceResult<AiTaskExecution> {
        let task = self
            .ai_tasks
            .lock()
            .iter()
            .find(|t| t.id == request.task_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::from_status(
                    ServiceKind::Workflow,
                    "execute_ai_task",
                    404,
                    format!("AI task {} not found", request.task_id),
                )
            })?;

        Ok(AiTaskExecution {
            execution_id: new_id("aix"),
            task_id: task.id,
            status: "completed".to_string(),
            output: Some(json!({ "task_type": task.task_type, "input": request.input })),
        })
    }

    async fn health_check(&self) -> ServiceResult<ServiceHealth> {
        Ok(ServiceHealth::healthy(MEMORY_SERVICE_VERSION))
    }
}

/// All four in-memory adapters, plus handles for inspecting their state.
#[derive(Debug, Clone)]
pub struct InMemoryServices {
    pub identity: Arc<InMemoryIdentityService>,
    pub messaging: Arc<InMemoryMessagingService>,
    pub content: Arc<InMemoryContentService>,
    pub workflow: Arc<InMemoryWorkflowService>,
}

impl InMemoryServices {
    pub fn new() -> Self {
        Self {
            identity: Arc::new(InMemoryIdentityService::with_demo_account()),
            messaging: Arc::new(InMemoryMessagingService::new()),
            content: Arc::new(InMemoryContentService::new()),
            workflow: Arc::new(InMemoryWorkflowService::new()),
        }
    }

    pub fn adapters(&self) -> ServiceAdapters {
        ServiceAdapters::new(
            self.identity.clone(),
            self.messaging.clone(),
            self.content.clone(),
            self.workflow.clone(),
        )
    }
}

impl Default for InMemoryServices {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_account_authenticates() {
        let identity = InMemoryIdentityService::with_demo_account();
        let session = identity
            .authenticate(&Credentials {
                email: "john@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.user.email, "john@example.com");
        assert_eq!(identity.fetch_current_user().await.unwrap().id, "user_john");

        let refreshed = identity
            .refresh_credentials(&session.refresh_token)
            .await
            .unwrap();
        assert_ne!(refreshed.refresh_token, session.refresh_token);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let identity = InMemoryIdentityService::with_demo_account();
        let err = identity
            .authenticate(&Credentials {
                email: "john@example.com".to_string(),
                password: "nope".to_string(),
            })
            .await
            .unwrap_err();

        assert!(err.is_authorization());
        assert!(!err.retryable);
        assert_eq!(err.message, "Invalid credentials");
    }

    #[tokio::test]
    async fn test_search_sorts_and_limits() {
        let content = InMemoryContentService::new();
        for title in ["beta report", "alpha report", "gamma notes"] {
            content
                .upload_file(&FileUpload {
                    file_name: title.to_string(),
                    content_type: "text/plain".to_string(),
                    owner_id: "u1".to_string(),
                    content: "x".to_string(),
                })
                .await
                .unwrap();
        }

        let results = content
            .search_documents(&SearchRequest {
                query: "report".to_string(),
                limit: 1,
                sort_by: "title".to_string(),
                sort_order: SortOrder::Asc,
            })
            .await
            .unwrap();

        assert_eq!(results.total, 2);
        assert_eq!(results.documents.len(), 1);
        assert_eq!(results.documents[0].title, "alpha report");
    }

    #[tokio::test]
    async fn test_inactive_workflow_cannot_execute() {
        let workflow = InMemoryWorkflowService::new();
        workflow.add_workflow(Workflow {
            id: "wf_1".to_string(),
            name: "Paused".to_string(),
            status: "paused".to_string(),
            triggers: vec![],
        });

        let err = workflow
            .execute_workflow(&ExecuteWorkflowRequest {
                id: "wf_1".to_string(),
                input_data: json!({}),
                execution_mode: ExecutionMode::Async,
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(409));
        assert!(!err.retryable);
    }
}
