//! Search documents and react to the results: start every active workflow
//! listening for the trigger and notify the interested users.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CompositeOperation;
use crate::error::Result;
use crate::orchestration::context::StepContext;
use crate::orchestration::types::StepSpec;
use crate::services::{
    ExecuteWorkflowRequest, ExecutionMode, NewNotification, Notification, SearchRequest,
    SearchResults, ServiceKind, SortOrder, WorkflowExecution, WorkflowQuery,
};

pub const DEFAULT_TRIGGER: &str = "search_results";

fn default_limit() -> usize {
    20
}

fn default_trigger() -> String {
    DEFAULT_TRIGGER.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAndTriggerInput {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// User ids to notify about the results.
    #[serde(default)]
    pub notify_users: Vec<String>,
    #[serde(default = "default_trigger")]
    pub trigger: String,
}

impl SearchAndTriggerInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            notify_users: Vec::new(),
            trigger: default_trigger(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAndTriggerResult {
    pub search: SearchResults,
    pub workflows_triggered: Vec<WorkflowExecution>,
    pub notifications_sent: Vec<Notification>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchAndTrigger;

#[async_trait]
impl CompositeOperation for SearchAndTrigger {
    type Input = SearchAndTriggerInput;
    type Output = SearchAndTriggerResult;

    fn name(&self) -> &'static str {
        "search_and_trigger"
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![
            StepSpec::required("search_documents", ServiceKind::Content),
            StepSpec::optional("active_workflows", ServiceKind::Workflow),
            StepSpec::optional("trigger_workflow", ServiceKind::Workflow)
                .after(&["search_documents", "active_workflows"]),
            StepSpec::optional("notify_user", ServiceKind::Messaging).after(&["search_documents"]),
        ]
    }

    async fn run(
        &self,
        ctx: &StepContext,
        input: SearchAndTriggerInput,
    ) -> Result<SearchAndTriggerResult> {
        let services = ctx.services();
        let search_request = SearchRequest {
            query: input.query.clone(),
            limit: input.limit,
            sort_by: "relevance".to_string(),
            sort_order: SortOrder::Desc,
        };
        let workflow_query = WorkflowQuery {
            status: Some("active".to_string()),
            ..WorkflowQuery::default()
        };

        let (search, workflows) = tokio::join!(
            ctx.required("search_documents", ServiceKind::Content, || {
                services.content.search_documents(&search_request)
            }),
            ctx.optional("active_workflows", ServiceKind::Workflow, || {
                services.workflow.list_workflows(&workflow_query)
            }),
        );
        let search = search?;

        let document_ids: Vec<&str> = search.documents.iter().map(|d| d.id.as_str()).collect();
        let triggers: Vec<ExecuteWorkflowRequest> = workflows
            .unwrap_or_default()
            .into_iter()
            .filter(|w| w.is_active() && w.has_trigger(&input.trigger))
            .map(|w| ExecuteWorkflowRequest {
                id: w.id,
                input_data: json!({
                    "trigger": input.trigger,
                    "query": input.query,
                    "total": search.total,
                    "document_ids": document_ids,
                }),
                execution_mode: ExecutionMode::Async,
            })
            .collect();

        let notices: Vec<NewNotification> = input
            .notify_users
            .iter()
            .map(|user_id| NewNotification {
                kind: "search_results".to_string(),
                title: "New search results".to_string(),
                message: format!("{} documents match \"{}\"", search.total, input.query),
                recipient_id: Some(user_id.clone()),
                data: Some(json!({ "query": input.query, "total": search.total })),
            })
            .collect();

        let (triggered, sent) = tokio::join!(
            join_all(triggers.iter().map(|request| {
                ctx.optional("trigger_workflow", ServiceKind::Workflow, move || {
                    services.workflow.execute_workflow(request)
                })
            })),
            join_all(notices.iter().map(|notice| {
                ctx.optional("notify_user", ServiceKind::Messaging, move || {
                    services.messaging.create_notification(notice)
                })
            })),
        );

        Ok(SearchAndTriggerResult {
            search,
            workflows_triggered: triggered.into_iter().flatten().collect(),
            notifications_sent: sent.into_iter().flatten().collect(),
        })
    }
}
