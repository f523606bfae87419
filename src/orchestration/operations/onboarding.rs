//! User onboarding: sign in, then greet the user and gather a starter
//! dashboard.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CompositeOperation;
use crate::error::Result;
use crate::orchestration::context::StepContext;
use crate::orchestration::types::StepSpec;
use crate::services::{
    Credentials, Document, DocumentQuery, NewNotification, Notification, ServiceKind, TokenPair,
    User, Workflow, WorkflowQuery,
};

const RECENT_DOCUMENTS: usize = 5;
const AVAILABLE_WORKFLOWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingResult {
    pub user: User,
    pub tokens: TokenPair,
    pub welcome_notification: Option<Notification>,
    pub recent_documents: Vec<Document>,
    pub available_workflows: Vec<Workflow>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Onboarding;

#[async_trait]
impl CompositeOperation for Onboarding {
    type Input = OnboardingInput;
    type Output = OnboardingResult;

    fn name(&self) -> &'static str {
        "onboarding"
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![
            StepSpec::required("authenticate", ServiceKind::Identity),
            StepSpec::optional("welcome_notification", ServiceKind::Messaging).after(&["authenticate"]),
            StepSpec::optional("recent_documents", ServiceKind::Content).after(&["authenticate"]),
            StepSpec::optional("available_workflows", ServiceKind::Workflow).after(&["authenticate"]),
        ]
    }

    async fn run(&self, ctx: &StepContext, input: OnboardingInput) -> Result<OnboardingResult> {
        let services = ctx.services();
        let credentials = Credentials {
            email: input.email,
            password: input.password,
        };

        let session = ctx
            .required("authenticate", ServiceKind::Identity, || {
                services.identity.authenticate(&credentials)
            })
            .await?;

        let welcome = NewNotification {
            kind: "welcome".to_string(),
            title: "Welcome!".to_string(),
            message: format!("Welcome aboard, {}!", session.user.name),
            recipient_id: Some(session.user.id.clone()),
            data: None,
        };
        let documents = DocumentQuery {
            limit: RECENT_DOCUMENTS,
            ..DocumentQuery::default()
        };
        let workflows = WorkflowQuery {
            limit: AVAILABLE_WORKFLOWS,
            status: Some("active".to_string()),
            ..WorkflowQuery::default()
        };

        let (welcome_notification, recent_documents, available_workflows) = tokio::join!(
            ctx.optional("welcome_notification", ServiceKind::Messaging, || {
                services.messaging.create_notification(&welcome)
            }),
            ctx.optional("recent_documents", ServiceKind::Content, || {
                services.content.list_documents(&documents)
            }),
            ctx.optional("available_workflows", ServiceKind::Workflow, || {
                services.workflow.list_workflows(&workflows)
            }),
        );

        Ok(OnboardingResult {
            tokens: session.tokens(),
            user: session.user,
            welcome_notification,
            recent_documents: recent_documents.unwrap_or_default(),
            available_workflows: available_workflows.unwrap_or_default(),
        })
    }
}
