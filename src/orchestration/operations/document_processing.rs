//! Document intake: store the upload, then enrich it and tell the owner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CompositeOperation;
use crate::error::Result;
use crate::orchestration::context::StepContext;
use crate::orchestration::types::StepSpec;
use crate::services::{
    AiTaskExecution, Document, DocumentVersion, ExecuteAiTaskRequest, FileUpload, NewNotification,
    Notification, ServiceKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProcessingInput {
    /// Carries the owner through `file.owner_id`.
    pub file: FileUpload,
    /// AI task to run against the stored document; analysis is skipped when
    /// absent.
    #[serde(default)]
    pub ai_task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProcessingResult {
    pub document: Document,
    pub versions: Vec<DocumentVersion>,
    pub analysis: Option<AiTaskExecution>,
    pub owner_notification: Option<Notification>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessing;

#[async_trait]
impl CompositeOperation for DocumentProcessing {
    type Input = DocumentProcessingInput;
    type Output = DocumentProcessingResult;

    fn name(&self) -> &'static str {
        "document_processing"
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![
            StepSpec::required("upload_file", ServiceKind::Content),
            StepSpec::optional("document_versions", ServiceKind::Content).after(&["upload_file"]),
            StepSpec::optional("ai_analysis", ServiceKind::Workflow).after(&["upload_file"]),
            StepSpec::optional("owner_notification", ServiceKind::Messaging)
                .after(&["upload_file", "ai_analysis"]),
        ]
    }

    async fn run(
        &self,
        ctx: &StepContext,
        input: DocumentProcessingInput,
    ) -> Result<DocumentProcessingResult> {
        let services = ctx.services();
        let upload = input.file;

        let document = ctx
            .required("upload_file", ServiceKind::Content, || {
                services.content.upload_file(&upload)
            })
            .await?;

        let analysis_request = input.ai_task_id.map(|task_id| ExecuteAiTaskRequest {
            task_id,
            input: json!({
                "document_id": document.id,
                "title": document.title,
                "content_type": document.content_type,
            }),
        });

        let (versions, analysis) = tokio::join!(
            ctx.optional("document_versions", ServiceKind::Content, || {
                services.content.list_document_versions(&document.id)
            }),
            async {
                match &analysis_request {
                    Some(request) => {
                        ctx.optional("ai_analysis", ServiceKind::Workflow, || {
                            services.workflow.execute_ai_task(request)
                        })
                        .await
                    }
                    None => None,
                }
            },
        );

        let notice = NewNotification {
            kind: "document_processed".to_string(),
            title: "Document ready".to_string(),
            message: format!("\"{}\" has been uploaded and processed", document.title),
            recipient_id: Some(upload.owner_id.clone()),
            data: Some(json!({
                "document_id": document.id,
                "analysis_execution_id": analysis.as_ref().map(|a| a.execution_id.clone()),
            })),
        };
        let owner_notification = ctx
            .optional("owner_notification", ServiceKind::Messaging, || {
                services.messaging.create_notification(&notice)
            })
            .await;

        Ok(DocumentProcessingResult {
            document,
            versions: versions.unwrap_or_default(),
            analysis,
            owner_notification,
        })
    }
}
