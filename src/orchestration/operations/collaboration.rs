//! Collaboration setup: open a conversation owned by the current user and
//! invite the participants.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CompositeOperation;
use crate::error::Result;
use crate::orchestration::context::StepContext;
use crate::orchestration::types::StepSpec;
use crate::services::{
    Conversation, Message, NewConversation, NewMessage, NewNotification, Notification,
    ServiceKind, User,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationInput {
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub initial_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationResult {
    pub owner: User,
    pub conversation: Conversation,
    pub initial_message: Option<Message>,
    pub invitations: Vec<Notification>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollaborationSetup;

#[async_trait]
impl CompositeOperation for CollaborationSetup {
    type Input = CollaborationInput;
    type Output = CollaborationResult;

    fn name(&self) -> &'static str {
        "collaboration_setup"
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![
            StepSpec::required("current_user", ServiceKind::Identity),
            StepSpec::required("create_conversation", ServiceKind::Messaging).after(&["current_user"]),
            StepSpec::optional("initial_message", ServiceKind::Messaging)
                .after(&["create_conversation"]),
            StepSpec::optional("invite_participant", ServiceKind::Messaging)
                .after(&["create_conversation"]),
        ]
    }

    async fn run(&self, ctx: &StepContext, input: CollaborationInput) -> Result<CollaborationResult> {
        let services = ctx.services();

        let owner = ctx
            .required("current_user", ServiceKind::Identity, || {
                services.identity.fetch_current_user()
            })
            .await?;

        // Owner first, then each invitee once.
        let mut participants = vec![owner.id.clone()];
        for participant in input.participants {
            if !participants.contains(&participant) {
                participants.push(participant);
            }
        }
        let request = NewConversation {
            name: input.name,
            participants,
        };

        let conversation = ctx
            .required("create_conversation", ServiceKind::Messaging, || {
                services.messaging.create_conversation(&request)
            })
            .await
            .map_err(|e| e.with_partial(json!({ "owner": owner })))?;

        let opening = input.initial_message.map(|content| NewMessage {
            conversation_id: conversation.id.clone(),
            sender_id: owner.id.clone(),
            content,
        });
        let invitations: Vec<NewNotification> = conversation
            .participants
            .iter()
            .filter(|id| **id != owner.id)
            .map(|id| NewNotification {
                kind: "conversation_invite".to_string(),
                title: format!("{} invited you to \"{}\"", owner.name, conversation.name),
                message: format!("Join the conversation \"{}\"", conversation.name),
                recipient_id: Some(id.clone()),
                data: Some(json!({ "conversation_id": conversation.id })),
            })
            .collect();

        let (initial_message, invited) = tokio::join!(
            async {
                match &opening {
                    Some(message) => {
                        ctx.optional("initial_message", ServiceKind::Messaging, || {
                            services.messaging.send_message(message)
                        })
                        .await
                    }
                    None => None,
                }
            },
            join_all(invitations.iter().map(|notice| {
                ctx.optional("invite_participant", ServiceKind::Messaging, move || {
                    services.messaging.create_notification(notice)
                })
            })),
        );

        Ok(CollaborationResult {
            owner,
            conversation,
            initial_message,
            invitations: invited.into_iter().flatten().collect(),
        })
    }
}
