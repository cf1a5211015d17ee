use crate::error::GatewayError;
use crate::types::{ConversationId, ReminderTier, TaskId, TaskResponse, UserHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum NotificationKind {
    Initial,
    FollowUp { reminder_count: u32, tier: ReminderTier },
    FinalNotice { reminder_count: u32 },
}

/// One button (or typed word) the transport offers the assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionOption {
    pub label: String,
    pub response: TaskResponse,
}

/// Affirmative/negative pair; rendering is up to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionOptions {
    pub affirmative: ActionOption,
    pub negative: ActionOption,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            affirmative: ActionOption {
                label: "YES".to_string(),
                response: TaskResponse::Done,
            },
            negative: ActionOption {
                label: "NO".to_string(),
                response: TaskResponse::NotDone,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub task_id: TaskId,
    pub conversation: ConversationId,
    pub assignee: UserHandle,
    pub kind: NotificationKind,
    pub text: String,
    pub actions: Option<ActionOptions>,
}

/// Outbound delivery to the chat transport.
///
/// Implementations must tolerate being called again for the same
/// notification after a failure; the engine gives no de-duplication.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_notification(&self, notification: &Notification) -> Result<(), GatewayError>;
}
