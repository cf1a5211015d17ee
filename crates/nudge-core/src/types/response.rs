use crate::types::enums::TaskResponse;
use crate::types::ids::{ConversationId, TaskId, UserHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Append-only audit row for every response received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResponseLogEntry {
    pub id: i64,
    pub task_id: TaskId,
    pub responder: UserHandle,
    pub conversation: ConversationId,
    pub response: TaskResponse,
    pub responded_at: DateTime<Utc>,
}
