use crate::types::enums::{Frequency, TaskResponse, TaskStatus};
use crate::types::ids::{ConversationId, TaskId, UserHandle};
use crate::types::time::TimeOfDay;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Raw creation request; `time` and `frequency` are validated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateTaskInput {
    pub description: String,
    pub assignee: String,
    pub conversation: String,
    pub created_by: String,
    pub time: String,
    pub frequency: String,
}

/// A validated task ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub description: String,
    pub assignee: UserHandle,
    pub conversation: ConversationId,
    pub created_by: UserHandle,
    pub time_of_day: TimeOfDay,
    pub frequency: Frequency,
    pub created_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskFilter {
    pub conversation: Option<ConversationId>,
    pub status: Option<Vec<TaskStatus>>,
}

impl TaskFilter {
    pub fn active_in(conversation: ConversationId) -> Self {
        Self {
            conversation: Some(conversation),
            status: Some(vec![TaskStatus::Active]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RespondInput {
    pub task_id: TaskId,
    pub responder: UserHandle,
    pub conversation: ConversationId,
    pub response: TaskResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResponseLogEntry {
    pub task_id: TaskId,
    pub responder: UserHandle,
    pub conversation: ConversationId,
    pub response: TaskResponse,
    pub responded_at: DateTime<Utc>,
}
