use crate::types::enums::{Frequency, TaskState, TaskStatus};
use crate::types::ids::{ConversationId, TaskId, UserHandle};
use crate::types::reminder::ReminderRecord;
use crate::types::time::TimeOfDay;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub assignee: UserHandle,
    pub conversation: ConversationId,
    pub created_by: UserHandle,
    pub time_of_day: TimeOfDay,
    pub frequency: Frequency,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Active && self.next_run_at.is_some_and(|next| next <= now)
    }

    /// Derives the lifecycle state from the row and its reminder record.
    pub fn state(&self, reminder: Option<&ReminderRecord>) -> TaskState {
        match self.status {
            TaskStatus::Completed => TaskState::Completed,
            TaskStatus::Removed => TaskState::Removed,
            TaskStatus::Active if reminder.is_some() => TaskState::Notified,
            TaskStatus::Active if self.next_run_at.is_some() => TaskState::Pending,
            TaskStatus::Active => TaskState::Dormant,
        }
    }
}

/// A task together with its derived state, as listed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskView {
    pub task: Task,
    pub state: TaskState,
    pub reminder: Option<ReminderRecord>,
}
