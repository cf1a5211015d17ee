use crate::types::ids::TaskId;
use crate::types::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Follow-up state of a task that has been notified and not yet acknowledged.
/// At most one exists per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReminderRecord {
    pub task_id: TaskId,
    pub reminder_count: u32,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub next_reminder_at: DateTime<Utc>,
    pub max_reminders: u32,
    pub created_at: DateTime<Utc>,
}

impl ReminderRecord {
    pub fn is_exhausted(&self) -> bool {
        self.reminder_count >= self.max_reminders
    }
}

/// A reminder record joined to its still-active owning task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OutstandingReminder {
    pub record: ReminderRecord,
    pub task: Task,
}
