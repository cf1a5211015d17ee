use crate::types::{ReminderTier, ResponseLogEntry, Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    TaskCreated {
        task: Task,
    },
    TaskRemoved {
        task: Task,
    },
    TaskNotified {
        task_id: TaskId,
        next_run_at: Option<DateTime<Utc>>,
    },
    FollowUpSent {
        task_id: TaskId,
        reminder_count: u32,
        tier: ReminderTier,
    },
    FinalNoticeSent {
        task_id: TaskId,
        reminder_count: u32,
    },
    ResponseRecorded {
        entry: ResponseLogEntry,
    },
    ReminderPostponed {
        task_id: TaskId,
        reminder_count: u32,
        next_reminder_at: DateTime<Utc>,
    },
    TaskCompleted {
        task: Task,
    },
    CycleCompleted {
        task: Task,
    },
}
