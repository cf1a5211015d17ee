use crate::error::TaskError;
use crate::types::{OutstandingReminder, ReminderRecord, TaskId};
use chrono::{DateTime, Utc};

pub trait ReminderRepository {
    /// Inserts the record, replacing any existing record for the same task.
    fn upsert(&self, record: &ReminderRecord) -> Result<(), TaskError>;
    fn get(&self, task_id: TaskId) -> Result<Option<ReminderRecord>, TaskError>;
    /// Moves a record from `expected_count` to `reminder_count`. Returns false
    /// when the record is gone or was changed concurrently.
    fn advance(
        &self,
        task_id: TaskId,
        expected_count: u32,
        reminder_count: u32,
        last_reminder_at: Option<DateTime<Utc>>,
        next_reminder_at: DateTime<Utc>,
    ) -> Result<bool, TaskError>;
    /// Returns whether a record was deleted.
    fn delete(&self, task_id: TaskId) -> Result<bool, TaskError>;
    /// Records due at or before `now` whose task is still active.
    fn due(&self, now: DateTime<Utc>) -> Result<Vec<OutstandingReminder>, TaskError>;
    /// Every record whose task is still active.
    fn outstanding(&self) -> Result<Vec<OutstandingReminder>, TaskError>;
}
