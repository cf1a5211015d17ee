use crate::error::TaskError;
use crate::types::{NewTask, Task, TaskFilter, TaskId, TaskStatus};
use chrono::{DateTime, Utc};

pub trait TaskRepository {
    fn create(&self, input: NewTask) -> Result<Task, TaskError>;
    fn get(&self, id: TaskId) -> Result<Option<Task>, TaskError>;
    /// Matching tasks ordered by next run, unscheduled tasks last.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError>;
    fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, TaskError>;
    /// Writes both schedule columns exactly as given.
    fn set_schedule(
        &self,
        id: TaskId,
        next_run_at: Option<DateTime<Utc>>,
        last_run_at: Option<DateTime<Utc>>,
    ) -> Result<Task, TaskError>;
    /// Active tasks whose next run is at or before `now`.
    fn due(&self, now: DateTime<Utc>) -> Result<Vec<Task>, TaskError>;
}
