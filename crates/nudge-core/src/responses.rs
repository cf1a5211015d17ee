use crate::error::TaskError;
use crate::types::{NewResponseLogEntry, ResponseLogEntry, TaskId};

pub trait ResponseLogRepository {
    fn append(&self, entry: NewResponseLogEntry) -> Result<ResponseLogEntry, TaskError>;
    fn list_for_task(&self, task_id: TaskId) -> Result<Vec<ResponseLogEntry>, TaskError>;
}
