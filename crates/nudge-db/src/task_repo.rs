use crate::util::{decode_enum, encode_enum, from_rfc3339, from_rfc3339_opt, to_rfc3339};
use chrono::{DateTime, Utc};
use nudge_core::error::TaskError;
use nudge_core::tasks::TaskRepository;
use nudge_core::types::{
    ConversationId, NewTask, Task, TaskFilter, TaskId, TaskStatus, TimeOfDay, UserHandle,
};
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};

pub(crate) const TASK_COLUMNS: &str = "t.id, t.description, t.assignee, t.conversation, t.created_by, t.time_of_day, t.frequency, t.status, t.created_at, t.last_run_at, t.next_run_at";

/// Unscheduled tasks sort after every scheduled one.
const ORDER_BY_NEXT_RUN: &str = "ORDER BY t.next_run_at IS NULL, t.next_run_at, t.id";

pub struct TaskRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> TaskRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: Vec<String>) -> Result<Vec<Task>, TaskError> {
        let mut stmt = self.conn.prepare(sql).map_err(TaskError::storage)?;
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(TaskError::storage)?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().map_err(TaskError::storage)? {
            tasks.push(map_task_row(row, 0)?);
        }
        Ok(tasks)
    }
}

impl TaskRepository for TaskRepo<'_> {
    fn create(&self, input: NewTask) -> Result<Task, TaskError> {
        let status = TaskStatus::Active;
        let sql = "INSERT INTO tasks (description, assignee, conversation, created_by, time_of_day, frequency, status, created_at, last_run_at, next_run_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)";
        let params = (
            input.description.as_str(),
            input.assignee.as_str(),
            input.conversation.as_str(),
            input.created_by.as_str(),
            input.time_of_day.to_string(),
            encode_enum(&input.frequency)?,
            encode_enum(&status)?,
            to_rfc3339(&input.created_at),
            to_rfc3339(&input.next_run_at),
        );
        self.conn.execute(sql, params).map_err(TaskError::storage)?;
        let id = TaskId::new(self.conn.last_insert_rowid());
        self.get(id)?.ok_or(TaskError::NotFound)
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, TaskError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1");
        self.conn
            .query_row(&sql, [id.get()], |row| Ok(map_task_row(row, 0)))
            .optional()
            .map_err(TaskError::storage)?
            .transpose()
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        if let Some(conversation) = &filter.conversation {
            params.push(conversation.as_str().to_string());
            clauses.push(format!("t.conversation = ?{}", params.len()));
        }
        if let Some(statuses) = &filter.status {
            if statuses.is_empty() {
                return Ok(Vec::new());
            }
            let mut placeholders = Vec::new();
            for status in statuses {
                params.push(encode_enum(status)?);
                placeholders.push(format!("?{}", params.len()));
            }
            clauses.push(format!("t.status IN ({})", placeholders.join(", ")));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t {where_clause} {ORDER_BY_NEXT_RUN}");
        self.query(&sql, params)
    }

    fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, TaskError> {
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                (encode_enum(&status)?, id.get()),
            )
            .map_err(TaskError::storage)?;
        if changed == 0 {
            return Err(TaskError::NotFound);
        }
        self.get(id)?.ok_or(TaskError::NotFound)
    }

    fn set_schedule(
        &self,
        id: TaskId,
        next_run_at: Option<DateTime<Utc>>,
        last_run_at: Option<DateTime<Utc>>,
    ) -> Result<Task, TaskError> {
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET next_run_at = ?1, last_run_at = ?2 WHERE id = ?3",
                (
                    next_run_at.as_ref().map(to_rfc3339),
                    last_run_at.as_ref().map(to_rfc3339),
                    id.get(),
                ),
            )
            .map_err(TaskError::storage)?;
        if changed == 0 {
            return Err(TaskError::NotFound);
        }
        self.get(id)?.ok_or(TaskError::NotFound)
    }

    fn due(&self, now: DateTime<Utc>) -> Result<Vec<Task>, TaskError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.status = ?1 AND t.next_run_at IS NOT NULL AND t.next_run_at <= ?2 {ORDER_BY_NEXT_RUN}"
        );
        self.query(&sql, vec![encode_enum(&TaskStatus::Active)?, to_rfc3339(&now)])
    }
}

/// Maps the `TASK_COLUMNS` block starting at column `offset`.
pub(crate) fn map_task_row(row: &Row<'_>, offset: usize) -> Result<Task, TaskError> {
    let col = |i: usize| offset + i;
    let id: i64 = row.get(col(0)).map_err(TaskError::storage)?;
    let description: String = row.get(col(1)).map_err(TaskError::storage)?;
    let assignee: String = row.get(col(2)).map_err(TaskError::storage)?;
    let conversation: String = row.get(col(3)).map_err(TaskError::storage)?;
    let created_by: String = row.get(col(4)).map_err(TaskError::storage)?;
    let time_of_day: String = row.get(col(5)).map_err(TaskError::storage)?;
    let frequency: String = row.get(col(6)).map_err(TaskError::storage)?;
    let status: String = row.get(col(7)).map_err(TaskError::storage)?;
    let created_at: String = row.get(col(8)).map_err(TaskError::storage)?;
    let last_run_at: Option<String> = row.get(col(9)).map_err(TaskError::storage)?;
    let next_run_at: Option<String> = row.get(col(10)).map_err(TaskError::storage)?;

    Ok(Task {
        id: TaskId::new(id),
        description,
        assignee: UserHandle::new(assignee).map_err(TaskError::storage)?,
        conversation: ConversationId::new(conversation).map_err(TaskError::storage)?,
        created_by: UserHandle::new(created_by).map_err(TaskError::storage)?,
        time_of_day: time_of_day
            .parse::<TimeOfDay>()
            .map_err(TaskError::storage)?,
        frequency: decode_enum(&frequency)?,
        status: decode_enum(&status)?,
        created_at: from_rfc3339(&created_at)?,
        last_run_at: from_rfc3339_opt(last_run_at)?,
        next_run_at: from_rfc3339_opt(next_run_at)?,
    })
}
