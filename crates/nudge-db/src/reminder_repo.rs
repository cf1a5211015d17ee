use crate::task_repo::{TASK_COLUMNS, map_task_row};
use crate::util::{encode_enum, from_rfc3339, from_rfc3339_opt, to_rfc3339};
use chrono::{DateTime, Utc};
use nudge_core::error::TaskError;
use nudge_core::reminders::ReminderRepository;
use nudge_core::types::{OutstandingReminder, ReminderRecord, TaskId, TaskStatus};
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};

const REMINDER_COLUMNS: &str =
    "r.task_id, r.reminder_count, r.last_reminder_at, r.next_reminder_at, r.max_reminders, r.created_at";
const REMINDER_COLUMN_COUNT: usize = 6;

pub struct ReminderRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ReminderRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn outstanding_where(
        &self,
        extra: &str,
        params: Vec<String>,
    ) -> Result<Vec<OutstandingReminder>, TaskError> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS}, {TASK_COLUMNS} FROM reminders r JOIN tasks t ON t.id = r.task_id WHERE t.status = ?1 {extra} ORDER BY r.next_reminder_at, r.task_id"
        );
        let mut all_params = vec![encode_enum(&TaskStatus::Active)?];
        all_params.extend(params);
        let mut stmt = self.conn.prepare(&sql).map_err(TaskError::storage)?;
        let mut rows = stmt
            .query(params_from_iter(all_params))
            .map_err(TaskError::storage)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().map_err(TaskError::storage)? {
            items.push(OutstandingReminder {
                record: map_reminder_row(row)?,
                task: map_task_row(row, REMINDER_COLUMN_COUNT)?,
            });
        }
        Ok(items)
    }
}

impl ReminderRepository for ReminderRepo<'_> {
    fn upsert(&self, record: &ReminderRecord) -> Result<(), TaskError> {
        let sql = "INSERT INTO reminders (task_id, reminder_count, last_reminder_at, next_reminder_at, max_reminders, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
            ON CONFLICT (task_id) DO UPDATE SET reminder_count = excluded.reminder_count, last_reminder_at = excluded.last_reminder_at, next_reminder_at = excluded.next_reminder_at, max_reminders = excluded.max_reminders, created_at = excluded.created_at";
        self.conn
            .execute(
                sql,
                (
                    record.task_id.get(),
                    record.reminder_count,
                    record.last_reminder_at.as_ref().map(to_rfc3339),
                    to_rfc3339(&record.next_reminder_at),
                    record.max_reminders,
                    to_rfc3339(&record.created_at),
                ),
            )
            .map_err(TaskError::storage)?;
        Ok(())
    }

    fn get(&self, task_id: TaskId) -> Result<Option<ReminderRecord>, TaskError> {
        let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders r WHERE r.task_id = ?1");
        self.conn
            .query_row(&sql, [task_id.get()], |row| Ok(map_reminder_row(row)))
            .optional()
            .map_err(TaskError::storage)?
            .transpose()
    }

    fn advance(
        &self,
        task_id: TaskId,
        expected_count: u32,
        reminder_count: u32,
        last_reminder_at: Option<DateTime<Utc>>,
        next_reminder_at: DateTime<Utc>,
    ) -> Result<bool, TaskError> {
        let changed = self
            .conn
            .execute(
                "UPDATE reminders SET reminder_count = ?1, last_reminder_at = ?2, next_reminder_at = ?3 WHERE task_id = ?4 AND reminder_count = ?5",
                (
                    reminder_count,
                    last_reminder_at.as_ref().map(to_rfc3339),
                    to_rfc3339(&next_reminder_at),
                    task_id.get(),
                    expected_count,
                ),
            )
            .map_err(TaskError::storage)?;
        Ok(changed == 1)
    }

    fn delete(&self, task_id: TaskId) -> Result<bool, TaskError> {
        let changed = self
            .conn
            .execute("DELETE FROM reminders WHERE task_id = ?1", [task_id.get()])
            .map_err(TaskError::storage)?;
        Ok(changed > 0)
    }

    fn due(&self, now: DateTime<Utc>) -> Result<Vec<OutstandingReminder>, TaskError> {
        self.outstanding_where("AND r.next_reminder_at <= ?2", vec![to_rfc3339(&now)])
    }

    fn outstanding(&self) -> Result<Vec<OutstandingReminder>, TaskError> {
        self.outstanding_where("", Vec::new())
    }
}

fn map_reminder_row(row: &Row<'_>) -> Result<ReminderRecord, TaskError> {
    let task_id: i64 = row.get(0).map_err(TaskError::storage)?;
    let reminder_count: u32 = row.get(1).map_err(TaskError::storage)?;
    let last_reminder_at: Option<String> = row.get(2).map_err(TaskError::storage)?;
    let next_reminder_at: String = row.get(3).map_err(TaskError::storage)?;
    let max_reminders: u32 = row.get(4).map_err(TaskError::storage)?;
    let created_at: String = row.get(5).map_err(TaskError::storage)?;

    Ok(ReminderRecord {
        task_id: TaskId::new(task_id),
        reminder_count,
        last_reminder_at: from_rfc3339_opt(last_reminder_at)?,
        next_reminder_at: from_rfc3339(&next_reminder_at)?,
        max_reminders,
        created_at: from_rfc3339(&created_at)?,
    })
}
