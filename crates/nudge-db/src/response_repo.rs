use crate::util::{decode_enum, encode_enum, from_rfc3339, to_rfc3339};
use nudge_core::error::TaskError;
use nudge_core::responses::ResponseLogRepository;
use nudge_core::types::{
    ConversationId, NewResponseLogEntry, ResponseLogEntry, TaskId, UserHandle,
};
use rusqlite::{Connection, Row};

pub struct ResponseRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ResponseRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ResponseLogRepository for ResponseRepo<'_> {
    fn append(&self, entry: NewResponseLogEntry) -> Result<ResponseLogEntry, TaskError> {
        self.conn
            .execute(
                "INSERT INTO response_log (task_id, responder, conversation, response, responded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    entry.task_id.get(),
                    entry.responder.as_str(),
                    entry.conversation.as_str(),
                    encode_enum(&entry.response)?,
                    to_rfc3339(&entry.responded_at),
                ),
            )
            .map_err(TaskError::storage)?;
        Ok(ResponseLogEntry {
            id: self.conn.last_insert_rowid(),
            task_id: entry.task_id,
            responder: entry.responder,
            conversation: entry.conversation,
            response: entry.response,
            responded_at: entry.responded_at,
        })
    }

    fn list_for_task(&self, task_id: TaskId) -> Result<Vec<ResponseLogEntry>, TaskError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, task_id, responder, conversation, response, responded_at FROM response_log WHERE task_id = ?1 ORDER BY id")
            .map_err(TaskError::storage)?;
        let mut rows = stmt.query([task_id.get()]).map_err(TaskError::storage)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().map_err(TaskError::storage)? {
            entries.push(map_response_row(row)?);
        }
        Ok(entries)
    }
}

fn map_response_row(row: &Row<'_>) -> Result<ResponseLogEntry, TaskError> {
    let id: i64 = row.get(0).map_err(TaskError::storage)?;
    let task_id: i64 = row.get(1).map_err(TaskError::storage)?;
    let responder: String = row.get(2).map_err(TaskError::storage)?;
    let conversation: String = row.get(3).map_err(TaskError::storage)?;
    let response: String = row.get(4).map_err(TaskError::storage)?;
    let responded_at: String = row.get(5).map_err(TaskError::storage)?;

    Ok(ResponseLogEntry {
        id,
        task_id: TaskId::new(task_id),
        responder: UserHandle::new(responder).map_err(TaskError::storage)?,
        conversation: ConversationId::new(conversation).map_err(TaskError::storage)?,
        response: decode_enum(&response)?,
        responded_at: from_rfc3339(&responded_at)?,
    })
}
