use nudge_core::error::{NudgeError, TaskError};
use nudge_core::store::Store;
use rusqlite::Connection;

use crate::reminder_repo::ReminderRepo;
use crate::response_repo::ResponseRepo;
use crate::task_repo::TaskRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Tasks<'a>
        = TaskRepo<'a>
    where
        Self: 'a;
    type Reminders<'a>
        = ReminderRepo<'a>
    where
        Self: 'a;
    type Responses<'a>
        = ResponseRepo<'a>
    where
        Self: 'a;

    fn tasks(&self) -> Self::Tasks<'_> {
        TaskRepo::new(&self.conn)
    }

    fn reminders(&self) -> Self::Reminders<'_> {
        ReminderRepo::new(&self.conn)
    }

    fn responses(&self) -> Self::Responses<'_> {
        ResponseRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, NudgeError>
    where
        F: FnOnce(&Self) -> Result<T, NudgeError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|err| NudgeError::Task(TaskError::storage(err)))?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|err| NudgeError::Task(TaskError::storage(err)))?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(|rollback_err| NudgeError::Task(TaskError::storage(rollback_err)))?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use crate::task_repo::tests::new_task;
    use chrono::Utc;
    use nudge_core::tasks::TaskRepository;
    use nudge_core::types::{TaskFilter, TaskStatus};

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let store = DbStore::new(with_test_db().unwrap());
        let task = store.tasks().create(new_task("c1", Utc::now())).unwrap();

        let result: Result<(), NudgeError> = store.with_tx(|store| {
            store.tasks().set_status(task.id, TaskStatus::Removed)?;
            Err(NudgeError::Internal {
                message: "boom".to_string(),
            })
        });
        assert!(result.is_err());
        let reloaded = store.tasks().get(task.id).unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Active);
    }

    #[test]
    fn committed_transaction_is_visible() {
        let store = DbStore::new(with_test_db().unwrap());
        store
            .with_tx(|store| {
                store.tasks().create(new_task("c1", Utc::now()))?;
                store.tasks().create(new_task("c1", Utc::now()))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.tasks().list(&TaskFilter::default()).unwrap().len(), 2);
    }
}
