use crate::reminders::ReminderRepository;
use crate::responses::ResponseLogRepository;
use crate::tasks::TaskRepository;
use crate::NudgeError;

pub trait Store {
    type Tasks<'a>: TaskRepository
    where
        Self: 'a;
    type Reminders<'a>: ReminderRepository
    where
        Self: 'a;
    type Responses<'a>: ResponseLogRepository
    where
        Self: 'a;

    fn tasks(&self) -> Self::Tasks<'_>;
    fn reminders(&self) -> Self::Reminders<'_>;
    fn responses(&self) -> Self::Responses<'_>;

    /// Runs `f` in one transaction: everything it writes commits together or
    /// not at all.
    fn with_tx<F, T>(&self, f: F) -> Result<T, NudgeError>
    where
        F: FnOnce(&Self) -> Result<T, NudgeError>;
}
