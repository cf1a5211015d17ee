pub mod enums;
pub mod event;
pub mod ids;
pub mod io;
pub mod reminder;
pub mod response;
pub mod task;
pub mod time;

pub use enums::{Frequency, ReminderTier, TaskResponse, TaskState, TaskStatus};
pub use event::EventBody;
pub use ids::{ConversationId, TaskId, UserHandle};
pub use io::{CreateTaskInput, NewResponseLogEntry, NewTask, RespondInput, TaskFilter};
pub use reminder::{OutstandingReminder, ReminderRecord};
pub use response::ResponseLogEntry;
pub use task::{Task, TaskView};
pub use time::TimeOfDay;
