pub mod reminder_repo;
pub mod response_repo;
pub mod schema;
pub mod store;
pub mod task_repo;
pub mod util;

pub use crate::store::DbStore;
