pub mod clock;
pub mod error;
pub mod gateway;
pub mod messages;
pub mod nudge;
pub mod pending;
pub mod policy;
pub mod processor;
pub mod reminders;
pub mod responses;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod validation;

pub mod types;

pub use crate::error::NudgeError;
pub use crate::nudge::{Nudge, RequestContext};
pub use crate::store::Store;
