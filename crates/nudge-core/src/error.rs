use crate::types::enums::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl TaskError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }

    pub fn invalid(err: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("notification timed out after {after_ms}ms")]
    Timeout { after_ms: u128 },
    #[error("gateway unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("notification rejected: {reason}")]
    Rejected { reason: String },
}

#[derive(Debug, Error)]
pub enum NudgeError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl NudgeError {
    /// Storage and delivery failures are worth another attempt on the next
    /// tick; validation and state errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Task(TaskError::Storage { .. }) | Self::Gateway(_) => true,
            Self::Task(_) | Self::Internal { .. } => false,
        }
    }
}
