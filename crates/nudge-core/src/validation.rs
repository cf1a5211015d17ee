use crate::error::TaskError;
use crate::types::{
    ConversationId, CreateTaskInput, Frequency, NewTask, TaskStatus, TimeOfDay, UserHandle,
};
use crate::schedule::ScheduleResolver;
use chrono::{DateTime, Utc};

/// Checks a raw creation request and computes its first run. Nothing is
/// written when this fails.
pub fn validate_create_input(
    input: &CreateTaskInput,
    resolver: &ScheduleResolver,
    now: DateTime<Utc>,
) -> Result<NewTask, TaskError> {
    let description = input.description.trim();
    if description.is_empty() {
        return Err(TaskError::InvalidInput {
            message: "description must not be empty".to_string(),
        });
    }
    let assignee = UserHandle::new(input.assignee.as_str()).map_err(TaskError::invalid)?;
    let conversation =
        ConversationId::new(input.conversation.as_str()).map_err(TaskError::invalid)?;
    let created_by = UserHandle::new(input.created_by.as_str()).map_err(TaskError::invalid)?;
    let time_of_day = TimeOfDay::parse_clock(&input.time).map_err(TaskError::invalid)?;
    let frequency: Frequency = input.frequency.parse().map_err(TaskError::invalid)?;

    Ok(NewTask {
        description: description.to_string(),
        assignee,
        conversation,
        created_by,
        time_of_day,
        frequency,
        created_at: now,
        next_run_at: resolver.compute_next_run(time_of_day, frequency, now),
    })
}

pub fn validate_task_status_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
    use TaskStatus::{Active, Completed, Removed};

    if from == to {
        return Ok(());
    }

    let valid = matches!(
        (from, to),
        (Active, Completed) | (Active, Removed) | (Completed, Removed)
    );

    if valid {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition { from, to })
    }
}
