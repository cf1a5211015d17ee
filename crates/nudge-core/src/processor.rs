use crate::error::{NudgeError, TaskError};
use crate::nudge::{Nudge, RequestContext};
use crate::pending::{PendingEntry, PendingKey};
use crate::reminders::ReminderRepository;
use crate::responses::ResponseLogRepository;
use crate::store::Store;
use crate::tasks::TaskRepository;
use crate::types::{
    ConversationId, EventBody, Frequency, NewResponseLogEntry, ReminderRecord, RespondInput, Task,
    TaskId, TaskResponse, TaskStatus, UserHandle,
};
use crate::validation::validate_task_status_transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "PascalCase")]
pub enum ResponseOutcome {
    /// One-off task done for good.
    Completed { task: Task },
    /// Daily task done for today; `task.next_run_at` is the next cycle.
    CycleCompleted { task: Task },
    /// Not done yet; the follow-up clock restarts from now.
    Postponed { reminder: ReminderRecord },
    /// Terminal task, or nothing outstanding to answer. No side effects.
    AlreadyResolved { task_id: TaskId },
    /// The responder is not the one this task is waiting on.
    NotAwaiting { task_id: TaskId },
}

pub struct ResponseProcessor<'a, S: Store> {
    core: &'a Nudge<S>,
}

impl<'a, S: Store> ResponseProcessor<'a, S> {
    pub(crate) fn new(core: &'a Nudge<S>) -> Self {
        Self { core }
    }

    /// Applies a done/not-done answer. Safe to call repeatedly with the same
    /// answer: replays after resolution report `AlreadyResolved`.
    pub fn apply(
        &self,
        ctx: &RequestContext,
        input: RespondInput,
    ) -> Result<ResponseOutcome, NudgeError> {
        let task_id = input.task_id;
        let (task, record) = self.core.read(|store| {
            let task = store.tasks().get(task_id)?.ok_or(TaskError::NotFound)?;
            Ok((task, store.reminders().get(task_id)?))
        })?;

        if task.status.is_terminal() {
            debug!(task_id = %task_id, "response for resolved task ignored");
            return Ok(ResponseOutcome::AlreadyResolved { task_id });
        }
        if task.assignee != input.responder || task.conversation != input.conversation {
            debug!(task_id = %task_id, responder = %input.responder, "response from someone not awaited");
            return Ok(ResponseOutcome::NotAwaiting { task_id });
        }

        let key = PendingKey::for_task(&task);
        let indexed = self.core.index().contains(&key, task_id);
        if !indexed && record.is_none() {
            return Ok(ResponseOutcome::AlreadyResolved { task_id });
        }

        let now = self.core.now();
        let outcome = match input.response {
            TaskResponse::Done => self.apply_done(ctx, &input, now)?,
            TaskResponse::NotDone => self.apply_not_done(ctx, &input, now)?,
        };

        match &outcome {
            ResponseOutcome::Completed { .. } | ResponseOutcome::CycleCompleted { .. } => {
                self.core.index().remove(&key, task_id);
            }
            ResponseOutcome::Postponed { .. } if !indexed => {
                self.core.index().put(
                    key,
                    PendingEntry {
                        task_id,
                        task,
                        since: now,
                    },
                );
            }
            _ => {}
        }
        info!(task_id = %task_id, response = ?input.response, outcome = outcome_name(&outcome), "response applied");
        Ok(outcome)
    }

    /// Routes a typed answer ("yes", "no", ...) to the task most recently
    /// notified for this person in this conversation.
    pub fn apply_text(
        &self,
        ctx: &RequestContext,
        responder: UserHandle,
        conversation: ConversationId,
        text: &str,
    ) -> Result<ResponseOutcome, NudgeError> {
        let response: TaskResponse = text.parse().map_err(TaskError::invalid)?;
        let key = PendingKey::new(responder, conversation);
        let entry = self
            .core
            .index()
            .get(&key)
            .ok_or(NudgeError::Task(TaskError::NotFound))?;
        self.apply(
            ctx,
            RespondInput {
                task_id: entry.task_id,
                responder: key.assignee,
                conversation: key.conversation,
                response,
            },
        )
    }

    fn apply_done(
        &self,
        ctx: &RequestContext,
        input: &RespondInput,
        now: DateTime<Utc>,
    ) -> Result<ResponseOutcome, NudgeError> {
        let task_id = input.task_id;
        let resolver = self.core.resolver();
        self.core.with_events(ctx, |store| {
            let task = store.tasks().get(task_id)?.ok_or(TaskError::NotFound)?;
            if task.status.is_terminal() {
                return Ok((ResponseOutcome::AlreadyResolved { task_id }, Vec::new()));
            }
            let entry = store.responses().append(log_entry(input, now))?;
            // Unconditional: a tick holding a stale copy of the record loses.
            store.reminders().delete(task_id)?;

            match task.frequency {
                Frequency::Once => {
                    validate_task_status_transition(task.status, TaskStatus::Completed)?;
                    store.tasks().set_status(task_id, TaskStatus::Completed)?;
                    let task = store.tasks().set_schedule(task_id, None, task.last_run_at)?;
                    Ok((
                        ResponseOutcome::Completed { task: task.clone() },
                        vec![
                            EventBody::ResponseRecorded { entry },
                            EventBody::TaskCompleted { task },
                        ],
                    ))
                }
                Frequency::Daily => {
                    // Normally already re-armed when the cycle fired.
                    let task = match task.next_run_at {
                        Some(next) if next > now => task,
                        _ => {
                            let next =
                                resolver.compute_next_run(task.time_of_day, task.frequency, now);
                            store
                                .tasks()
                                .set_schedule(task_id, Some(next), task.last_run_at)?
                        }
                    };
                    Ok((
                        ResponseOutcome::CycleCompleted { task: task.clone() },
                        vec![
                            EventBody::ResponseRecorded { entry },
                            EventBody::CycleCompleted { task },
                        ],
                    ))
                }
            }
        })
    }

    fn apply_not_done(
        &self,
        ctx: &RequestContext,
        input: &RespondInput,
        now: DateTime<Utc>,
    ) -> Result<ResponseOutcome, NudgeError> {
        let task_id = input.task_id;
        let policy = *self.core.policy();
        self.core.with_events(ctx, |store| {
            let task = store.tasks().get(task_id)?.ok_or(TaskError::NotFound)?;
            if task.status.is_terminal() {
                return Ok((ResponseOutcome::AlreadyResolved { task_id }, Vec::new()));
            }
            let entry = store.responses().append(log_entry(input, now))?;
            let next_reminder_at = policy.next_reminder_after(now)?;
            let reminder = match store.reminders().get(task_id)? {
                Some(existing) => ReminderRecord {
                    reminder_count: existing.reminder_count.saturating_add(1),
                    next_reminder_at,
                    ..existing
                },
                None => ReminderRecord {
                    task_id,
                    reminder_count: 1,
                    last_reminder_at: None,
                    next_reminder_at,
                    max_reminders: policy.max_reminders,
                    created_at: now,
                },
            };
            store.reminders().upsert(&reminder)?;
            Ok((
                ResponseOutcome::Postponed {
                    reminder: reminder.clone(),
                },
                vec![
                    EventBody::ResponseRecorded { entry },
                    EventBody::ReminderPostponed {
                        task_id,
                        reminder_count: reminder.reminder_count,
                        next_reminder_at,
                    },
                ],
            ))
        })
    }
}

fn log_entry(input: &RespondInput, now: DateTime<Utc>) -> NewResponseLogEntry {
    NewResponseLogEntry {
        task_id: input.task_id,
        responder: input.responder.clone(),
        conversation: input.conversation.clone(),
        response: input.response,
        responded_at: now,
    }
}

fn outcome_name(outcome: &ResponseOutcome) -> &'static str {
    match outcome {
        ResponseOutcome::Completed { .. } => "completed",
        ResponseOutcome::CycleCompleted { .. } => "cycle_completed",
        ResponseOutcome::Postponed { .. } => "postponed",
        ResponseOutcome::AlreadyResolved { .. } => "already_resolved",
        ResponseOutcome::NotAwaiting { .. } => "not_awaiting",
    }
}
