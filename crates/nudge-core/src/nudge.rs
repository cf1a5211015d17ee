use crate::clock::{Clock, SystemClock};
use crate::error::{GatewayError, NudgeError, TaskError};
use crate::gateway::{Notification, NotificationGateway};
use crate::pending::{PendingEntry, PendingKey, PendingResponseIndex};
use crate::policy::ReminderPolicy;
use crate::processor::ResponseProcessor;
use crate::reminders::ReminderRepository;
use crate::responses::ResponseLogRepository;
use crate::schedule::ScheduleResolver;
use crate::scheduler::ReminderScheduler;
use crate::store::Store;
use crate::tasks::TaskRepository;
use crate::types::{
    ConversationId, CreateTaskInput, EventBody, ReminderRecord, ResponseLogEntry, Task,
    TaskFilter, TaskId, TaskStatus, TaskView,
};
use crate::validation::{validate_create_input, validate_task_status_transition};
use chrono::{DateTime, FixedOffset, Utc};
use nudge_events::{EventBus, EventRecord, EventSource};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new(source: EventSource, correlation_id: Option<String>) -> Self {
        Self {
            source,
            correlation_id,
        }
    }
}

/// The engine: owns the store, the pending index and the collaborators, and
/// hands out the task, scheduler and response views.
///
/// The store sits behind a mutex that is never held across an `.await`, so a
/// tick that is waiting on the gateway never blocks a response.
pub struct Nudge<S: Store> {
    store: Mutex<S>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    resolver: ScheduleResolver,
    policy: ReminderPolicy,
    index: PendingResponseIndex,
    event_bus: EventBus,
    pub(crate) ticking: AtomicBool,
}

impl<S: Store> Nudge<S> {
    /// Builds an engine on the system clock with the default policy and the
    /// default civil offset (`ScheduleResolver::default()`, UTC-07:00, the
    /// same as the shipped configuration). Use [`with_resolver`](Self::with_resolver)
    /// to schedule in another offset.
    pub fn new(store: S, gateway: Arc<dyn NotificationGateway>, event_bus: EventBus) -> Self {
        Self {
            store: Mutex::new(store),
            gateway,
            clock: Arc::new(SystemClock),
            resolver: ScheduleResolver::default(),
            policy: ReminderPolicy::default(),
            index: PendingResponseIndex::new(),
            event_bus,
            ticking: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: ScheduleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReminderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tasks(&self) -> TasksApi<'_, S> {
        TasksApi { core: self }
    }

    pub fn scheduler(&self) -> ReminderScheduler<'_, S> {
        ReminderScheduler::new(self)
    }

    pub fn responses(&self) -> ResponseProcessor<'_, S> {
        ResponseProcessor::new(self)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn resolver(&self) -> &ScheduleResolver {
        &self.resolver
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    pub fn index(&self) -> &PendingResponseIndex {
        &self.index
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Repopulates the pending index from the outstanding reminder records.
    /// Called once at startup; returns the number of entries restored.
    pub fn rebuild_index(&self) -> Result<usize, NudgeError> {
        let outstanding = self.read(|store| Ok(store.reminders().outstanding()?))?;
        self.index.clear();
        for item in &outstanding {
            self.index.put(
                PendingKey::for_task(&item.task),
                PendingEntry {
                    task_id: item.task.id,
                    task: item.task.clone(),
                    since: item
                        .record
                        .last_reminder_at
                        .unwrap_or(item.record.created_at),
                },
            );
        }
        info!(entries = outstanding.len(), "rebuilt pending response index");
        Ok(outstanding.len())
    }

    pub fn debug_snapshot(
        &self,
        conversation: Option<&ConversationId>,
    ) -> Result<DebugSnapshot, NudgeError> {
        let now = self.now();
        let filter = TaskFilter {
            conversation: conversation.cloned(),
            status: None,
        };
        let (tasks, reminders) = self.read(|store| {
            let tasks = store.tasks().list(&filter)?;
            let reminders: Vec<ReminderRecord> = store
                .reminders()
                .outstanding()?
                .into_iter()
                .filter(|item| conversation.is_none_or(|c| &item.task.conversation == c))
                .map(|item| item.record)
                .collect();
            Ok((tasks, reminders))
        })?;
        let tasks = tasks
            .into_iter()
            .map(|task| {
                let reminder = reminders.iter().find(|r| r.task_id == task.id).cloned();
                TaskView {
                    state: task.state(reminder.as_ref()),
                    task,
                    reminder,
                }
            })
            .collect();
        let pending = self
            .index
            .snapshot()
            .into_iter()
            .filter(|entry| conversation.is_none_or(|c| &entry.task.conversation == c))
            .collect();
        Ok(DebugSnapshot {
            now_utc: now,
            now_civil: self.resolver.to_civil(now),
            tasks,
            reminders,
            pending,
        })
    }

    pub(crate) fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs a read-only closure against the store.
    pub(crate) fn read<T, F>(&self, f: F) -> Result<T, NudgeError>
    where
        F: FnOnce(&S) -> Result<T, NudgeError>,
    {
        let store = self.lock_store();
        f(&store)
    }

    pub(crate) fn with_events<T, F>(&self, ctx: &RequestContext, f: F) -> Result<T, NudgeError>
    where
        F: FnOnce(&S) -> Result<(T, Vec<EventBody>), NudgeError>,
    {
        let (value, bodies) = {
            let store = self.lock_store();
            store.with_tx(f)?
        };
        let at = self.now();
        for body in bodies {
            let record = build_event_record(ctx, at, &body)?;
            debug!(event = record.kind().unwrap_or_default(), id = %record.id, "publishing event");
            let _ = self.event_bus.publish(record);
        }
        Ok(value)
    }

    /// One gateway call, bounded by the policy timeout.
    pub(crate) async fn send(&self, notification: &Notification) -> Result<(), GatewayError> {
        let limit = self.policy.gateway_timeout;
        match tokio::time::timeout(limit, self.gateway.send_notification(notification)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                after_ms: limit.as_millis(),
            }),
        }
    }
}

fn build_event_record(
    ctx: &RequestContext,
    at: DateTime<Utc>,
    body: &EventBody,
) -> Result<EventRecord, NudgeError> {
    let body = serde_json::to_value(body).map_err(|err| NudgeError::Internal {
        message: format!("failed to encode event: {err}"),
    })?;
    Ok(EventRecord::new(
        at,
        ctx.source,
        ctx.correlation_id.clone(),
        body,
    ))
}

/// Operator view of the engine: clocks, tasks with derived state, reminder
/// records, and live index entries.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DebugSnapshot {
    pub now_utc: DateTime<Utc>,
    pub now_civil: DateTime<FixedOffset>,
    pub tasks: Vec<TaskView>,
    pub reminders: Vec<ReminderRecord>,
    pub pending: Vec<PendingEntry>,
}

pub struct TasksApi<'a, S: Store> {
    core: &'a Nudge<S>,
}

impl<S: Store> TasksApi<'_, S> {
    pub fn create(&self, ctx: &RequestContext, input: CreateTaskInput) -> Result<Task, NudgeError> {
        let new_task = validate_create_input(&input, &self.core.resolver, self.core.now())?;
        let task = self.core.with_events(ctx, |store| {
            let task = store.tasks().create(new_task)?;
            Ok((task.clone(), vec![EventBody::TaskCreated { task }]))
        })?;
        info!(
            task_id = %task.id,
            assignee = %task.assignee,
            next_run_at = ?task.next_run_at,
            "task created"
        );
        Ok(task)
    }

    pub fn get(&self, id: TaskId) -> Result<Task, NudgeError> {
        self.core
            .read(|store| Ok(store.tasks().get(id)?))?
            .ok_or(NudgeError::Task(TaskError::NotFound))
    }

    pub fn view(&self, id: TaskId) -> Result<TaskView, NudgeError> {
        let (task, reminder) = self.core.read(|store| {
            let task = store.tasks().get(id)?.ok_or(TaskError::NotFound)?;
            Ok((task, store.reminders().get(id)?))
        })?;
        Ok(TaskView {
            state: task.state(reminder.as_ref()),
            task,
            reminder,
        })
    }

    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, NudgeError> {
        self.core.read(|store| Ok(store.tasks().list(filter)?))
    }

    /// Active tasks of a conversation, soonest first.
    pub fn list_active(&self, conversation: &ConversationId) -> Result<Vec<Task>, NudgeError> {
        self.list(&TaskFilter::active_in(conversation.clone()))
    }

    /// Logical delete. Clears the schedule, the reminder record and the index
    /// entry together; removing twice is a no-op.
    pub fn remove(&self, ctx: &RequestContext, id: TaskId) -> Result<Task, NudgeError> {
        let task = self.core.with_events(ctx, |store| {
            let task = store.tasks().get(id)?.ok_or(TaskError::NotFound)?;
            validate_task_status_transition(task.status, TaskStatus::Removed)?;
            if task.status == TaskStatus::Removed {
                return Ok((task, Vec::new()));
            }
            store.tasks().set_status(id, TaskStatus::Removed)?;
            store.reminders().delete(id)?;
            let task = store.tasks().set_schedule(id, None, task.last_run_at)?;
            Ok((task.clone(), vec![EventBody::TaskRemoved { task }]))
        })?;
        self.core.index.remove_task(id);
        info!(task_id = %id, "task removed");
        Ok(task)
    }

    pub fn responses(&self, id: TaskId) -> Result<Vec<ResponseLogEntry>, NudgeError> {
        self.core.read(|store| {
            store.tasks().get(id)?.ok_or(TaskError::NotFound)?;
            Ok(store.responses().list_for_task(id)?)
        })
    }
}
