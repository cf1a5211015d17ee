//! The periodic due-scan.
//!
//! A tick first fires tasks whose next run has come (PENDING to NOTIFIED),
//! then sends follow-ups for reminder records whose next reminder has come.
//! Gateway calls happen outside any store lock or transaction; state only
//! advances after a send succeeded, so a failed send is simply retried by
//! the next tick with the same state.

use crate::error::NudgeError;
use crate::messages;
use crate::nudge::{Nudge, RequestContext};
use crate::pending::{PendingEntry, PendingKey};
use crate::policy::tier_for;
use crate::reminders::ReminderRepository;
use crate::store::Store;
use crate::tasks::TaskRepository;
use crate::types::{EventBody, Frequency, OutstandingReminder, ReminderRecord, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use nudge_events::EventSource;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    /// Another tick was still running; nothing was done.
    pub skipped: bool,
    pub notified: usize,
    pub follow_ups: usize,
    pub final_notices: usize,
    /// Due items dropped because a response or removal got there first.
    pub stale: usize,
    pub failures: usize,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            skipped: false,
            notified: 0,
            follow_ups: 0,
            final_notices: 0,
            stale: 0,
            failures: 0,
        }
    }

    pub fn sent(&self) -> usize {
        self.notified + self.follow_ups + self.final_notices
    }
}

enum Step {
    Notified,
    FollowUp,
    FinalNotice,
    Stale,
}

struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReminderScheduler<'a, S: Store> {
    core: &'a Nudge<S>,
}

impl<'a, S: Store> ReminderScheduler<'a, S> {
    pub(crate) fn new(core: &'a Nudge<S>) -> Self {
        Self { core }
    }

    /// Runs one tick. Returns a skipped report without touching anything if a
    /// tick is already in flight. Single-item failures are logged and counted;
    /// they never abort the rest of the tick.
    pub async fn tick(&self, ctx: &RequestContext) -> TickReport {
        let now = self.core.now();
        let mut report = TickReport::new(now);
        let Some(_guard) = TickGuard::acquire(&self.core.ticking) else {
            debug!("previous tick still running, skipping");
            report.skipped = true;
            return report;
        };

        match self.core.read(|store| Ok(store.tasks().due(now)?)) {
            Ok(due) => {
                for task in due {
                    let outcome = self.fire_task(ctx, task.id, now).await;
                    record_step(&mut report, task.id, outcome);
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to load due tasks");
                report.failures += 1;
            }
        }

        match self.core.read(|store| Ok(store.reminders().due(now)?)) {
            Ok(due) => {
                for item in due {
                    let task_id = item.record.task_id;
                    let outcome = self.follow_up(ctx, item, now).await;
                    record_step(&mut report, task_id, outcome);
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to load due reminders");
                report.failures += 1;
            }
        }

        if report.sent() > 0 || report.failures > 0 {
            info!(
                notified = report.notified,
                follow_ups = report.follow_ups,
                final_notices = report.final_notices,
                failures = report.failures,
                "tick finished"
            );
        }
        report
    }

    async fn fire_task(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Step, NudgeError> {
        let Some(task) = self.core.read(|store| Ok(store.tasks().get(task_id)?))? else {
            return Ok(Step::Stale);
        };
        if !task.is_due(now) {
            return Ok(Step::Stale);
        }

        let policy = self.core.policy();
        let next_reminder_at = policy.next_reminder_after(now)?;
        self.core.send(&messages::initial(&task)).await?;

        let record = ReminderRecord {
            task_id,
            reminder_count: 0,
            last_reminder_at: None,
            next_reminder_at,
            max_reminders: policy.max_reminders,
            created_at: now,
        };
        let next_run_at = match task.frequency {
            Frequency::Daily => Some(self.core.resolver().compute_next_run(
                task.time_of_day,
                task.frequency,
                now,
            )),
            Frequency::Once => None,
        };
        let fired = self.core.with_events(ctx, |store| {
            let current = store.tasks().get(task_id)?;
            if current.is_none_or(|t| t.status != TaskStatus::Active) {
                return Ok((None, Vec::new()));
            }
            store.reminders().upsert(&record)?;
            let task = store.tasks().set_schedule(task_id, next_run_at, Some(now))?;
            Ok((
                Some(task),
                vec![EventBody::TaskNotified {
                    task_id,
                    next_run_at,
                }],
            ))
        })?;

        let Some(task) = fired else {
            return Ok(Step::Stale);
        };
        self.core.index().put(
            PendingKey::for_task(&task),
            PendingEntry {
                task_id,
                task,
                since: now,
            },
        );
        Ok(Step::Notified)
    }

    async fn follow_up(
        &self,
        ctx: &RequestContext,
        item: OutstandingReminder,
        now: DateTime<Utc>,
    ) -> Result<Step, NudgeError> {
        let task_id = item.record.task_id;
        let key = PendingKey::for_task(&item.task);
        // An absent entry means a response was applied since the scan.
        if !self.core.index().contains(&key, task_id) {
            return Ok(Step::Stale);
        }
        let (task, record) = self.core.read(|store| {
            Ok((store.tasks().get(task_id)?, store.reminders().get(task_id)?))
        })?;
        let (Some(task), Some(record)) = (task, record) else {
            return Ok(Step::Stale);
        };
        if task.status != TaskStatus::Active || record.next_reminder_at > now {
            return Ok(Step::Stale);
        }
        let count = record.reminder_count;

        if record.is_exhausted() {
            self.core
                .send(&messages::final_notice(&task, count))
                .await?;
            let deleted = self.core.with_events(ctx, |store| {
                let deleted = store.reminders().delete(task_id)?;
                let events = if deleted {
                    vec![EventBody::FinalNoticeSent {
                        task_id,
                        reminder_count: count,
                    }]
                } else {
                    Vec::new()
                };
                Ok((deleted, events))
            })?;
            self.core.index().remove(&key, task_id);
            if !deleted {
                return Ok(Step::Stale);
            }
            info!(task_id = %task_id, reminder_count = count, "final notice sent, reminders stopped");
            return Ok(Step::FinalNotice);
        }

        let next_reminder_at = self.core.policy().next_reminder_after(now)?;
        self.core.send(&messages::follow_up(&task, count)).await?;
        let advanced = self.core.with_events(ctx, |store| {
            let advanced = store.reminders().advance(
                task_id,
                count,
                count + 1,
                Some(now),
                next_reminder_at,
            )?;
            let events = if advanced {
                vec![EventBody::FollowUpSent {
                    task_id,
                    reminder_count: count,
                    tier: tier_for(count),
                }]
            } else {
                Vec::new()
            };
            Ok((advanced, events))
        })?;
        Ok(if advanced { Step::FollowUp } else { Step::Stale })
    }
}

fn record_step(report: &mut TickReport, task_id: TaskId, outcome: Result<Step, NudgeError>) {
    match outcome {
        Ok(Step::Notified) => report.notified += 1,
        Ok(Step::FollowUp) => report.follow_ups += 1,
        Ok(Step::FinalNotice) => report.final_notices += 1,
        Ok(Step::Stale) => report.stale += 1,
        Err(err) => {
            warn!(
                task_id = %task_id,
                retryable = err.is_retryable(),
                error = %err,
                "tick item failed; state left unchanged"
            );
            report.failures += 1;
        }
    }
}

/// Ticks every `period` until `shutdown` resolves. Missed periods are
/// dropped rather than replayed in a burst.
pub async fn run<S, F>(core: Arc<Nudge<S>>, period: Duration, shutdown: F)
where
    S: Store + Send,
    F: Future<Output = ()>,
{
    let ctx = RequestContext::new(EventSource::Scheduler, None);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);
    info!(period_secs = period.as_secs(), "scheduler started");
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("scheduler stopped");
                break;
            }
            _ = interval.tick() => {
                core.scheduler().tick(&ctx).await;
            }
        }
    }
}
