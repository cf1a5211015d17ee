use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use nudge_core::clock::ManualClock;
use nudge_core::error::{GatewayError, NudgeError, TaskError};
use nudge_core::gateway::{Notification, NotificationGateway, NotificationKind};
use nudge_core::policy::ReminderPolicy;
use nudge_core::processor::ResponseOutcome;
use nudge_core::schedule::ScheduleResolver;
use nudge_core::types::{
    ConversationId, CreateTaskInput, ReminderTier, RespondInput, Task, TaskResponse, TaskState,
    TaskStatus, UserHandle,
};
use nudge_core::{Nudge, RequestContext};
use nudge_db::DbStore;
use nudge_db::schema;
use nudge_events::{EventBus, EventSource};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct RecordingGateway {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<AtomicBool>,
    delay: Option<Duration>,
    stalled: bool,
}

impl RecordingGateway {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    fn kinds(&self) -> Vec<NotificationKind> {
        self.sent().into_iter().map(|n| n.kind).collect()
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable {
                reason: "transport down".to_string(),
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct Harness {
    nudge: Nudge<DbStore>,
    clock: ManualClock,
    gateway: RecordingGateway,
}

fn at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

fn pacific() -> ScheduleResolver {
    ScheduleResolver::new(FixedOffset::west_opt(7 * 3600).unwrap())
}

fn build(store: DbStore, now: &str, gateway: RecordingGateway) -> Harness {
    build_with_policy(store, now, gateway, ReminderPolicy::default())
}

fn build_with_policy(
    store: DbStore,
    now: &str,
    gateway: RecordingGateway,
    policy: ReminderPolicy,
) -> Harness {
    let clock = ManualClock::new(at(now));
    let nudge = Nudge::new(store, Arc::new(gateway.clone()), EventBus::new(256))
        .with_clock(Arc::new(clock.clone()))
        .with_resolver(pacific())
        .with_policy(policy);
    Harness {
        nudge,
        clock,
        gateway,
    }
}

fn harness(now: &str) -> Harness {
    build(
        DbStore::new(schema::with_test_db().unwrap()),
        now,
        RecordingGateway::default(),
    )
}

fn admin() -> RequestContext {
    RequestContext::new(EventSource::Admin, None)
}

fn input(time: &str, frequency: &str) -> CreateTaskInput {
    CreateTaskInput {
        description: "file the expense report".to_string(),
        assignee: "@amy".to_string(),
        conversation: "team-chat".to_string(),
        created_by: "boss".to_string(),
        time: time.to_string(),
        frequency: frequency.to_string(),
    }
}

fn answer(task: &Task, response: TaskResponse) -> RespondInput {
    RespondInput {
        task_id: task.id,
        responder: task.assignee.clone(),
        conversation: task.conversation.clone(),
        response,
    }
}

impl Harness {
    fn create(&self, time: &str, frequency: &str) -> Task {
        self.nudge
            .tasks()
            .create(&admin(), input(time, frequency))
            .unwrap()
    }

    async fn tick(&self) -> nudge_core::scheduler::TickReport {
        self.nudge.scheduler().tick(&admin()).await
    }

    fn respond(&self, task: &Task, response: TaskResponse) -> ResponseOutcome {
        self.nudge
            .responses()
            .apply(&admin(), answer(task, response))
            .unwrap()
    }

    fn advance_to(&self, value: &str) {
        self.clock.set(at(value));
    }
}

// 08:00 at -07:00 is 15:00Z; 09:00 is 16:00Z.

#[test]
fn scenario_a_creation_before_time_of_day_runs_today() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    assert_eq!(task.next_run_at, Some(at("2026-06-01T16:00:00Z")));
    assert_eq!(task.status, TaskStatus::Active);
}

#[test]
fn scenario_b_creation_after_time_of_day_runs_tomorrow() {
    let h = harness("2026-06-01T17:00:00Z");
    let task = h.create("9:00am", "once");
    assert_eq!(task.next_run_at, Some(at("2026-06-02T16:00:00Z")));
}

#[test]
fn invalid_creation_writes_nothing() {
    let h = harness("2026-06-01T15:00:00Z");
    let err = h
        .nudge
        .tasks()
        .create(&admin(), input("tea time", "once"))
        .unwrap_err();
    assert!(matches!(err, NudgeError::Task(TaskError::InvalidInput { .. })));
    let conversation = ConversationId::new("team-chat").unwrap();
    assert!(h.nudge.tasks().list_active(&conversation).unwrap().is_empty());
}

#[tokio::test]
async fn first_fire_creates_record_and_index_entry() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");

    let early = h.tick().await;
    assert_eq!(early.sent(), 0);

    h.advance_to("2026-06-01T16:00:00Z");
    let report = h.tick().await;
    assert_eq!(report.notified, 1);
    assert_eq!(h.gateway.kinds(), vec![NotificationKind::Initial]);

    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.state, TaskState::Notified);
    let record = view.reminder.unwrap();
    assert_eq!(record.reminder_count, 0);
    assert_eq!(record.next_reminder_at, at("2026-06-01T16:02:00Z"));
    assert_eq!(view.task.next_run_at, None);
    assert_eq!(view.task.last_run_at, Some(at("2026-06-01T16:00:00Z")));
    assert_eq!(h.nudge.index().len(), 1);

    // A ONCE task is never due again.
    h.advance_to("2026-06-01T16:00:30Z");
    assert_eq!(h.tick().await.notified, 0);
}

#[tokio::test]
async fn scenario_c_not_done_restarts_the_follow_up_clock() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;

    h.advance_to("2026-06-01T16:00:30Z");
    let ResponseOutcome::Postponed { reminder } = h.respond(&task, TaskResponse::NotDone) else {
        panic!("expected postponed");
    };
    assert_eq!(reminder.reminder_count, 1);
    assert_eq!(reminder.next_reminder_at, at("2026-06-01T16:02:30Z"));

    h.advance_to("2026-06-01T16:02:00Z");
    assert_eq!(h.tick().await.follow_ups, 0);

    h.advance_to("2026-06-01T16:02:30Z");
    assert_eq!(h.tick().await.follow_ups, 1);
    assert_eq!(
        h.gateway.kinds().last().copied(),
        Some(NotificationKind::FollowUp {
            reminder_count: 1,
            tier: ReminderTier::FollowUp,
        })
    );
    let record = h.nudge.tasks().view(task.id).unwrap().reminder.unwrap();
    assert_eq!(record.reminder_count, 2);
    assert_eq!(record.last_reminder_at, Some(at("2026-06-01T16:02:30Z")));
}

#[tokio::test]
async fn scenario_d_final_notice_is_sent_once_at_the_threshold() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    let mut now = at("2026-06-01T16:00:00Z");
    h.clock.set(now);
    h.tick().await;

    let mut counts = Vec::new();
    for _ in 0..40 {
        now += TimeDelta::seconds(120);
        h.clock.set(now);
        h.tick().await;
        if let Some(record) = h.nudge.tasks().view(task.id).unwrap().reminder {
            counts.push(record.reminder_count);
        }
    }

    let kinds = h.gateway.kinds();
    let follow_ups = kinds
        .iter()
        .filter(|k| matches!(k, NotificationKind::FollowUp { .. }))
        .count();
    let finals: Vec<_> = kinds
        .iter()
        .filter(|k| matches!(k, NotificationKind::FinalNotice { .. }))
        .collect();
    assert_eq!(follow_ups, 30);
    assert_eq!(finals, vec![&NotificationKind::FinalNotice { reminder_count: 30 }]);
    assert_eq!(kinds.len(), 32);
    assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]));

    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.task.status, TaskStatus::Active);
    assert_eq!(view.state, TaskState::Dormant);
    assert!(view.reminder.is_none());
    assert!(h.nudge.index().is_empty());
}

#[tokio::test]
async fn scenario_e_daily_task_cycles_to_tomorrow() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "daily");
    let prior_next_run = task.next_run_at.unwrap();

    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;
    let fired = h.nudge.tasks().get(task.id).unwrap();
    assert_eq!(fired.next_run_at, Some(at("2026-06-02T16:00:00Z")));

    h.advance_to("2026-06-01T16:05:00Z");
    let ResponseOutcome::CycleCompleted { task: cycled } = h.respond(&task, TaskResponse::Done)
    else {
        panic!("expected cycle completion");
    };
    let next = cycled.next_run_at.unwrap();
    assert_eq!(cycled.status, TaskStatus::Active);
    assert_eq!(next, at("2026-06-02T16:00:00Z"));
    assert!(next > at("2026-06-01T16:05:00Z"));
    assert!(next <= prior_next_run + TimeDelta::hours(24));
    assert!(h.nudge.tasks().view(task.id).unwrap().reminder.is_none());

    // No follow-ups for the completed cycle.
    h.advance_to("2026-06-01T16:10:00Z");
    assert_eq!(h.tick().await.sent(), 0);

    h.advance_to("2026-06-02T16:00:00Z");
    assert_eq!(h.tick().await.notified, 1);
    assert_eq!(
        h.gateway.kinds(),
        vec![NotificationKind::Initial, NotificationKind::Initial]
    );
}

#[tokio::test]
async fn daily_done_keeps_the_run_armed_at_fire_time() {
    let h = harness("2026-06-01T17:00:00Z");
    let task = h.create("09:00", "daily");
    h.advance_to("2026-06-02T16:00:00Z");
    h.tick().await;
    h.advance_to("2026-06-02T16:01:00Z");
    let ResponseOutcome::CycleCompleted { task: cycled } = h.respond(&task, TaskResponse::Done)
    else {
        panic!("expected cycle completion");
    };
    assert_eq!(cycled.next_run_at, Some(at("2026-06-03T16:00:00Z")));
}

#[tokio::test]
async fn once_done_is_terminal_and_idempotent() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;

    h.advance_to("2026-06-01T16:01:00Z");
    let first = h.respond(&task, TaskResponse::Done);
    let ResponseOutcome::Completed { task: completed } = &first else {
        panic!("expected completion");
    };
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.next_run_at, None);

    let second = h.respond(&task, TaskResponse::Done);
    assert_eq!(second, ResponseOutcome::AlreadyResolved { task_id: task.id });

    for minutes in [3, 5, 60, 24 * 60] {
        h.clock.set(at("2026-06-01T16:00:00Z") + TimeDelta::minutes(minutes));
        assert_eq!(h.tick().await.sent(), 0);
    }
    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.state, TaskState::Completed);
    assert!(view.reminder.is_none());
    assert_eq!(h.nudge.tasks().responses(task.id).unwrap().len(), 1);
}

#[tokio::test]
async fn gateway_failure_leaves_state_for_the_next_tick() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");

    h.gateway.set_failing(true);
    let report = h.tick().await;
    assert_eq!(report.failures, 1);
    let unchanged = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(unchanged.state, TaskState::Pending);
    assert_eq!(unchanged.task.next_run_at, Some(at("2026-06-01T16:00:00Z")));
    assert!(h.nudge.index().is_empty());

    h.gateway.set_failing(false);
    assert_eq!(h.tick().await.notified, 1);

    h.advance_to("2026-06-01T16:02:00Z");
    h.gateway.set_failing(true);
    assert_eq!(h.tick().await.failures, 1);
    let record = h.nudge.tasks().view(task.id).unwrap().reminder.unwrap();
    assert_eq!(record.reminder_count, 0);
    assert_eq!(record.next_reminder_at, at("2026-06-01T16:02:00Z"));

    h.gateway.set_failing(false);
    assert_eq!(h.tick().await.follow_ups, 1);
}

#[tokio::test]
async fn overlapping_ticks_are_skipped() {
    let gateway = RecordingGateway {
        delay: Some(Duration::from_millis(200)),
        ..RecordingGateway::default()
    };
    let h = build(
        DbStore::new(schema::with_test_db().unwrap()),
        "2026-06-01T15:00:00Z",
        gateway,
    );
    h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");

    let (first, second) = tokio::join!(h.tick(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.tick().await
    });
    assert!(!first.skipped);
    assert_eq!(first.notified, 1);
    assert!(second.skipped);
    assert_eq!(h.gateway.sent().len(), 1);

    assert!(!h.tick().await.skipped);
}

#[tokio::test]
async fn stalled_gateway_times_out_and_leaves_the_task_pending() {
    let gateway = RecordingGateway {
        stalled: true,
        ..RecordingGateway::default()
    };
    let policy = ReminderPolicy {
        gateway_timeout: Duration::from_millis(100),
        ..ReminderPolicy::default()
    };
    let h = build_with_policy(
        DbStore::new(schema::with_test_db().unwrap()),
        "2026-06-01T15:00:00Z",
        gateway,
        policy,
    );
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");

    let report = h.tick().await;
    assert_eq!(report.failures, 1);
    assert_eq!(report.notified, 0);
    assert!(h.gateway.sent().is_empty());

    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.state, TaskState::Pending);
    assert_eq!(view.reminder, None);
    assert_eq!(view.task.next_run_at, Some(at("2026-06-01T16:00:00Z")));
    assert!(h.nudge.index().is_empty());
}

#[tokio::test]
async fn oversized_interval_fails_the_item_without_stopping_ticks() {
    let policy = ReminderPolicy {
        interval: TimeDelta::seconds(10_000_000_000_000),
        ..ReminderPolicy::default()
    };
    let h = build_with_policy(
        DbStore::new(schema::with_test_db().unwrap()),
        "2026-06-01T15:00:00Z",
        RecordingGateway::default(),
        policy,
    );
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");

    for _ in 0..2 {
        let report = h.tick().await;
        assert_eq!(report.failures, 1);
        assert_eq!(report.notified, 0);
    }
    assert!(h.gateway.sent().is_empty());
    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.state, TaskState::Pending);
}

/// Fires a ONCE task through a slow gateway and moves the clock to its
/// first follow-up.
async fn slow_harness_with_due_follow_up() -> (Harness, Task) {
    let gateway = RecordingGateway {
        delay: Some(Duration::from_millis(200)),
        ..RecordingGateway::default()
    };
    let h = build(
        DbStore::new(schema::with_test_db().unwrap()),
        "2026-06-01T15:00:00Z",
        gateway,
    );
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");
    assert_eq!(h.tick().await.notified, 1);
    h.advance_to("2026-06-01T16:02:00Z");
    (h, task)
}

#[tokio::test]
async fn done_during_a_follow_up_send_wins() {
    let (h, task) = slow_harness_with_due_follow_up().await;

    let (report, outcome) = tokio::join!(h.tick(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.respond(&task, TaskResponse::Done)
    });
    assert_eq!(report.follow_ups, 0);
    assert_eq!(report.stale, 1);
    assert_eq!(report.failures, 0);
    assert!(matches!(outcome, ResponseOutcome::Completed { .. }));

    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.state, TaskState::Completed);
    assert_eq!(view.reminder, None);
    assert!(h.nudge.index().is_empty());

    h.advance_to("2026-06-01T16:10:00Z");
    assert_eq!(h.tick().await.sent(), 0);
    assert_eq!(h.nudge.tasks().view(task.id).unwrap().reminder, None);
}

#[tokio::test]
async fn not_done_during_a_follow_up_send_keeps_its_count() {
    let (h, task) = slow_harness_with_due_follow_up().await;

    let (report, outcome) = tokio::join!(h.tick(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.respond(&task, TaskResponse::NotDone)
    });
    assert_eq!(report.follow_ups, 0);
    assert_eq!(report.stale, 1);
    assert!(matches!(outcome, ResponseOutcome::Postponed { .. }));

    let record = h.nudge.tasks().view(task.id).unwrap().reminder.unwrap();
    assert_eq!(record.reminder_count, 1);
    assert_eq!(record.next_reminder_at, at("2026-06-01T16:04:00Z"));
    assert_eq!(h.nudge.index().len(), 1);
}

#[tokio::test]
async fn removal_is_visible_to_the_next_tick_and_response() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "daily");
    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;

    let removed = h.nudge.tasks().remove(&admin(), task.id).unwrap();
    assert_eq!(removed.status, TaskStatus::Removed);
    assert_eq!(removed.next_run_at, None);
    assert!(h.nudge.index().is_empty());
    let again = h.nudge.tasks().remove(&admin(), task.id).unwrap();
    assert_eq!(again.status, TaskStatus::Removed);

    h.advance_to("2026-06-02T16:00:00Z");
    assert_eq!(h.tick().await.sent(), 0);
    assert_eq!(
        h.respond(&task, TaskResponse::Done),
        ResponseOutcome::AlreadyResolved { task_id: task.id }
    );
    let view = h.nudge.tasks().view(task.id).unwrap();
    assert_eq!(view.state, TaskState::Removed);
    assert!(view.reminder.is_none());
}

#[tokio::test]
async fn responses_from_others_or_without_a_notification_have_no_effect() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");

    // Nothing has been sent yet.
    assert_eq!(
        h.respond(&task, TaskResponse::NotDone),
        ResponseOutcome::AlreadyResolved { task_id: task.id }
    );

    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;
    let stranger = RespondInput {
        responder: UserHandle::new("bob").unwrap(),
        ..answer(&task, TaskResponse::Done)
    };
    let outcome = h.nudge.responses().apply(&admin(), stranger).unwrap();
    assert_eq!(outcome, ResponseOutcome::NotAwaiting { task_id: task.id });
    assert_eq!(h.nudge.tasks().view(task.id).unwrap().state, TaskState::Notified);
    assert!(h.nudge.tasks().responses(task.id).unwrap().is_empty());
}

#[tokio::test]
async fn free_text_answer_resolves_the_awaiting_task() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;

    let outcome = h
        .nudge
        .responses()
        .apply_text(
            &admin(),
            UserHandle::new("amy").unwrap(),
            ConversationId::new("team-chat").unwrap(),
            "Yes",
        )
        .unwrap();
    assert!(matches!(outcome, ResponseOutcome::Completed { .. }));
    assert_eq!(h.nudge.tasks().get(task.id).unwrap().status, TaskStatus::Completed);

    let err = h
        .nudge
        .responses()
        .apply_text(
            &admin(),
            UserHandle::new("amy").unwrap(),
            ConversationId::new("team-chat").unwrap(),
            "yes",
        )
        .unwrap_err();
    assert!(matches!(err, NudgeError::Task(TaskError::NotFound)));
}

#[tokio::test]
async fn index_is_rebuilt_from_records_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let path = path.to_str().unwrap();

    let task = {
        let h = build(
            DbStore::new(schema::open_and_migrate(path).unwrap()),
            "2026-06-01T15:00:00Z",
            RecordingGateway::default(),
        );
        let task = h.create("09:00", "once");
        h.advance_to("2026-06-01T16:00:00Z");
        h.tick().await;
        task
    };

    let h = build(
        DbStore::new(schema::open_and_migrate(path).unwrap()),
        "2026-06-01T16:02:00Z",
        RecordingGateway::default(),
    );
    // Without the index the follow-up is held back.
    assert_eq!(h.tick().await.follow_ups, 0);
    assert_eq!(h.nudge.rebuild_index().unwrap(), 1);
    assert_eq!(h.tick().await.follow_ups, 1);
    assert_eq!(h.gateway.sent()[0].task_id, task.id);
}

#[tokio::test]
async fn lifecycle_changes_are_published() {
    let h = harness("2026-06-01T15:00:00Z");
    let mut events = h.nudge.event_bus().subscribe();
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;
    h.respond(&task, TaskResponse::Done);

    let mut kinds = Vec::new();
    while let Ok(record) = events.try_recv() {
        kinds.push(record.kind().unwrap_or_default().to_string());
    }
    let kinds: Vec<&str> = kinds.iter().map(String::as_str).collect();
    assert_eq!(
        kinds,
        vec![
            "TaskCreated",
            "TaskNotified",
            "ResponseRecorded",
            "TaskCompleted"
        ]
    );
}

#[tokio::test]
async fn debug_snapshot_reports_clocks_and_state() {
    let h = harness("2026-06-01T15:00:00Z");
    let task = h.create("09:00", "once");
    h.advance_to("2026-06-01T16:00:00Z");
    h.tick().await;

    let conversation = ConversationId::new("team-chat").unwrap();
    let snapshot = h.nudge.debug_snapshot(Some(&conversation)).unwrap();
    assert_eq!(snapshot.now_utc, at("2026-06-01T16:00:00Z"));
    assert_eq!(snapshot.now_civil.to_rfc3339(), "2026-06-01T09:00:00-07:00");
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].state, TaskState::Notified);
    assert_eq!(snapshot.reminders[0].task_id, task.id);
    assert_eq!(snapshot.pending[0].task_id, task.id);

    let other = ConversationId::new("elsewhere").unwrap();
    let empty = h.nudge.debug_snapshot(Some(&other)).unwrap();
    assert!(empty.tasks.is_empty() && empty.pending.is_empty());
}
