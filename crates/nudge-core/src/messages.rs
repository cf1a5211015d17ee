use crate::gateway::{ActionOptions, Notification, NotificationKind};
use crate::policy::tier_for;
use crate::types::{ReminderTier, Task};

pub fn initial(task: &Task) -> Notification {
    let text = format!(
        "⏰ Task Reminder\n\n@{}, it's time for your task:\n\n{}\n\nHave you completed it?",
        task.assignee, task.description
    );
    build(task, NotificationKind::Initial, text, Some(ActionOptions::default()))
}

/// Follow-up for a record currently at `reminder_count`; wording escalates
/// with the tier.
pub fn follow_up(task: &Task, reminder_count: u32) -> Notification {
    let tier = tier_for(reminder_count);
    let ordinal = reminder_count.saturating_add(1);
    let (who, what) = (&task.assignee, &task.description);
    let text = match tier {
        ReminderTier::Reminder => format!(
            "🔔 Reminder\n\n@{who}, you haven't responded yet about:\n{what}\n\nPlease choose an option below."
        ),
        ReminderTier::FollowUp => format!(
            "🔔 Follow-up #{ordinal}\n\n@{who}, still waiting for your response about:\n{what}\n\nPlease choose an option."
        ),
        ReminderTier::Persistent => format!(
            "⚠️ Persistent Reminder\n\n@{who}, this is reminder #{ordinal} for:\n{what}\n\nPlease complete it and answer YES, or answer NO if you need more time."
        ),
        ReminderTier::Urgent => format!(
            "🚨 Urgent Reminder #{ordinal}\n\n@{who}, this task needs attention:\n{what}\n\nPlease answer YES or NO."
        ),
    };
    build(
        task,
        NotificationKind::FollowUp {
            reminder_count,
            tier,
        },
        text,
        Some(ActionOptions::default()),
    )
}

pub fn final_notice(task: &Task, reminder_count: u32) -> Notification {
    let text = format!(
        "⏰ Final Notice\n\n@{}, I've reminded you {} times about:\n{}\n\nI'll stop reminding you now. Please complete it when possible.",
        task.assignee, reminder_count, task.description
    );
    build(task, NotificationKind::FinalNotice { reminder_count }, text, None)
}

fn build(
    task: &Task,
    kind: NotificationKind,
    text: String,
    actions: Option<ActionOptions>,
) -> Notification {
    Notification {
        task_id: task.id,
        conversation: task.conversation.clone(),
        assignee: task.assignee.clone(),
        kind,
        text,
        actions,
    }
}
