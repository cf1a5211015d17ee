use crate::error::NudgeError;
use crate::types::ReminderTier;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

pub const DEFAULT_REMINDER_INTERVAL_SECS: i64 = 120;
pub const DEFAULT_MAX_REMINDERS: u32 = 30;
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

/// Escalation table: each row applies from its reminder count up to the next
/// row's. Rows are sorted by lower bound.
pub const TIER_TABLE: [(u32, ReminderTier); 4] = [
    (0, ReminderTier::Reminder),
    (1, ReminderTier::FollowUp),
    (5, ReminderTier::Persistent),
    (15, ReminderTier::Urgent),
];

pub fn tier_for(reminder_count: u32) -> ReminderTier {
    TIER_TABLE
        .iter()
        .rev()
        .find(|(from, _)| reminder_count >= *from)
        .map_or(ReminderTier::Reminder, |(_, tier)| *tier)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// Gap between consecutive notifications for one task.
    pub interval: TimeDelta,
    /// Follow-ups sent before the final notice.
    pub max_reminders: u32,
    /// Upper bound on a single gateway call.
    pub gateway_timeout: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            interval: TimeDelta::seconds(DEFAULT_REMINDER_INTERVAL_SECS),
            max_reminders: DEFAULT_MAX_REMINDERS,
            gateway_timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
        }
    }
}

impl ReminderPolicy {
    /// Fails instead of panicking when the interval runs past the
    /// representable range, so a bad interval costs one item, not the loop.
    pub fn next_reminder_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, NudgeError> {
        now.checked_add_signed(self.interval)
            .ok_or_else(|| NudgeError::Internal {
                message: format!("reminder interval {} overflows the calendar", self.interval),
            })
    }
}
