//! Next-due computation in a single fixed civil offset.
//!
//! All arithmetic happens in the configured offset and the result is handed
//! back in UTC. No timezone database is consulted, so daylight-saving rules
//! never move a task: a 09:00 task fires at the same UTC instant every day.

use crate::types::{Frequency, TimeOfDay};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleResolver {
    offset: FixedOffset,
}

/// Civil offset used when none is configured (UTC-07:00, no DST).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = -7 * 3600;

impl Default for ScheduleResolver {
    fn default() -> Self {
        FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).map_or_else(Self::utc, Self::new)
    }
}

impl ScheduleResolver {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_civil(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Next instant strictly after `now` whose civil wall-clock reads
    /// `time_of_day`. One-off and daily tasks share the rule; daily tasks are
    /// simply asked again after every cycle.
    pub fn compute_next_run(
        &self,
        time_of_day: TimeOfDay,
        frequency: Frequency,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match frequency {
            Frequency::Once | Frequency::Daily => self.next_occurrence(time_of_day, now),
        }
    }

    fn next_occurrence(&self, time_of_day: TimeOfDay, now: DateTime<Utc>) -> DateTime<Utc> {
        let civil_now = self.to_civil(now);
        let today = civil_now.date_naive().and_time(time_of_day.as_naive_time());
        let candidate = self.civil_to_utc(today);
        if candidate > now {
            candidate
        } else {
            candidate + TimeDelta::days(1)
        }
    }

    fn civil_to_utc(&self, civil: NaiveDateTime) -> DateTime<Utc> {
        let shifted = civil - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&shifted)
    }
}
