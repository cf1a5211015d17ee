use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Wall-clock time at which a task comes due, in the configured civil offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

const CLOCK_FORMATS: [&str; 4] = ["%H:%M", "%I:%M%p", "%H:%M:%S", "%I:%M:%S%p"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeOfDayError {
    OutOfRange { hour: u32, minute: u32 },
    Unrecognized { value: String },
}

impl fmt::Display for TimeOfDayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { hour, minute } => {
                write!(f, "time of day out of range: {hour:02}:{minute:02}")
            }
            Self::Unrecognized { value } => write!(
                f,
                "invalid time format: {value} (use HH:MM or H:MMAM/PM)"
            ),
        }
    }
}

impl std::error::Error for TimeOfDayError {}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeOfDayError> {
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayError::OutOfRange { hour, minute });
        }
        Ok(Self {
            hour: u8::try_from(hour).map_err(|_| TimeOfDayError::OutOfRange { hour, minute })?,
            minute: u8::try_from(minute)
                .map_err(|_| TimeOfDayError::OutOfRange { hour, minute })?,
        })
    }

    /// Parses one of the accepted clock spellings: `14:30`, `2:30PM`,
    /// `14:30:00`, `2:30:00pm`. Seconds are dropped.
    pub fn parse_clock(input: &str) -> Result<Self, TimeOfDayError> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        for format in CLOCK_FORMATS {
            if let Ok(time) = NaiveTime::parse_from_str(&normalized, format) {
                return Self::new(time.hour(), time.minute());
            }
        }
        Err(TimeOfDayError::Unrecognized {
            value: input.to_string(),
        })
    }

    pub fn as_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_clock(s)
    }
}
