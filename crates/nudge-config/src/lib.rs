//! Layered configuration for nudge.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`NUDGE_*`, `__` separates sections, so
//!    `NUDGE_SCHEDULER__TICK_SECS` sets `scheduler.tick_secs`)
//! 2. `nudge.toml` in the working directory, or the file passed to
//!    [`NudgeConfig::load_from`]
//! 3. Built-in defaults

mod error;

pub use error::ConfigError;

use chrono::FixedOffset;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "nudge.toml";
pub const ENV_PREFIX: &str = "NUDGE_";
/// Upper bound for tick and follow-up periods: one day.
pub const MAX_PERIOD_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub outbound: OutboundConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".nudge/tasks.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4830,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Tick period. This is the reminder granularity: nothing fires more
    /// precisely than one tick.
    pub tick_secs: u64,
    pub reminder_interval_secs: u64,
    pub max_reminders: u32,
    pub gateway_timeout_secs: u64,
    /// Fixed civil offset, `+HH:MM` / `-HH:MM` / `Z`. No DST.
    pub utc_offset: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            reminder_interval_secs: 120,
            max_reminders: 30,
            gateway_timeout_secs: 10,
            utc_offset: "-07:00".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutboundConfig {
    /// Notifications buffered per slow subscriber before it starts lagging.
    pub buffer: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self { buffer: 256 }
    }
}

impl NudgeConfig {
    /// Loads defaults, `./nudge.toml` if present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load) but reads `path` instead of `./nudge.toml`.
    /// An explicitly named file must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::invalid(
                    "config",
                    format!("{} does not exist", path.display()),
                ));
            }
        }
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        check_period("scheduler.tick_secs", scheduler.tick_secs)?;
        check_period(
            "scheduler.reminder_interval_secs",
            scheduler.reminder_interval_secs,
        )?;
        if scheduler.max_reminders == 0 {
            return Err(ConfigError::invalid("scheduler.max_reminders", "must be positive"));
        }
        if scheduler.gateway_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.gateway_timeout_secs",
                "must be positive",
            ));
        }
        scheduler.offset()?;
        if self.outbound.buffer == 0 {
            return Err(ConfigError::invalid("outbound.buffer", "must be positive"));
        }
        if self.storage.db_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.db_path", "must not be empty"));
        }
        Ok(())
    }
}

/// Tick and follow-up periods must lie in `1..=MAX_PERIOD_SECS`.
fn check_period(field: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(ConfigError::invalid(field, "must be positive"));
    }
    if secs > MAX_PERIOD_SECS {
        return Err(ConfigError::invalid(
            field,
            format!("must be at most {MAX_PERIOD_SECS} seconds"),
        ));
    }
    Ok(())
}

/// Parses `Z`, `UTC`, `+HH:MM`, `-HH:MM` or `±HHMM`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || {
        ConfigError::invalid("scheduler.utc_offset", format!("unrecognized offset: {value}"))
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = NudgeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.scheduler.reminder_interval_secs, 120);
        assert_eq!(config.scheduler.max_reminders, 30);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:4830");
        assert_eq!(
            config.scheduler.offset().unwrap(),
            FixedOffset::west_opt(7 * 3600).unwrap()
        );
    }

    #[test]
    fn offsets() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("utc").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28_800);
        for bad in ["", "07:00", "+7", "+24:00", "-07:60", "PST", "+07:00:00"] {
            assert!(parse_utc_offset(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn rejects_zero_intervals() {
        let mut config = NudgeConfig::default();
        config.scheduler.reminder_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "scheduler.reminder_interval_secs"
        ));
    }

    #[test]
    fn rejects_periods_longer_than_a_day() {
        let mut config = NudgeConfig::default();
        config.scheduler.reminder_interval_secs = MAX_PERIOD_SECS;
        config.validate().unwrap();

        config.scheduler.reminder_interval_secs = 10_000_000_000_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "scheduler.reminder_interval_secs"
        ));

        let mut config = NudgeConfig::default();
        config.scheduler.tick_secs = MAX_PERIOD_SECS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "scheduler.tick_secs"
        ));
    }
}
