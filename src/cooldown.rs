//! Notification cooldown.
//!
//! With a cooldown configured, successful runs only notify when the last
//! successful notification is older than the cooldown. Failures always
//! notify. The last notification time lives in `notify.json` next to the
//! configuration file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConfigError;

pub const STATE_FILE: &str = "notify.json";

fn duration_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    REGEX
        .get_or_init(|| {
            Regex::new(concat!(
                r"^(?:(?P<years>\d+?) ?(?:years|year|Y|y) ?)?",
                r"(?:(?P<months>\d+?) ?(?:months|month|m) ?)?",
                r"(?:(?P<weeks>\d+?) ?(?:weeks|week|W|w) ?)?",
                r"(?:(?P<days>\d+?) ?(?:days|day|D|d) ?)?",
                r"(?:(?P<hours>\d+?) ?(?:hours|hour|H|h) ?)?",
                r"(?:(?P<minutes>\d+?) ?(?:minutes|minute|M) ?)?",
                r"(?:(?P<seconds>\d+?) ?(?:seconds|second|S|s))?$",
            ))
        })
        .as_ref()
        .ok()
}

/// A calendar-aware duration such as `1y 2m 3w`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cooldown {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Cooldown {
    /// Parse a duration string. `m` is months and `M` is minutes.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = duration_regex()?.captures(text)?;
        let unit = |name: &str| -> Option<u32> {
            match captures.name(name) {
                Some(value) => value.as_str().parse().ok(),
                None => Some(0),
            }
        };

        Some(Self {
            years: unit("years")?,
            months: unit("months")?,
            weeks: unit("weeks")?,
            days: unit("days")?,
            hours: unit("hours")?,
            minutes: unit("minutes")?,
            seconds: unit("seconds")?,
        })
    }

    /// `now` moved back by this cooldown
    pub fn before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let shifted = now.checked_sub_months(Months::new(months))?;
        let span = Duration::weeks(i64::from(self.weeks))
            + Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds));
        shifted.checked_sub_signed(span)
    }

    /// Whether a notification last sent at `last_sent` may be repeated
    pub fn has_elapsed(&self, last_sent: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.before(now) {
            Some(threshold) => threshold >= last_sent,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NotifyState {
    last_notify: DateTime<Utc>,
}

/// Persisted cooldown state
#[derive(Debug, Clone)]
pub struct CooldownState {
    path: PathBuf,
}

impl CooldownState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file next to the given configuration file
    pub fn beside_config(config_path: &Path) -> Self {
        let directory = config_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(directory.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last notification time. Unreadable state counts as never notified.
    pub async fn last_notify(&self) -> Option<DateTime<Utc>> {
        let text = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str::<NotifyState>(&text) {
            Ok(state) => Some(state.last_notify),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable cooldown state");
                None
            }
        }
    }

    pub async fn record(&self, at: DateTime<Utc>) -> Result<(), ConfigError> {
        let body = serde_json::to_string_pretty(&NotifyState { last_notify: at })
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "Recorded notification time");
        Ok(())
    }

    /// Whether a successful run should notify now
    pub async fn should_notify(&self, cooldown: &Cooldown, now: DateTime<Utc>) -> bool {
        match self.last_notify().await {
            Some(last) => cooldown.has_elapsed(last, now),
            None => true,
        }
    }
}
