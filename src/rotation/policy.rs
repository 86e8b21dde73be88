//! Retention decisions for a single rotation pass

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cron::CronExpression;
use super::tracker::{clean_cron_expression, RetainLimit, RetentionTracker};
use super::RotationError;

/// Whether an artifact is still inside the legacy day window.
///
/// `None` or `Some(0)` disables the window, which counts as "inside".
pub fn within_retention_days(days: Option<u32>, dt: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match days {
        None | Some(0) => true,
        Some(days) => (now - dt).num_days() <= i64::from(days),
    }
}

/// Pick the matched schedule with the largest retain limit.
///
/// Ties keep the first one seen. A limit of 0 never wins, so `None` means no
/// matched schedule allows keeping anything.
pub fn get_highest_max_retention_count<'a, S: AsRef<str>>(
    tracker: &RetentionTracker,
    matching: &'a [S],
) -> Option<(&'a str, RetainLimit)> {
    let mut highest: Option<(&'a str, RetainLimit)> = None;
    let mut highest_max = RetainLimit::Limited(0);

    for expression in matching {
        let expression = expression.as_ref();
        if let Some(max) = tracker.max(expression) {
            if max > highest_max {
                highest = Some((expression, max));
                highest_max = max;
            }
        }
    }

    highest
}

/// Deletion requires both the day window and the retain count to allow it.
///
/// The day condition holds when no window is configured or the artifact is
/// outside it. The count condition holds when the limit is 0 or already
/// reached; an unlimited schedule never reaches it.
pub fn meets_delete_criteria(
    max: RetainLimit,
    num_retained: u32,
    days: Option<u32>,
    dt: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    let no_window = matches!(days, None | Some(0));
    let outside_window = !within_retention_days(days, dt, now);

    (no_window || outside_window) && max.is_reached(num_retained)
}

/// Why an artifact was kept or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No configured schedule matches the artifact timestamp
    NoMatchingSchedule,
    /// The governing schedule already holds its maximum
    RetainLimitReached,
    /// Older than `retention_days` (legacy mode)
    OutsideRetentionWindow,
    /// Younger than `retention_days`
    WithinRetentionWindow,
    /// A matching schedule still has room
    RetainedBySchedule,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoMatchingSchedule => "no matching rotation schedule",
            Self::RetainLimitReached => "retain limit reached",
            Self::OutsideRetentionWindow => "outside retention window",
            Self::WithinRetentionWindow => "within retention window",
            Self::RetainedBySchedule => "retained by schedule",
        };
        f.write_str(text)
    }
}

/// Outcome for one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Retain(DecisionReason),
    Delete(DecisionReason),
}

impl Decision {
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }

    pub fn reason(&self) -> DecisionReason {
        match self {
            Self::Retain(reason) | Self::Delete(reason) => *reason,
        }
    }
}

/// Validated rotation configuration for one storage handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    strategies: Vec<String>,
    schedules: Vec<CronExpression>,
    retention_days: Option<u32>,
}

impl RotationPolicy {
    /// Validate the strategies and build a policy.
    ///
    /// Every schedule is parsed up front so malformed expressions fail here
    /// rather than halfway through a pass. Schedules keep their configured
    /// order; two strategies with the same canonical key share one tracker
    /// entry and both count a retained backup against it.
    pub fn new<S: AsRef<str>>(
        strategies: &[S],
        retention_days: Option<u32>,
    ) -> Result<Self, RotationError> {
        let schedules = strategies
            .iter()
            .map(|strategy| CronExpression::parse(&clean_cron_expression(strategy.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            strategies: strategies.iter().map(|s| s.as_ref().to_string()).collect(),
            schedules,
            retention_days,
        })
    }

    /// Day-based rotation only
    pub fn legacy(retention_days: Option<u32>) -> Self {
        Self {
            strategies: Vec::new(),
            schedules: Vec::new(),
            retention_days,
        }
    }

    /// `true` when no rotation strategies are configured
    pub fn is_legacy(&self) -> bool {
        self.schedules.is_empty()
    }

    pub fn strategies(&self) -> &[String] {
        &self.strategies
    }

    pub fn schedules(&self) -> &[CronExpression] {
        &self.schedules
    }

    pub fn retention_days(&self) -> Option<u32> {
        self.retention_days
    }

    /// Start a pass with a fresh tracker. `now` is fixed for the whole pass.
    pub fn start_pass(&self, now: DateTime<Utc>) -> RotationPass<'_> {
        RotationPass {
            policy: self,
            tracker: RetentionTracker::from_strategies(&self.strategies),
            now,
            last_seen: None,
        }
    }
}

/// Mutable state of one rotation pass over a backup family
#[derive(Debug)]
pub struct RotationPass<'a> {
    policy: &'a RotationPolicy,
    tracker: RetentionTracker,
    now: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
}

impl<'a> RotationPass<'a> {
    /// Decide on the next artifact. Artifacts must arrive newest first;
    /// equal timestamps are fine.
    pub fn decide(&mut self, modified: DateTime<Utc>) -> Result<Decision, RotationError> {
        if let Some(previous) = self.last_seen {
            if modified > previous {
                return Err(RotationError::OutOfOrder {
                    previous,
                    current: modified,
                });
            }
        }
        self.last_seen = Some(modified);

        let days = self.policy.retention_days;

        if self.policy.is_legacy() {
            return Ok(if within_retention_days(days, modified, self.now) {
                Decision::Retain(DecisionReason::WithinRetentionWindow)
            } else {
                Decision::Delete(DecisionReason::OutsideRetentionWindow)
            });
        }

        let matching: Vec<&str> = self
            .policy
            .schedules
            .iter()
            .filter(|schedule| schedule.matches(&modified))
            .map(CronExpression::as_str)
            .collect();

        if matching.is_empty() {
            return Ok(Decision::Delete(DecisionReason::NoMatchingSchedule));
        }

        let (max, num_retained) = get_highest_max_retention_count(&self.tracker, &matching)
            .map(|(expression, max)| (max, self.tracker.num_retained(expression)))
            .unwrap_or((RetainLimit::Limited(0), 0));

        if meets_delete_criteria(max, num_retained, days, modified, self.now) {
            return Ok(Decision::Delete(DecisionReason::RetainLimitReached));
        }

        self.tracker.record_retention(&matching);

        Ok(if max.is_reached(num_retained) {
            Decision::Retain(DecisionReason::WithinRetentionWindow)
        } else {
            Decision::Retain(DecisionReason::RetainedBySchedule)
        })
    }

    pub fn tracker(&self) -> &RetentionTracker {
        &self.tracker
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
