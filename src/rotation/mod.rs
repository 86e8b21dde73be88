//! Backup rotation: cron-style schedules, retention bookkeeping and the
//! keep-or-delete decision for each remote artifact.
//!
//! A rotation pass visits the artifacts of one backup family newest first.
//! Every artifact is matched against the configured schedules and counted
//! against their retain limits; anything not kept by a schedule (or by the
//! legacy day window) is marked for deletion.
//!
//! ```rust
//! use blackbox::rotation::{Decision, RotationPolicy};
//! use chrono::{TimeZone, Utc};
//!
//! let policy = RotationPolicy::new(&["* * * * * 1"], None).unwrap();
//! let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
//! let mut pass = policy.start_pass(now);
//!
//! assert!(!pass.decide(now).unwrap().is_delete());
//! assert!(pass.decide(now).unwrap().is_delete());
//! ```

pub mod cron;
pub mod policy;
pub mod tracker;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use cron::{match_field, matches_cron, matches_crons, CronExpression, CronField};
pub use policy::{
    get_highest_max_retention_count, meets_delete_criteria, within_retention_days, Decision,
    DecisionReason, RotationPass, RotationPolicy,
};
pub use tracker::{
    clean_cron_expression, construct_retention_tracker, RetainLimit, RetentionTracker,
    RotationStrategy, TrackerEntry,
};

/// Errors raised while parsing schedules or deciding on artifacts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// Expression does not have exactly five fields
    #[error("Invalid cron expression (should have 5 fields): {0}")]
    FieldCount(String),

    /// A field could not be parsed
    #[error("Cannot parse cron value: {0}")]
    InvalidField(String),

    /// An artifact was presented after a newer one
    #[error("Artifacts must be visited newest first: {current} is newer than {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}
