//! Rotation strategy parsing and per-pass retention bookkeeping

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::cron::CRON_FIELDS;

/// How many backups matching a schedule may be kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RetainLimit {
    /// Keep at most this many. `Limited(0)` keeps none.
    Limited(u32),
    /// No cap on the number of backups
    Unlimited,
}

impl RetainLimit {
    /// Parse the optional sixth token of a rotation strategy.
    ///
    /// Anything that is not a non-negative integer (`*`, `-1`, `lots`) means
    /// unlimited.
    pub fn parse(token: &str) -> Self {
        token
            .trim()
            .parse::<u32>()
            .map(Self::Limited)
            .unwrap_or(Self::Unlimited)
    }

    /// `true` for `Limited(0)`
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Limited(0))
    }

    /// Whether `retained` backups already fill this limit
    pub fn is_reached(&self, retained: u32) -> bool {
        match self {
            Self::Limited(max) => retained >= *max,
            Self::Unlimited => false,
        }
    }
}

impl Default for RetainLimit {
    fn default() -> Self {
        Self::Unlimited
    }
}

impl fmt::Display for RetainLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{}", max),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Strip the retain-count token from a 6-field rotation strategy.
///
/// `"* * 4 * * 7"` becomes `"* * 4 * *"`. Any other expression is returned
/// with its fields rejoined by single spaces.
pub fn clean_cron_expression(expression: &str) -> String {
    let mut parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() == CRON_FIELDS + 1 {
        parts.pop();
    }
    parts.join(" ")
}

/// A configured rotation strategy split into its schedule key and limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationStrategy {
    key: String,
    limit: RetainLimit,
}

impl RotationStrategy {
    /// Split a 5 or 6 token strategy. Five tokens mean an unlimited schedule.
    pub fn parse(expression: &str) -> Self {
        let mut parts: Vec<&str> = expression.split_whitespace().collect();
        let limit = if parts.len() == CRON_FIELDS + 1 {
            parts.pop().map(RetainLimit::parse).unwrap_or_default()
        } else {
            RetainLimit::Unlimited
        };

        Self {
            key: parts.join(" "),
            limit,
        }
    }

    /// Canonical 5-field cron key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limit(&self) -> RetainLimit {
        self.limit
    }
}

/// Retention state for one schedule during a rotation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerEntry {
    pub num_retained: u32,
    pub max: RetainLimit,
}

/// Tracks how many backups each schedule has retained so far.
///
/// Built fresh for every rotation pass and dropped afterwards; the counts are
/// only meaningful while artifacts are visited newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionTracker {
    entries: HashMap<String, TrackerEntry>,
}

impl RetentionTracker {
    /// Build a tracker from configured strategies. Later duplicates of a
    /// canonical key replace earlier ones.
    pub fn from_strategies<S: AsRef<str>>(expressions: &[S]) -> Self {
        let mut entries = HashMap::with_capacity(expressions.len());
        for expression in expressions {
            let strategy = RotationStrategy::parse(expression.as_ref());
            entries.insert(
                strategy.key,
                TrackerEntry {
                    num_retained: 0,
                    max: strategy.limit,
                },
            );
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&TrackerEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Configured limit for a key, if tracked
    pub fn max(&self, key: &str) -> Option<RetainLimit> {
        self.entries.get(key).map(|entry| entry.max)
    }

    /// Retained count for a key, 0 for unknown keys
    pub fn num_retained(&self, key: &str) -> u32 {
        self.entries
            .get(key)
            .map(|entry| entry.num_retained)
            .unwrap_or(0)
    }

    /// Count one retained backup against every given schedule. A key listed
    /// twice is counted twice.
    pub fn record_retention<S: AsRef<str>>(&mut self, keys: &[S]) {
        for key in keys {
            if let Some(entry) = self.entries.get_mut(key.as_ref()) {
                entry.num_retained = entry.num_retained.saturating_add(1);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TrackerEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }
}

/// Build the retention tracker for a rotation pass.
///
/// An empty input gives an empty tracker, which callers read as "no rotation
/// strategies configured".
pub fn construct_retention_tracker<S: AsRef<str>>(expressions: &[S]) -> RetentionTracker {
    RetentionTracker::from_strategies(expressions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_cron_expression() {
        let cases = [
            ("* * * 2 * *", "* * * 2 *"),
            ("25 10 * * * *", "25 10 * * *"),
            ("* 11 * * 1 1", "* 11 * * 1"),
            ("2 4 5 7 4 0", "2 4 5 7 4"),
            ("* 3/2 1,3,4 5-9 * 5", "* 3/2 1,3,4 5-9 *"),
            ("  0 4  * * 1 ", "0 4 * * 1"),
        ];
        for (raw, cleaned) in cases {
            assert_eq!(clean_cron_expression(raw), cleaned);
        }
    }

    #[test]
    fn test_retain_limit_parsing() {
        assert_eq!(RetainLimit::parse("3"), RetainLimit::Limited(3));
        assert_eq!(RetainLimit::parse("0"), RetainLimit::Limited(0));
        assert_eq!(RetainLimit::parse("*"), RetainLimit::Unlimited);
        assert_eq!(RetainLimit::parse("-1"), RetainLimit::Unlimited);
        assert!(RetainLimit::Unlimited > RetainLimit::Limited(u32::MAX));
        assert!(RetainLimit::Limited(5) > RetainLimit::Limited(1));
    }

    #[test]
    fn test_retain_limit_reached() {
        assert!(RetainLimit::Limited(0).is_reached(0));
        assert!(RetainLimit::Limited(2).is_reached(2));
        assert!(!RetainLimit::Limited(2).is_reached(1));
        assert!(!RetainLimit::Unlimited.is_reached(u32::MAX));
    }

    #[test]
    fn test_construct_retention_tracker() {
        let strategies = [
            "* * * 2 * *",
            "25 10 * * * *",
            "* 11 * * 1 1",
            "2 4 5 7 4 0",
            "* 3/2 1,3,4 5-9 * 5",
            "1 1 3 4 7",
            "* * * * *",
        ];
        let tracker = construct_retention_tracker(&strategies);

        let mut entries: Vec<(String, RetainLimit)> = tracker
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.max))
            .collect();
        entries.sort();

        let mut expected = vec![
            ("* * * 2 *".to_string(), RetainLimit::Unlimited),
            ("25 10 * * *".to_string(), RetainLimit::Unlimited),
            ("* 11 * * 1".to_string(), RetainLimit::Limited(1)),
            ("2 4 5 7 4".to_string(), RetainLimit::Limited(0)),
            ("* 3/2 1,3,4 5-9 *".to_string(), RetainLimit::Limited(5)),
            ("1 1 3 4 7".to_string(), RetainLimit::Unlimited),
            ("* * * * *".to_string(), RetainLimit::Unlimited),
        ];
        expected.sort();

        assert_eq!(entries, expected);
        assert!(tracker.iter().all(|(_, entry)| entry.num_retained == 0));
    }

    #[test]
    fn test_empty_tracker() {
        let tracker = construct_retention_tracker::<&str>(&[]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_duplicate_keys_keep_last_entry() {
        let tracker = construct_retention_tracker(&["* * * * * 2", "* * * * * 9"]);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.max("* * * * *"), Some(RetainLimit::Limited(9)));
    }

    #[test]
    fn test_record_retention_counts_repeated_keys() {
        let mut tracker = construct_retention_tracker(&["* * * * * 2", "* * * * * 9"]);
        tracker.record_retention(&["* * * * *", "* * * * *"]);
        assert_eq!(tracker.num_retained("* * * * *"), 2);
    }

    #[test]
    fn test_record_retention_ignores_unknown_keys() {
        let mut tracker = construct_retention_tracker(&["* * * 2 * 3"]);
        tracker.record_retention(&["* * * 2 *", "1 1 1 1 1"]);
        assert_eq!(tracker.num_retained("* * * 2 *"), 1);
        assert_eq!(tracker.num_retained("1 1 1 1 1"), 0);
        assert!(!tracker.contains("1 1 1 1 1"));
    }
}
