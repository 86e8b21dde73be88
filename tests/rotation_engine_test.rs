// Integration tests for the rotation decision engine
// Scenarios run through the public policy API the way the rotation driver uses it

use blackbox::rotation::{
    clean_cron_expression, construct_retention_tracker, get_highest_max_retention_count, match_field,
    matches_cron, Decision, DecisionReason, RetainLimit, RotationError, RotationPolicy, TrackerEntry,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

#[test]
fn test_tracker_from_feb_only_schedule() {
    let tracker = construct_retention_tracker(&["* * * 2 * 3"]);

    assert_eq!(tracker.len(), 1);
    assert_eq!(
        tracker.get("* * * 2 *"),
        Some(&TrackerEntry {
            num_retained: 0,
            max: RetainLimit::Limited(3),
        })
    );
}

#[test]
fn test_empty_strategies_mean_legacy_mode() {
    let empty: [&str; 0] = [];
    assert!(construct_retention_tracker(&empty).is_empty());
    assert!(RotationPolicy::new(&empty, Some(7)).unwrap().is_legacy());
}

#[test]
fn test_weekday_and_step_fields() {
    assert!(match_field(0, "0", true).unwrap());
    assert!(match_field(7, "0", true).unwrap());
    assert!(match_field(15, "*/15", false).unwrap());
    assert!(!match_field(16, "*/15", false).unwrap());
}

#[test]
fn test_legacy_retention_window() {
    let policy = RotationPolicy::legacy(Some(7));
    let mut pass = policy.start_pass(now());

    let recent = pass.decide(now() - Duration::days(3)).unwrap();
    let old = pass.decide(now() - Duration::days(10)).unwrap();

    assert_eq!(recent, Decision::Retain(DecisionReason::WithinRetentionWindow));
    assert_eq!(old, Decision::Delete(DecisionReason::OutsideRetentionWindow));
}

#[test]
fn test_count_capped_schedule_keeps_newest_two() {
    let policy = RotationPolicy::new(&["* * * * * 2"], None).unwrap();
    let mut pass = policy.start_pass(now());

    let decisions: Vec<bool> = (0..3)
        .map(|age| pass.decide(now() - Duration::days(age)).unwrap().is_delete())
        .collect();

    assert_eq!(decisions, vec![false, false, true]);
    assert_eq!(pass.tracker().num_retained("* * * * *"), 2);
}

#[test]
fn test_no_match_deletes_regardless_of_window() {
    // Only first-of-month backups are scheduled
    let policy = RotationPolicy::new(&["* * 1 * * 5"], Some(30)).unwrap();
    let mut pass = policy.start_pass(now());

    let decision = pass.decide(now() - Duration::days(1)).unwrap();
    assert_eq!(decision, Decision::Delete(DecisionReason::NoMatchingSchedule));
}

#[test]
fn test_multi_match_most_permissive_schedule_governs() {
    let strategies = ["* * * * * 1", "* * * 3 * 5"];
    let tracker = construct_retention_tracker(&strategies);
    let matching = ["* * * * *", "* * * 3 *"];
    assert_eq!(
        get_highest_max_retention_count(&tracker, &matching),
        Some(("* * * 3 *", RetainLimit::Limited(5)))
    );

    let policy = RotationPolicy::new(&strategies, None).unwrap();
    let mut pass = policy.start_pass(now());

    // Two March backups are both kept under the max-5 schedule
    assert!(!pass.decide(now()).unwrap().is_delete());
    assert!(!pass.decide(now() - Duration::days(1)).unwrap().is_delete());
    assert_eq!(pass.tracker().num_retained("* * * * *"), 2);
    assert_eq!(pass.tracker().num_retained("* * * 3 *"), 2);

    // A February backup only matches the max-1 schedule, which is already full
    let february = Utc.with_ymd_and_hms(2025, 2, 20, 12, 0, 0).unwrap();
    assert_eq!(
        pass.decide(february).unwrap(),
        Decision::Delete(DecisionReason::RetainLimitReached)
    );
}

#[test]
fn test_duplicate_schedules_share_one_counter() {
    let policy = RotationPolicy::new(&["* * * * * 2", "* * * * * 9"], None).unwrap();
    let mut pass = policy.start_pass(now());

    let decisions: Vec<bool> = (0..12)
        .map(|age| pass.decide(now() - Duration::days(age)).unwrap().is_delete())
        .collect();

    // Both copies match, so every kept backup counts twice against the limit of 9
    assert_eq!(decisions.iter().filter(|deleted| !**deleted).count(), 5);
    assert_eq!(&decisions[..5], &[false; 5]);
    assert_eq!(pass.tracker().num_retained("* * * * *"), 10);
}

#[test]
fn test_retention_days_floor_protects_capped_artifacts() {
    let policy = RotationPolicy::new(&["* * * * * 1"], Some(7)).unwrap();
    let mut pass = policy.start_pass(now());

    assert!(!pass.decide(now()).unwrap().is_delete());
    // Over the cap but still inside the window
    assert_eq!(
        pass.decide(now() - Duration::days(2)).unwrap(),
        Decision::Retain(DecisionReason::WithinRetentionWindow)
    );
    assert!(pass.decide(now() - Duration::days(9)).unwrap().is_delete());
}

#[test]
fn test_malformed_schedules_fail_at_construction() {
    assert!(matches!(
        RotationPolicy::new(&["* * *"], None),
        Err(RotationError::FieldCount(_))
    ));
    assert!(matches!(
        RotationPolicy::new(&["* * * * mon 2"], None),
        Err(RotationError::InvalidField(_))
    ));
}

#[test]
fn test_each_pass_has_fresh_counters() {
    let policy = RotationPolicy::new(&["* * * * * 1"], None).unwrap();

    for _ in 0..2 {
        let mut pass = policy.start_pass(now());
        assert!(!pass.decide(now()).unwrap().is_delete());
        assert!(pass.decide(now() - Duration::days(1)).unwrap().is_delete());
    }
}

fn cron_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("*".to_string()),
        (0u32..60).prop_map(|n| n.to_string()),
        (1u32..30).prop_map(|n| format!("*/{}", n)),
    ]
}

proptest! {
    #[test]
    fn prop_wildcard_matches_everything(seconds in 0i64..4_102_444_800) {
        let dt = Utc.timestamp_opt(seconds, 0).unwrap();
        prop_assert!(matches_cron("* * * * *", &dt).unwrap());
    }

    #[test]
    fn prop_clean_is_idempotent(tokens in prop::collection::vec(cron_token(), 0..8)) {
        let expression = tokens.join(" ");
        let once = clean_cron_expression(&expression);
        prop_assert_eq!(clean_cron_expression(&once), once);
    }
}
