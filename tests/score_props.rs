use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use serde_json::json;
use stillwater::{fitness_breakdown_at, fitness_score_at, Activity};

fn fixed_now() -> DateTime<Utc> {
    "2025-06-15T12:00:00Z".parse().unwrap()
}

fn activity(kind: &str, days_back: i64, location: Option<&str>) -> Activity {
    let date = (fixed_now() - Duration::days(days_back))
        .format("%Y-%m-%d")
        .to_string();
    serde_json::from_value(json!({
        "type": kind,
        "date": date,
        "location": location,
    }))
    .unwrap()
}

fn arb_activity() -> impl Strategy<Value = Activity> {
    let kinds = prop::sample::select(vec![
        "meeting",
        "prayer",
        "meditation",
        "reading",
        "literature",
        "call",
        "callSponsor",
        "callSponsee",
        "service",
        "stepwork",
        "action-item",
        "gratitude", // unknown type, hits the default weight
    ]);
    let locations = prop::sample::select(vec![None, Some("completed"), Some("deleted")]);
    (kinds, 0i64..420, locations).prop_map(|(kind, days_back, location)| {
        activity(kind, days_back, location)
    })
}

proptest! {
    #[test]
    fn score_stays_within_bounds(
        activities in prop::collection::vec(arb_activity(), 0..120),
        timeframe in 1u32..400,
    ) {
        let score = fitness_score_at(&activities, timeframe, fixed_now());
        prop_assert!(score >= 5.0, "score {score} fell below base");
        prop_assert!(score <= 100.0, "score {score} exceeded cap");
    }

    #[test]
    fn score_is_pure(
        activities in prop::collection::vec(arb_activity(), 0..60),
        timeframe in 1u32..400,
    ) {
        let first = fitness_score_at(&activities, timeframe, fixed_now());
        let second = fitness_score_at(&activities, timeframe, fixed_now());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn score_is_monotone_in_qualifying_activities(
        count in 1usize..80,
        timeframe in 1u32..60,
    ) {
        // Same type, same date: each added activity may only raise the score
        // until the 40-point activity cap absorbs further volume.
        let mut feed = Vec::new();
        let mut last = fitness_score_at(&feed, timeframe, fixed_now());
        for _ in 0..count {
            feed.push(activity("meeting", 0, None));
            let next = fitness_score_at(&feed, timeframe, fixed_now());
            prop_assert!(next >= last, "score dropped from {last} to {next}");
            last = next;
        }
    }

    #[test]
    fn breakdown_terms_sum_to_the_total(
        activities in prop::collection::vec(arb_activity(), 1..80),
        timeframe in 1u32..400,
    ) {
        let b = fitness_breakdown_at(&activities, timeframe, fixed_now());
        if b.recent_activities > 0 {
            let expected = (b.base_score + b.activity_points + b.consistency_points)
                .clamp(5.0, 100.0);
            prop_assert!((b.total_score - expected).abs() < 0.02);
            prop_assert!(b.active_days as u32 <= timeframe.min(b.recent_activities as u32));
        } else {
            prop_assert_eq!(b.total_score, 5.0);
        }
    }
}

#[test]
fn week_of_varied_activity_matches_hand_computation() {
    // 3 distinct days: meeting (10) + prayer (8) + service (9) = 27 points.
    // 5 + 27/4 + (3/7)*40 = 28.89.
    let feed = vec![
        activity("meeting", 0, None),
        activity("prayer", 1, None),
        activity("service", 2, None),
    ];
    assert_eq!(fitness_score_at(&feed, 7, fixed_now()), 28.89);
}

#[test]
fn deleted_action_items_cannot_sink_the_score_below_base() {
    let feed: Vec<Activity> = (0..200)
        .map(|_| activity("action-item", 0, Some("deleted")))
        .collect();
    assert_eq!(fitness_score_at(&feed, 30, fixed_now()), 5.0);
}
