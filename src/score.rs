//! Fitness score derivation.
//!
//! Pure functions over an activity slice and a timeframe. Deterministic and
//! side-effect free: the clock is an explicit argument on the `_at` variants,
//! and the convenience wrappers only inject `Utc::now()`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::model::{Activity, TYPE_ACTION_ITEM};
use crate::time::{parse_date_ms, to_date};

pub const BASE_SCORE: f64 = 5.0;
const ACTIVITY_POINT_CAP: f64 = 40.0;
const CONSISTENCY_WEIGHT: f64 = 40.0;
const MS_PER_DAY: i64 = 86_400_000;

/// Points per logged activity, by type. Unknown types earn 2.
static TYPE_WEIGHTS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("meeting", 10.0),
        ("prayer", 8.0),
        ("meditation", 8.0),
        ("reading", 6.0),
        ("literature", 6.0),
        ("callSponsor", 5.0),
        ("callSponsee", 4.0),
        ("call", 5.0),
        ("service", 9.0),
        ("stepWork", 10.0),
        ("stepwork", 10.0),
    ])
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub activity_points: f64,
    pub consistency_points: f64,
    pub total_score: f64,
    pub recent_activities: usize,
    pub active_days: usize,
}

impl ScoreBreakdown {
    fn base_only() -> Self {
        Self {
            base_score: BASE_SCORE,
            activity_points: 0.0,
            consistency_points: 0.0,
            total_score: BASE_SCORE,
            recent_activities: 0,
            active_days: 0,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn points_for(activity: &Activity) -> f64 {
    if activity.kind == TYPE_ACTION_ITEM {
        // Action items earn or lose a half point by completion status;
        // pending ones are neutral.
        match activity.location.as_deref() {
            Some("completed") => 0.5,
            Some("deleted") => -0.5,
            _ => 0.0,
        }
    } else {
        TYPE_WEIGHTS
            .get(activity.kind.as_str())
            .copied()
            .unwrap_or(2.0)
    }
}

/// Score an activity slice for a timeframe against an explicit clock.
pub fn fitness_score_at(activities: &[Activity], timeframe_days: u32, now: DateTime<Utc>) -> f64 {
    fitness_breakdown_at(activities, timeframe_days, now).total_score
}

pub fn fitness_score(activities: &[Activity], timeframe_days: u32) -> f64 {
    fitness_score_at(activities, timeframe_days, Utc::now())
}

/// The score plus its intermediate terms, for display.
pub fn fitness_breakdown_at(
    activities: &[Activity],
    timeframe_days: u32,
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    if timeframe_days == 0 {
        return ScoreBreakdown::base_only();
    }
    let window_start_ms = now.timestamp_millis() - timeframe_days as i64 * MS_PER_DAY;

    let mut total_points = 0.0;
    let mut active_days: HashSet<String> = HashSet::new();
    let mut recent = 0usize;

    for activity in activities {
        let Some(ms) = parse_date_ms(&activity.date) else {
            continue;
        };
        if ms < window_start_ms {
            continue;
        }
        recent += 1;
        active_days.insert(to_date(ms).format("%Y-%m-%d").to_string());
        total_points += points_for(activity);
    }

    if recent == 0 {
        return ScoreBreakdown::base_only();
    }

    // Points are compressed by 4 then hard-capped so a burst of logging
    // cannot dominate; consistency rewards spread across distinct days.
    let activity_points = (total_points / 4.0).min(ACTIVITY_POINT_CAP);
    let consistency_points =
        active_days.len() as f64 / timeframe_days as f64 * CONSISTENCY_WEIGHT;
    // Deleted action items can push the activity term negative; the score
    // contract stays within [5, 100] regardless.
    let total = (BASE_SCORE + activity_points + consistency_points).clamp(BASE_SCORE, 100.0);

    ScoreBreakdown {
        base_score: BASE_SCORE,
        activity_points: round2(activity_points),
        consistency_points: round2(consistency_points),
        total_score: round2(total),
        recent_activities: recent,
        active_days: active_days.len(),
    }
}

pub fn fitness_breakdown(activities: &[Activity], timeframe_days: u32) -> ScoreBreakdown {
    fitness_breakdown_at(activities, timeframe_days, Utc::now())
}

/// Whole days sober, rounded up.
pub fn sobriety_days_at(sobriety_date: &str, now: DateTime<Utc>) -> Option<i64> {
    let start = parse_date_ms(sobriety_date)?;
    let diff = (now.timestamp_millis() - start).abs();
    Some((diff + MS_PER_DAY - 1) / MS_PER_DAY)
}

pub fn sobriety_days(sobriety_date: &str) -> Option<i64> {
    sobriety_days_at(sobriety_date, Utc::now())
}

/// Years sober as a decimal (365.25-day years).
pub fn sobriety_years_at(
    sobriety_date: &str,
    decimal_places: u32,
    now: DateTime<Utc>,
) -> Option<f64> {
    let days = sobriety_days_at(sobriety_date, now)? as f64;
    let factor = 10f64.powi(decimal_places as i32);
    Some((days / 365.25 * factor).round() / factor)
}

pub fn sobriety_years(sobriety_date: &str, decimal_places: u32) -> Option<f64> {
    sobriety_years_at(sobriety_date, decimal_places, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(kind: &str, date: &str) -> Activity {
        serde_json::from_value(json!({"type": kind, "date": date})).unwrap()
    }

    fn noon(date: &str) -> DateTime<Utc> {
        format!("{date}T12:00:00Z").parse().unwrap()
    }

    #[test]
    fn empty_slice_scores_base() {
        assert_eq!(fitness_score_at(&[], 7, noon("2025-06-15")), BASE_SCORE);
        assert_eq!(fitness_score_at(&[], 365, noon("2025-06-15")), BASE_SCORE);
    }

    #[test]
    fn single_meeting_week_scenario() {
        // 5 base + min(10/4, 40) + (1/7)*40 = 13.214... -> 13.21
        let feed = vec![at("meeting", "2025-06-15")];
        assert_eq!(fitness_score_at(&feed, 7, noon("2025-06-15")), 13.21);
    }

    #[test]
    fn activity_points_cap_at_forty() {
        // 20 meetings on one day: 200 points -> /4 = 50 -> capped at 40.
        let feed: Vec<Activity> = (0..20).map(|_| at("meeting", "2025-06-15")).collect();
        let breakdown = fitness_breakdown_at(&feed, 7, noon("2025-06-15"));
        assert_eq!(breakdown.activity_points, 40.0);
        assert_eq!(breakdown.active_days, 1);
        assert_eq!(breakdown.total_score, round2(5.0 + 40.0 + 40.0 / 7.0));
    }

    #[test]
    fn activities_outside_the_window_are_ignored() {
        let feed = vec![at("meeting", "2025-01-01"), at("meeting", "2025-06-15")];
        let breakdown = fitness_breakdown_at(&feed, 7, noon("2025-06-15"));
        assert_eq!(breakdown.recent_activities, 1);
    }

    #[test]
    fn unparseable_dates_are_skipped() {
        let feed = vec![at("meeting", "not-a-date"), at("meeting", "")];
        assert_eq!(fitness_score_at(&feed, 7, noon("2025-06-15")), BASE_SCORE);
    }

    #[test]
    fn action_items_score_by_completion_status() {
        let now = noon("2025-06-15");
        let mut completed = at("action-item", "2025-06-15");
        completed.location = Some("completed".into());
        let mut deleted = at("action-item", "2025-06-15");
        deleted.location = Some("deleted".into());
        let pending = at("action-item", "2025-06-15");

        // completed: 0.5/4 = 0.125; deleted cancels it; pending adds nothing.
        let b1 = fitness_breakdown_at(&[completed.clone()], 30, now);
        assert_eq!(b1.activity_points, 0.13);
        let b2 = fitness_breakdown_at(&[completed, deleted, pending], 30, now);
        assert_eq!(b2.activity_points, 0.0);
    }

    #[test]
    fn unknown_types_default_to_two_points() {
        let breakdown = fitness_breakdown_at(&[at("gratitude", "2025-06-15")], 30, noon("2025-06-15"));
        assert_eq!(breakdown.activity_points, 0.5);
    }

    #[test]
    fn score_is_deterministic() {
        let feed = vec![
            at("meeting", "2025-06-15"),
            at("prayer", "2025-06-14"),
            at("service", "2025-06-10"),
        ];
        let now = noon("2025-06-15");
        assert_eq!(
            fitness_score_at(&feed, 30, now),
            fitness_score_at(&feed, 30, now)
        );
    }

    #[test]
    fn adding_activities_never_lowers_the_score() {
        let now = noon("2025-06-15");
        let mut feed = Vec::new();
        let mut last = fitness_score_at(&feed, 30, now);
        for _ in 0..60 {
            feed.push(at("meeting", "2025-06-15"));
            let next = fitness_score_at(&feed, 30, now);
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn total_never_exceeds_one_hundred() {
        let now = noon("2025-06-15");
        let mut feed = Vec::new();
        for day in 1..=30 {
            for _ in 0..10 {
                feed.push(at("meeting", &format!("2025-06-{day:02}")));
            }
        }
        let breakdown = fitness_breakdown_at(&feed, 30, now);
        assert!(breakdown.total_score <= 100.0);
        assert!(breakdown.total_score >= BASE_SCORE);
    }

    #[test]
    fn sobriety_helpers_round_as_documented() {
        let now = noon("2025-06-15");
        let days = sobriety_days_at("2024-06-15", now).unwrap();
        assert_eq!(days, 366); // ceil over the half-day remainder
        let years = sobriety_years_at("2015-06-15", 2, now).unwrap();
        assert!((years - 10.0).abs() < 0.05);
    }
}
