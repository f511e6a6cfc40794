//! Scoring primitives shared by all evaluators.
//!
//! Shift hours, rest gaps, ISO-week windows and the score → recommendation
//! policy live here so every evaluator computes them identically.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::model::{Recommendation, ScoringComponent, Shift};

/// Working hours of a shift: `(end − start) − break`, in hours.
pub fn shift_hours(shift: &Shift) -> f64 {
    shift.working_hours()
}

/// Hours of rest between `earlier` ending and `later` starting. Negative when
/// the shifts overlap.
pub fn rest_hours_between(earlier: &Shift, later: &Shift) -> f64 {
    (later.start - earlier.end).num_minutes() as f64 / 60.0
}

/// Monday 00:00 of the ISO week containing `at`, and the following Monday.
pub fn week_bounds(at: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let date = at.date();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let start = monday.and_time(chrono::NaiveTime::MIN);
    (start, start + Duration::days(7))
}

/// Shifts owned by `user_id`.
pub fn user_shifts<'a>(shifts: &'a [Shift], user_id: &str) -> Vec<&'a Shift> {
    shifts.iter().filter(|s| s.user_id == user_id).collect()
}

/// Working hours of the shifts that start inside `[from, to)`.
pub fn hours_starting_between<'a>(
    shifts: impl IntoIterator<Item = &'a Shift>,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> f64 {
    shifts
        .into_iter()
        .filter(|s| s.start >= from && s.start < to)
        .map(shift_hours)
        .sum()
}

/// Working hours a user has in the ISO week containing `at`, counting the
/// candidate when it is given.
pub fn weekly_hours(
    existing: &[Shift],
    candidate: Option<&Shift>,
    user_id: &str,
    at: NaiveDateTime,
) -> f64 {
    let (from, to) = week_bounds(at);
    hours_starting_between(
        user_shifts(existing, user_id).into_iter().chain(candidate),
        from,
        to,
    )
}

/// Working hours a user has on the calendar day `date`, counting the candidate
/// when it is given.
pub fn daily_hours(
    existing: &[Shift],
    candidate: Option<&Shift>,
    user_id: &str,
    date: NaiveDate,
) -> f64 {
    user_shifts(existing, user_id)
        .into_iter()
        .chain(candidate)
        .filter(|s| s.date() == date)
        .map(shift_hours)
        .sum()
}

/// Overtime hours (above `weekly_cap`) the user works in the week containing `at`.
pub fn weekly_overtime(
    existing: &[Shift],
    candidate: Option<&Shift>,
    user_id: &str,
    at: NaiveDateTime,
    weekly_cap: f64,
) -> f64 {
    (weekly_hours(existing, candidate, user_id, at) - weekly_cap).max(0.0)
}

/// Smallest rest gap between the candidate and any other shift of its owner.
/// `None` when the owner has no other shifts.
pub fn min_rest_around(existing: &[Shift], candidate: &Shift) -> Option<f64> {
    user_shifts(existing, &candidate.user_id)
        .into_iter()
        .map(|other| {
            if other.overlaps(candidate) {
                0.0
            } else if other.end <= candidate.start {
                rest_hours_between(other, candidate)
            } else {
                rest_hours_between(candidate, other)
            }
        })
        .min_by(|a, b| a.total_cmp(b))
}

/// Longest continuous rest inside the ISO week containing the candidate, with
/// the candidate worked.
pub fn longest_weekly_rest(existing: &[Shift], candidate: &Shift) -> f64 {
    let (week_start, week_end) = week_bounds(candidate.start);
    let mut worked: Vec<(NaiveDateTime, NaiveDateTime)> = user_shifts(existing, &candidate.user_id)
        .into_iter()
        .chain(std::iter::once(candidate))
        .filter(|s| s.start < week_end && s.end > week_start)
        .map(|s| (s.start.max(week_start), s.end.min(week_end)))
        .collect();
    worked.sort();

    let mut longest = Duration::zero();
    let mut free_from = week_start;
    for (start, end) in worked {
        if start > free_from {
            longest = longest.max(start - free_from);
        }
        free_from = free_from.max(end);
    }
    if week_end > free_from {
        longest = longest.max(week_end - free_from);
    }
    longest.num_minutes() as f64 / 60.0
}

/// Map a continuous score onto a discrete recommendation and confidence.
///
/// Boundaries are inclusive (`>=`).
pub fn determine_recommendation(
    score: f64,
    has_critical_concerns: bool,
    has_warnings: bool,
) -> (Recommendation, f64) {
    if has_critical_concerns {
        return (Recommendation::Reject, 90.0);
    }
    if score >= 80.0 {
        let recommendation = if has_warnings {
            Recommendation::ApproveWithConditions
        } else {
            Recommendation::Approve
        };
        return (recommendation, score);
    }
    if score >= 60.0 {
        return (Recommendation::ApproveWithConditions, score);
    }
    if score >= 40.0 {
        return (Recommendation::NeedsModification, 70.0);
    }
    (Recommendation::Reject, 80.0)
}

/// Weight-normalised mean of `(score, max_score, weight)` triples on a 0–100
/// scale, rounded to one decimal.
///
/// Terms are summed in sorted order, so the result does not depend on the
/// order the components arrive in.
pub fn weighted_mean(terms: impl IntoIterator<Item = (f64, f64, f64)>) -> f64 {
    let mut weighted: Vec<f64> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for (score, max_score, weight) in terms {
        let normalized = if max_score > 0.0 {
            score / max_score * 100.0
        } else {
            0.0
        };
        weighted.push(normalized * weight);
        weights.push(weight);
    }
    weighted.sort_by(f64::total_cmp);
    weights.sort_by(f64::total_cmp);
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    round1(weighted.iter().sum::<f64>() / total_weight)
}

/// Weighted score of a component set.
pub fn weighted_score(components: &[ScoringComponent]) -> f64 {
    weighted_mean(
        components
            .iter()
            .map(|c| (c.score, c.max_score, c.weight)),
    )
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn shift(user: &str, start: &str, end: &str) -> Shift {
        Shift::new(user, at(start), at(end))
    }

    #[test]
    fn test_recommendation_boundaries_inclusive() {
        assert_eq!(
            determine_recommendation(80.0, false, false),
            (Recommendation::Approve, 80.0)
        );
        assert_eq!(
            determine_recommendation(80.0, false, true),
            (Recommendation::ApproveWithConditions, 80.0)
        );
        assert_eq!(
            determine_recommendation(79.9, false, false),
            (Recommendation::ApproveWithConditions, 79.9)
        );
        assert_eq!(
            determine_recommendation(60.0, false, false),
            (Recommendation::ApproveWithConditions, 60.0)
        );
        assert_eq!(
            determine_recommendation(40.0, false, false),
            (Recommendation::NeedsModification, 70.0)
        );
        assert_eq!(
            determine_recommendation(39.9, false, false),
            (Recommendation::Reject, 80.0)
        );
    }

    #[test]
    fn test_critical_concern_always_rejects() {
        assert_eq!(
            determine_recommendation(100.0, true, false),
            (Recommendation::Reject, 90.0)
        );
    }

    #[test]
    fn test_week_bounds_monday_to_monday() {
        let (start, end) = week_bounds(at("2025-03-06 13:00")); // Thursday
        assert_eq!(start, at("2025-03-03 00:00"));
        assert_eq!(end, at("2025-03-10 00:00"));

        let (start, _) = week_bounds(at("2025-03-09 23:00")); // Sunday
        assert_eq!(start, at("2025-03-03 00:00"));
    }

    #[test]
    fn test_rest_between_shifts() {
        let a = shift("u1", "2025-03-03 08:00", "2025-03-03 16:00");
        let b = shift("u1", "2025-03-03 18:00", "2025-03-03 22:00");
        assert!((rest_hours_between(&a, &b) - 2.0).abs() < f64::EPSILON);
        assert_eq!(min_rest_around(&[a], &b), Some(2.0));
    }

    #[test]
    fn test_min_rest_ignores_other_users() {
        let a = shift("u2", "2025-03-03 08:00", "2025-03-03 16:00");
        let b = shift("u1", "2025-03-03 18:00", "2025-03-03 22:00");
        assert_eq!(min_rest_around(&[a], &b), None);
    }

    #[test]
    fn test_overlap_counts_as_zero_rest() {
        let a = shift("u1", "2025-03-03 08:00", "2025-03-03 16:00");
        let b = shift("u1", "2025-03-03 15:00", "2025-03-03 20:00");
        assert_eq!(min_rest_around(&[a], &b), Some(0.0));
    }

    #[test]
    fn test_longest_weekly_rest_empty_week() {
        let candidate = shift("u1", "2025-03-03 08:00", "2025-03-03 16:00");
        // Monday 16:00 → next Monday 00:00
        assert!((longest_weekly_rest(&[], &candidate) - 152.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_longest_weekly_rest_busy_week() {
        let existing: Vec<Shift> = (3..=9)
            .map(|d| {
                shift(
                    "u1",
                    &format!("2025-03-{:02} 06:00", d),
                    &format!("2025-03-{:02} 18:00", d),
                )
            })
            .collect();
        let candidate = shift("u1", "2025-03-05 20:00", "2025-03-05 23:00");
        // 12h gaps every night, 6h at the start and end of the week
        assert!((longest_weekly_rest(&existing, &candidate) - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weekly_and_daily_hours() {
        let existing = vec![
            shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"),
            shift("u1", "2025-03-04 08:00", "2025-03-04 16:00"),
            shift("u1", "2025-03-11 08:00", "2025-03-11 16:00"), // next week
            shift("u2", "2025-03-03 08:00", "2025-03-03 16:00"),
        ];
        let candidate = shift("u1", "2025-03-04 18:00", "2025-03-04 20:00");
        assert_eq!(
            weekly_hours(&existing, Some(&candidate), "u1", candidate.start),
            18.0
        );
        assert_eq!(
            daily_hours(&existing, Some(&candidate), "u1", candidate.date()),
            10.0
        );
        assert_eq!(
            weekly_overtime(&existing, Some(&candidate), "u1", candidate.start, 16.0),
            2.0
        );
    }

    #[test]
    fn test_weighted_mean_normalises_by_total_weight() {
        let score = weighted_mean([(100.0, 100.0, 2.0), (0.0, 100.0, 2.0)]);
        assert_eq!(score, 50.0);
        let score = weighted_mean([(100.0, 100.0, 0.25), (50.0, 100.0, 0.75)]);
        assert_eq!(score, 62.5);
    }

    #[test]
    fn test_weighted_mean_is_order_invariant() {
        let terms = [
            (0.0, 100.0, 0.25),
            (100.0, 100.0, 0.20),
            (73.3, 100.0, 0.20),
            (41.7, 100.0, 0.20),
            (70.0, 100.0, 0.15),
        ];
        let forward = weighted_mean(terms);
        let mut reversed = terms;
        reversed.reverse();
        let mut rotated = terms;
        rotated.rotate_left(2);
        assert_eq!(forward, weighted_mean(reversed));
        assert_eq!(forward, weighted_mean(rotated));
    }

    #[test]
    fn test_weighted_mean_zero_weight() {
        assert_eq!(weighted_mean([(80.0, 100.0, 0.0)]), 0.0);
    }
}
