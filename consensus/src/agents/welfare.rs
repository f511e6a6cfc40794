//! Employee-welfare evaluator: preferences, fairness, work-life balance and
//! schedule stability.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use super::shared::{self, week_bounds, weekly_hours};
use super::{find_role, merge_assessments, Assessment, DebateResponse, Evaluator, MergeRule};
use crate::context::{DecisionContext, Placement};
use crate::model::{
    AgentDecision, AgentRole, Concern, EmployeePreference, EvidenceKind, EvidenceReference, Impact,
    Recommendation, ScoringComponent, Shift, ShiftPeriod,
};

pub const PREFERENCE_MATCH: &str = "Preference Match";
pub const WORKLOAD_FAIRNESS: &str = "Workload Fairness";
pub const WORK_LIFE_BALANCE: &str = "Work-Life Balance";
pub const SCHEDULE_STABILITY: &str = "Schedule Stability";

const BASE_PREFERENCE_SCORE: f64 = 70.0;
/// Shifts the start-time pattern is compared against.
const PATTERN_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WelfareAgent;

impl WelfareAgent {
    fn components() -> [ScoringComponent; 4] {
        [
            ScoringComponent::new(PREFERENCE_MATCH, 0.30, true),
            ScoringComponent::new(WORKLOAD_FAIRNESS, 0.25, true),
            ScoringComponent::new(WORK_LIFE_BALANCE, 0.25, true),
            ScoringComponent::new(SCHEDULE_STABILITY, 0.20, true),
        ]
    }

    fn neutral() -> Assessment {
        let [preference, fairness, balance, stability] = Self::components();
        Assessment::new(vec![
            preference.scored(BASE_PREFERENCE_SCORE, "No shifts added"),
            fairness.scored(85.0, "No shifts added"),
            balance.scored(100.0, "No shifts added"),
            stability.scored(100.0, "No shifts added"),
        ])
    }

    pub fn assess_placement(&self, ctx: &DecisionContext, placement: &Placement) -> Assessment {
        let [preference, fairness, balance, stability] = Self::components();
        let mut assessment = Assessment::default();
        let preference = score_preference(
            preference,
            ctx.preference_for(&placement.shift.user_id),
            placement,
            &mut assessment,
        );
        let fairness = score_fairness(fairness, placement, &mut assessment);
        let balance = score_balance(balance, placement, &mut assessment);
        let stability = score_stability(stability, ctx, placement, &mut assessment);
        assessment.components = vec![preference, fairness, balance, stability];
        assessment
    }
}

fn preference(description: impl Into<String>, impact: Impact) -> EvidenceReference {
    EvidenceReference::new(EvidenceKind::Preference, "employee_preferences", description, impact)
}

fn score_preference(
    component: ScoringComponent,
    pref: Option<&EmployeePreference>,
    placement: &Placement,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let shift = &placement.shift;
    let Some(pref) = pref else {
        return component
            .scored(BASE_PREFERENCE_SCORE, "No preference record; neutral score")
            .with_evidence(vec![preference("No preferences on file", Impact::Neutral)]);
    };

    let mut score = BASE_PREFERENCE_SCORE;
    let mut evidence = Vec::new();
    let mut notes = vec![format!("base {}", BASE_PREFERENCE_SCORE)];

    if pref.preferred_days.contains(&shift.weekday()) {
        score += 15.0;
        evidence.push(
            preference(format!("Preferred Day: {}", shift.weekday()), Impact::Positive)
                .with_value(15),
        );
        notes.push("preferred day +15".to_string());
    }
    if pref.avoid_days.contains(&shift.weekday()) {
        score -= 30.0;
        evidence.push(
            preference(format!("Avoided Day: {}", shift.weekday()), Impact::Negative)
                .with_value(-30),
        );
        notes.push("avoided day -30".to_string());
    }
    if pref.has_period_affinity() {
        let period = ShiftPeriod::of(shift);
        if pref.likes_period(period) {
            score += 10.0;
            evidence.push(
                preference(format!("Preferred Time of Day: {}", period), Impact::Positive)
                    .with_value(10),
            );
            notes.push(format!("{} shift matches affinity +10", period));
        } else {
            score -= 10.0;
            evidence.push(
                preference(
                    format!("Non-preferred Time of Day: {}", period),
                    Impact::Negative,
                )
                .with_value(-10),
            );
            notes.push(format!("{} shift misses affinity -10", period));
        }
    }
    if let Some(max) = pref.max_hours_per_week {
        let total = weekly_hours(&placement.existing, Some(shift), &shift.user_id, shift.start);
        if total > max {
            score -= 20.0;
            evidence.push(
                preference(format!("Weekly Hours Preference: at most {}h", max), Impact::Negative)
                    .with_value(shared::round1(total)),
            );
            notes.push(format!("{:.1}h exceeds preferred maximum {}h -20", total, max));
            assessment.concern(Concern::warning(
                PREFERENCE_MATCH,
                format!(
                    "{} would work {:.1}h, above their preferred maximum of {}h",
                    shift.user_id, total, max
                ),
            ));
        }
    }
    if let Some(unavailable) = pref.unavailable.as_ref().filter(|u| u.covers(shift)) {
        score = 0.0;
        let reason = if unavailable.reason.is_empty() {
            "no reason given"
        } else {
            unavailable.reason.as_str()
        };
        evidence.push(preference(format!("Unavailable: {}", reason), Impact::Negative));
        notes.push("declared unavailable".to_string());
        assessment.concern(Concern::critical(
            PREFERENCE_MATCH,
            format!(
                "Shift falls inside {}'s declared unavailability ({})",
                shift.user_id, reason
            ),
        ));
        assessment.suggest(format!("Choose an employee who is available on {}", shift.date()));
    }
    if score < 50.0 {
        assessment.suggest(format!("Offer the shift to someone who prefers {}s", shift.weekday()));
    }

    let score = score.clamp(0.0, 100.0);
    component
        .scored(score, format!("Preference alignment {}: {}", score, notes.join(", ")))
        .with_evidence(evidence)
}

fn score_fairness(
    component: ScoringComponent,
    placement: &Placement,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let shift = &placement.shift;
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for s in placement.existing.iter().chain(std::iter::once(shift)) {
        *totals.entry(s.user_id.as_str()).or_default() += shared::shift_hours(s);
    }
    let own = totals.get(shift.user_id.as_str()).copied().unwrap_or(0.0);
    let n = totals.len() as f64;
    let mean = totals.values().sum::<f64>() / n;
    let variance = totals.values().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt();

    let data = EvidenceReference::new(
        EvidenceKind::Data,
        "roster",
        format!("Team mean {:.1}h across {} employees", mean, totals.len()),
        Impact::Neutral,
    )
    .with_value(shared::round1(own));

    if totals.len() < 2 || sd <= f64::EPSILON {
        return component
            .scored(85.0, "Workload is even across the team")
            .with_evidence(vec![data]);
    }

    let z = (own - mean) / sd;
    let (score, reasoning, impact) = if z > 2.0 {
        assessment.concern(Concern::warning(
            WORKLOAD_FAIRNESS,
            format!(
                "{} would carry {:.1}h, far above the team mean of {:.1}h",
                shift.user_id, own, mean
            ),
        ));
        assessment.suggest("Spread hours to colleagues with lighter schedules");
        (30.0, format!("{:.1}σ above the team mean", z), Impact::Negative)
    } else if z > 1.0 {
        (60.0, format!("{:.1}σ above the team mean", z), Impact::Negative)
    } else if z < -1.0 {
        (90.0, format!("{:.1}σ below the team mean; evens out workload", -z), Impact::Positive)
    } else {
        (85.0, "Within one standard deviation of the team mean".to_string(), Impact::Neutral)
    };
    component.scored(score, reasoning).with_evidence(vec![
        data,
        EvidenceReference::new(
            EvidenceKind::Calculation,
            "roster",
            "Standard deviations from the team mean",
            impact,
        )
        .with_value((z * 100.0).round() / 100.0),
    ])
}

/// Length of the run of consecutive working days that contains `day`.
fn consecutive_days(worked: &BTreeSet<NaiveDate>, day: NaiveDate) -> usize {
    let mut run = 1;
    let mut cursor = day;
    while let Some(prev) = cursor.pred_opt().filter(|d| worked.contains(d)) {
        run += 1;
        cursor = prev;
    }
    cursor = day;
    while let Some(next) = cursor.succ_opt().filter(|d| worked.contains(d)) {
        run += 1;
        cursor = next;
    }
    run
}

fn score_balance(
    component: ScoringComponent,
    placement: &Placement,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let shift = &placement.shift;
    let own: Vec<&Shift> = shared::user_shifts(&placement.existing, &shift.user_id);
    let mut score: f64 = 100.0;
    let mut notes = Vec::new();
    let mut evidence = Vec::new();

    let worked: BTreeSet<NaiveDate> = own
        .iter()
        .map(|s| s.date())
        .chain(std::iter::once(shift.date()))
        .collect();
    let run = consecutive_days(&worked, shift.date());
    if run >= 6 {
        score -= 30.0;
        notes.push(format!("{} consecutive work days", run));
        assessment.concern(Concern::warning(
            WORK_LIFE_BALANCE,
            format!("{} would work {} days in a row", shift.user_id, run),
        ));
        assessment.suggest("Insert a day off to break up the run of working days");
    } else if run == 5 {
        score -= 15.0;
        notes.push("5 consecutive work days".to_string());
    } else {
        notes.push(format!("{} consecutive work day(s) keeps a healthy rhythm", run));
    }
    evidence.push(
        EvidenceReference::new(
            EvidenceKind::Pattern,
            "roster",
            "Consecutive working days",
            if run >= 5 { Impact::Negative } else { Impact::Positive },
        )
        .with_value(run as u64),
    );

    if shift.is_weekend() {
        let (from, to) = week_bounds(shift.start);
        let weekend_shifts = own
            .iter()
            .filter(|s| s.is_weekend() && s.start >= from && s.start < to)
            .count()
            + 1;
        if weekend_shifts >= 3 {
            score -= 20.0;
            notes.push(format!("weekend shift #{} this week", weekend_shifts));
            evidence.push(
                EvidenceReference::new(
                    EvidenceKind::Pattern,
                    "roster",
                    "Weekend shifts in the week",
                    Impact::Negative,
                )
                .with_value(weekend_shifts as u64),
            );
        }
    }

    let swing = own.iter().any(|s| {
        (s.start - shift.start).num_minutes().abs() <= Duration::days(2).num_minutes()
            && (s.start_hour() - shift.start_hour()).abs() > 8.0
    });
    if swing {
        score -= 15.0;
        notes.push("start time swings more than 8h within 2 days".to_string());
        evidence.push(EvidenceReference::new(
            EvidenceKind::Pattern,
            "roster",
            "Irregular start times",
            Impact::Negative,
        ));
    }

    let score = score.max(0.0);
    component
        .scored(score, notes.join("; "))
        .with_evidence(evidence)
}

fn score_stability(
    component: ScoringComponent,
    ctx: &DecisionContext,
    placement: &Placement,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let shift = &placement.shift;
    let mut score: f64 = 100.0;
    let mut notes = Vec::new();
    let mut evidence = Vec::new();

    let deadline = f64::from(ctx.compliance.publish_deadline_days);
    let notice_days = (shift.start - ctx.as_of).num_minutes() as f64 / (24.0 * 60.0);
    if deadline > 0.0 && notice_days < deadline {
        let penalty = (deadline - notice_days.max(0.0)) / deadline * 40.0;
        score -= penalty;
        notes.push(format!(
            "{:.1} days notice, {} expected",
            notice_days.max(0.0),
            deadline
        ));
        evidence.push(
            EvidenceReference::new(
                EvidenceKind::Rule,
                "publish_deadline",
                format!("Schedules are published {} days ahead", deadline),
                Impact::Negative,
            )
            .with_value(shared::round1(notice_days)),
        );
        assessment.concern(Concern::warning(
            SCHEDULE_STABILITY,
            format!("Short notice for {}: {:.1} days", shift.user_id, notice_days.max(0.0)),
        ));
    } else {
        notes.push(format!("{:.0} days notice", notice_days));
    }

    let mut history: Vec<&Shift> = shared::user_shifts(&placement.existing, &shift.user_id)
        .into_iter()
        .filter(|s| s.start < shift.start)
        .collect();
    history.sort_by(|a, b| b.start.cmp(&a.start));
    history.truncate(PATTERN_WINDOW);
    if !history.is_empty() {
        let usual = history.iter().map(|s| s.start_hour()).sum::<f64>() / history.len() as f64;
        let deviation = (shift.start_hour() - usual).abs();
        let penalty = if deviation > 4.0 {
            20.0
        } else if deviation > 2.0 {
            10.0
        } else {
            0.0
        };
        if penalty > 0.0 {
            score -= penalty;
            notes.push(format!("starts {:.1}h away from the usual pattern", deviation));
            evidence.push(
                EvidenceReference::new(
                    EvidenceKind::Pattern,
                    "roster",
                    format!("Start hour versus the last {} shifts", history.len()),
                    Impact::Negative,
                )
                .with_value(shared::round1(deviation)),
            );
        } else {
            notes.push("matches the usual start time".to_string());
        }
    }

    if placement.replaces_existing {
        score -= 10.0;
        notes.push("changes an existing assignment".to_string());
    }

    component
        .scored(shared::round1(score.max(0.0)), notes.join("; "))
        .with_evidence(evidence)
}

impl Evaluator for WelfareAgent {
    fn role(&self) -> AgentRole {
        AgentRole::EmployeeWelfare
    }

    fn assess(&self, ctx: &DecisionContext) -> Assessment {
        let placements = ctx.placements();
        if placements.is_empty() {
            return Self::neutral();
        }
        merge_assessments(
            placements
                .iter()
                .map(|p| self.assess_placement(ctx, p))
                .collect(),
            MergeRule::Mean,
        )
    }

    fn respond_to_debate(
        &self,
        ctx: &DecisionContext,
        own: &AgentDecision,
        others: &[&AgentDecision],
        _topic: &str,
    ) -> DebateResponse {
        let current = own.effective_recommendation();
        if let Some(compliance) = find_role(others, AgentRole::Compliance) {
            if compliance.effective_recommendation() == Recommendation::Reject {
                if current == Recommendation::Reject && own.effective_confidence() >= 95.0 {
                    return DebateResponse::hold("Already rejecting alongside compliance");
                }
                return DebateResponse::change(
                    "Legal violations harm employees; aligning with the compliance rejection",
                    Recommendation::Reject,
                    95.0,
                );
            }
        }
        if let Some(operations) = find_role(others, AgentRole::Operations) {
            let strongly_approves = operations.effective_recommendation() == Recommendation::Approve
                && operations.effective_confidence() > 85.0;
            if strongly_approves && current != Recommendation::ApproveWithConditions {
                let rescored = self.assess(ctx).score();
                if rescored >= 60.0 {
                    return DebateResponse::change(
                        format!(
                            "Strong operational need, welfare at {:.1}; approving with conditions",
                            rescored
                        ),
                        Recommendation::ApproveWithConditions,
                        70.0,
                    );
                }
            }
        }
        DebateResponse::hold(format!("Employee welfare position stays at {}", current))
    }
}
