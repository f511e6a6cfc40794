//! Compliance evaluator: working-time law.
//!
//! Every component is tied to a statutory limit and is therefore not
//! editable. Rest violations and overtime beyond a ceiling are critical.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDateTime};

use super::shared::{self, daily_hours, longest_weekly_rest, min_rest_around, weekly_hours};
use super::{merge_assessments, Assessment, DebateResponse, Evaluator, MergeRule};
use crate::config::ComplianceConfig;
use crate::context::{DecisionContext, Placement};
use crate::debate::topic::is_legal_topic;
use crate::model::{
    AgentDecision, AgentRole, Concern, EvidenceKind, EvidenceReference, Impact, Proposal,
    Recommendation, ScoringComponent, Severity, Shift,
};

pub const DAILY_REST: &str = "Daily Rest Period";
pub const WEEKLY_REST: &str = "Weekly Rest Period";
pub const DAILY_HOURS: &str = "Daily Hours";
pub const WEEKLY_HOURS: &str = "Weekly Hours";
pub const OVERTIME: &str = "Overtime";

const SOURCE_REST: &str = "AML § 10-8";
const SOURCE_HOURS: &str = "AML § 10-4";
const SOURCE_OVERTIME: &str = "AML § 10-6";

/// Confidence when echoing a rejection already raised elsewhere.
const CONCUR_CONFIDENCE: f64 = 95.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplianceAgent;

impl ComplianceAgent {
    fn components() -> [ScoringComponent; 5] {
        [
            ScoringComponent::new(DAILY_REST, 0.25, false),
            ScoringComponent::new(WEEKLY_REST, 0.20, false),
            ScoringComponent::new(DAILY_HOURS, 0.20, false),
            ScoringComponent::new(WEEKLY_HOURS, 0.20, false),
            ScoringComponent::new(OVERTIME, 0.15, false),
        ]
    }

    /// Nothing is being added to the roster.
    fn neutral() -> Assessment {
        let mut assessment = Assessment::new(
            Self::components()
                .into_iter()
                .map(|c| c.scored(100.0, "No shifts added; nothing to check"))
                .collect(),
        );
        assessment.note("Proposal adds no shifts");
        assessment
    }

    /// Check one shift placed into `placement.existing`.
    pub fn assess_placement(&self, rules: &ComplianceConfig, placement: &Placement) -> Assessment {
        let shift = &placement.shift;
        let existing = placement.existing.as_slice();
        let [daily_rest, weekly_rest, daily, weekly, overtime] = Self::components();
        let mut assessment = Assessment::default();

        let daily_rest = check_daily_rest(daily_rest, rules, existing, shift, &mut assessment);
        let weekly_rest = check_weekly_rest(weekly_rest, rules, existing, shift, &mut assessment);
        let daily = check_daily_hours(daily, rules, existing, shift, &mut assessment);
        let weekly = check_weekly_hours(weekly, rules, existing, shift, &mut assessment);
        let overtime = check_overtime(overtime, rules, existing, shift, &mut assessment);

        assessment.components = vec![daily_rest, weekly_rest, daily, weekly, overtime];
        assessment
    }
}

fn rule(source: &str, description: String, impact: Impact) -> EvidenceReference {
    EvidenceReference::new(EvidenceKind::Rule, source, description, impact)
}

fn check_daily_rest(
    component: ScoringComponent,
    rules: &ComplianceConfig,
    existing: &[Shift],
    shift: &Shift,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let required = rules.min_daily_rest;
    match min_rest_around(existing, shift) {
        None => component
            .scored(100.0, "No adjacent shifts; daily rest requirement met")
            .with_evidence(vec![rule(
                SOURCE_REST,
                format!("Minimum {}h rest between shifts", required),
                Impact::Neutral,
            )]),
        Some(gap) if gap < required => {
            assessment.concern(Concern::critical(
                DAILY_REST,
                format!(
                    "Daily rest of {:.1}h for {} is below the required {}h",
                    gap, shift.user_id, required
                ),
            ));
            assessment.suggest(format!(
                "Move the shift so at least {}h of rest separate it from adjacent shifts",
                required
            ));
            component
                .scored(
                    0.0,
                    format!(
                        "VIOLATION: only {:.1}h rest between shifts, {}h required",
                        gap, required
                    ),
                )
                .with_evidence(vec![rule(
                    SOURCE_REST,
                    format!("Minimum {}h rest between shifts", required),
                    Impact::Negative,
                )
                .with_value(gap)])
        }
        Some(gap) => component
            .scored(
                100.0,
                format!("{:.1}h rest between shifts meets the {}h minimum", gap, required),
            )
            .with_evidence(vec![rule(
                SOURCE_REST,
                format!("Minimum {}h rest between shifts", required),
                Impact::Positive,
            )
            .with_value(gap)]),
    }
}

fn check_weekly_rest(
    component: ScoringComponent,
    rules: &ComplianceConfig,
    existing: &[Shift],
    shift: &Shift,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let required = rules.min_weekly_rest;
    let longest = longest_weekly_rest(existing, shift);
    let evidence = |impact| {
        vec![rule(
            SOURCE_REST,
            format!("Minimum {}h continuous rest per week", required),
            impact,
        )
        .with_value(shared::round1(longest))]
    };
    if longest >= required {
        component
            .scored(
                100.0,
                format!(
                    "Longest weekly rest of {:.1}h meets the {}h minimum",
                    longest, required
                ),
            )
            .with_evidence(evidence(Impact::Positive))
    } else {
        assessment.concern(Concern::critical(
            WEEKLY_REST,
            format!(
                "Longest weekly rest for {} would be {:.1}h, below the required {}h",
                shift.user_id, longest, required
            ),
        ));
        assessment.suggest(format!(
            "Keep a continuous {}h rest period in the week of {}",
            required,
            shift.date()
        ));
        component
            .scored(
                0.0,
                format!(
                    "VIOLATION: longest weekly rest is {:.1}h, {}h required",
                    longest, required
                ),
            )
            .with_evidence(evidence(Impact::Negative))
    }
}

/// Linear penalty proportional to the overage.
fn overage_score(total: f64, limit: f64) -> f64 {
    if total <= limit {
        100.0
    } else {
        shared::round1((100.0 - (total - limit) / limit * 100.0).max(0.0))
    }
}

fn check_daily_hours(
    component: ScoringComponent,
    rules: &ComplianceConfig,
    existing: &[Shift],
    shift: &Shift,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let limit = rules.max_daily_hours;
    let total = daily_hours(existing, Some(shift), &shift.user_id, shift.date());
    let score = overage_score(total, limit);
    let impact = if total > limit {
        assessment.concern(Concern::warning(
            DAILY_HOURS,
            format!(
                "{} would work {:.1}h on {}, above the {}h daily limit",
                shift.user_id,
                total,
                shift.date(),
                limit
            ),
        ));
        Impact::Negative
    } else {
        Impact::Positive
    };
    component
        .scored(
            score,
            format!("{:.1}h scheduled on the day, limit {}h", total, limit),
        )
        .with_evidence(vec![EvidenceReference::new(
            EvidenceKind::Calculation,
            SOURCE_HOURS,
            format!("Daily hours including this shift, limit {}h", limit),
            impact,
        )
        .with_value(shared::round1(total))])
}

fn check_weekly_hours(
    component: ScoringComponent,
    rules: &ComplianceConfig,
    existing: &[Shift],
    shift: &Shift,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let limit = rules.max_weekly_hours;
    let total = weekly_hours(existing, Some(shift), &shift.user_id, shift.start);
    let score = overage_score(total, limit);
    let impact = if total > limit {
        assessment.concern(Concern::warning(
            WEEKLY_HOURS,
            format!(
                "{} would work {:.1}h in the week, above the {}h weekly limit",
                shift.user_id, total, limit
            ),
        ));
        Impact::Negative
    } else {
        Impact::Positive
    };
    component
        .scored(
            score,
            format!("{:.1}h scheduled in the week, limit {}h", total, limit),
        )
        .with_evidence(vec![EvidenceReference::new(
            EvidenceKind::Calculation,
            SOURCE_HOURS,
            format!("Weekly hours including this shift, limit {}h", limit),
            impact,
        )
        .with_value(shared::round1(total))])
}

/// Overtime per ISO week (keyed by the week's Monday) for the user's shifts,
/// the candidate included.
fn overtime_by_week(
    existing: &[Shift],
    shift: &Shift,
    weekly_cap: f64,
) -> BTreeMap<NaiveDateTime, f64> {
    let mut hours: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    for s in shared::user_shifts(existing, &shift.user_id)
        .into_iter()
        .chain(std::iter::once(shift))
    {
        *hours.entry(shared::week_bounds(s.start).0).or_default() += shared::shift_hours(s);
    }
    hours
        .into_iter()
        .map(|(week, total)| (week, (total - weekly_cap).max(0.0)))
        .collect()
}

fn check_overtime(
    component: ScoringComponent,
    rules: &ComplianceConfig,
    existing: &[Shift],
    shift: &Shift,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let by_week = overtime_by_week(existing, shift, rules.max_weekly_hours);
    let (week_start, _) = shared::week_bounds(shift.start);
    let four_weeks_from = week_start - Duration::weeks(3);
    let week = by_week.get(&week_start).copied().unwrap_or(0.0);
    let four_weeks: f64 = by_week
        .range(four_weeks_from..=week_start)
        .map(|(_, ot)| ot)
        .sum();
    let year: f64 = by_week
        .iter()
        .filter(|(monday, _)| monday.year() == week_start.year())
        .map(|(_, ot)| ot)
        .sum();

    let ceilings = [
        ("weekly", week, rules.max_overtime_per_week),
        ("4-week", four_weeks, rules.max_overtime_per_4_weeks),
        ("yearly", year, rules.max_overtime_per_year),
    ];
    let evidence: Vec<EvidenceReference> = ceilings
        .iter()
        .map(|(label, hours, cap)| {
            let impact = if hours > cap {
                Impact::Negative
            } else {
                Impact::Neutral
            };
            rule(
                SOURCE_OVERTIME,
                format!("{} overtime ceiling {}h", label, cap),
                impact,
            )
            .with_value(shared::round1(*hours))
        })
        .collect();

    if let Some((label, hours, cap)) = ceilings.iter().find(|(_, hours, cap)| hours > cap) {
        assessment.concern(Concern::critical(
            OVERTIME,
            format!(
                "{} overtime of {:.1}h for {} exceeds the {}h ceiling",
                label, hours, shift.user_id, cap
            ),
        ));
        assessment.suggest("Assign the shift to an employee with fewer hours this period");
        return component
            .scored(
                20.0,
                format!("{} overtime of {:.1}h exceeds the {}h ceiling", label, hours, cap),
            )
            .with_evidence(evidence);
    }
    if week > 0.0 {
        assessment.concern(Concern::warning(
            OVERTIME,
            format!(
                "{:.1}h overtime for {} in the week, within the {}h ceiling",
                week, shift.user_id, rules.max_overtime_per_week
            ),
        ));
        return component
            .scored(
                70.0,
                format!(
                    "{:.1}h overtime within the weekly ceiling of {}h",
                    week, rules.max_overtime_per_week
                ),
            )
            .with_evidence(evidence);
    }
    component
        .scored(100.0, "No overtime")
        .with_evidence(evidence)
}

impl Evaluator for ComplianceAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Compliance
    }

    fn assess(&self, ctx: &DecisionContext) -> Assessment {
        let placements = ctx.placements();
        let mut assessment = if placements.is_empty() {
            Self::neutral()
        } else {
            merge_assessments(
                placements
                    .iter()
                    .map(|p| self.assess_placement(&ctx.compliance, p))
                    .collect(),
                MergeRule::Minimum,
            )
        };
        if let Proposal::ScheduleOptimization {
            affects_compliance: true,
            ..
        } = &ctx.proposal
        {
            assessment.concern(Concern::general(
                Severity::Warning,
                "Optimisation is flagged as affecting compliance; review the changed shifts",
            ));
        }
        assessment
    }

    fn respond_to_debate(
        &self,
        _ctx: &DecisionContext,
        own: &AgentDecision,
        others: &[&AgentDecision],
        topic: &str,
    ) -> DebateResponse {
        if is_legal_topic(topic) {
            return DebateResponse::hold(
                "Legal requirements cannot be waived; no exception or override is possible",
            );
        }
        let other_rejects = others
            .iter()
            .any(|d| d.effective_recommendation() == Recommendation::Reject);
        if other_rejects && own.effective_recommendation() == Recommendation::Reject {
            return DebateResponse::change(
                "Agree with the rejection; the compliance findings already require it",
                Recommendation::Reject,
                CONCUR_CONFIDENCE,
            );
        }
        DebateResponse::hold(format!(
            "Compliance assessment stands at {}",
            own.effective_recommendation()
        ))
    }
}
