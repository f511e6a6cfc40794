//! Operations evaluator: coverage, skill match, efficiency and continuity.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::shared;
use super::{find_role, merge_assessments, Assessment, DebateResponse, Evaluator, MergeRule};
use crate::context::{DecisionContext, Placement};
use crate::debate::topic::mentions_coverage_gap;
use crate::model::{
    AgentDecision, AgentRole, Concern, CoverageGoal, EvidenceKind, EvidenceReference, Impact,
    Proposal, Recommendation, ScoringComponent, Shift,
};

pub const COVERAGE: &str = "Coverage";
pub const SKILL_MATCH: &str = "Skill Match";
pub const EFFICIENCY: &str = "Efficiency";
pub const CONTINUITY: &str = "Continuity";

/// Peak windows as (start hour, end hour).
const PEAK_WINDOWS: [(u32, u32); 2] = [(11, 14), (17, 20)];
const PEAK_HEADCOUNT: usize = 3;
const OFF_PEAK_HEADCOUNT: usize = 2;
const BUSINESS_OPEN: f64 = 8.0;
const BUSINESS_CLOSE: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationsAgent;

impl OperationsAgent {
    fn components() -> [ScoringComponent; 4] {
        [
            ScoringComponent::new(COVERAGE, 0.35, true),
            ScoringComponent::new(SKILL_MATCH, 0.25, true),
            ScoringComponent::new(EFFICIENCY, 0.25, true),
            ScoringComponent::new(CONTINUITY, 0.15, true),
        ]
    }

    fn neutral() -> Assessment {
        let [coverage, skill, efficiency, continuity] = Self::components();
        Assessment::new(vec![
            coverage.scored(80.0, "No shifts added; coverage unchanged"),
            skill.scored(75.0, "No shifts added"),
            efficiency.scored(80.0, "No shifts added"),
            continuity.scored(100.0, "No shifts added"),
        ])
    }

    pub fn assess_placement(&self, placement: &Placement) -> Assessment {
        let [coverage, skill, efficiency, continuity] = Self::components();
        let mut assessment = Assessment::default();
        let coverage = score_coverage(coverage, placement, &mut assessment);
        let skill = score_skill(skill, placement);
        let efficiency = score_efficiency(efficiency, placement);
        let continuity = score_continuity(continuity, placement, &mut assessment);
        assessment.components = vec![coverage, skill, efficiency, continuity];
        assessment
    }
}

fn at_hour(shift: &Shift, hour: u32) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    shift.date().and_time(time)
}

/// Whether the shift touches a peak window on its start day.
pub fn is_peak(shift: &Shift) -> bool {
    PEAK_WINDOWS
        .iter()
        .any(|&(from, to)| shift.start < at_hour(shift, to) && at_hour(shift, from) < shift.end)
}

fn score_coverage(
    component: ScoringComponent,
    placement: &Placement,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let shift = &placement.shift;
    let overlapping = placement
        .existing
        .iter()
        .filter(|s| s.overlaps(shift))
        .count();
    if overlapping == 0 {
        return component
            .scored(100.0, "Shift fills a coverage gap")
            .with_evidence(vec![EvidenceReference::new(
                EvidenceKind::Data,
                "roster",
                "No other staff scheduled in this window",
                Impact::Positive,
            )
            .with_value(0)]);
    }

    let headcount = overlapping + 1;
    let peak = is_peak(shift);
    let recommended = if peak { PEAK_HEADCOUNT } else { OFF_PEAK_HEADCOUNT };
    let ratio = headcount as f64 / recommended as f64;
    let window = if peak { "peak" } else { "off-peak" };
    let (score, reasoning, impact) = if ratio <= 1.0 {
        (
            90.0,
            format!("Brings {} staffing to {} of {} recommended", window, headcount, recommended),
            Impact::Positive,
        )
    } else if ratio <= 1.5 {
        (
            80.0,
            format!("{} staff against {} recommended for {} hours", headcount, recommended, window),
            Impact::Neutral,
        )
    } else {
        assessment.concern(Concern::warning(
            COVERAGE,
            format!(
                "Window would be overstaffed: {} staff, {} recommended",
                headcount, recommended
            ),
        ));
        assessment.suggest("Move the shift to a window with fewer staff");
        (
            60.0,
            format!("Overstaffed: {} staff against {} recommended", headcount, recommended),
            Impact::Negative,
        )
    };
    component.scored(score, reasoning).with_evidence(vec![EvidenceReference::new(
        EvidenceKind::Calculation,
        "roster",
        format!("Headcount versus {} recommendation", window),
        impact,
    )
    .with_value((ratio * 100.0).round() / 100.0)])
}

fn score_skill(component: ScoringComponent, placement: &Placement) -> ScoringComponent {
    let shift = &placement.shift;
    let similar = shared::user_shifts(&placement.existing, &shift.user_id)
        .into_iter()
        .filter(|s| (s.start_hour() - shift.start_hour()).abs() <= 2.0)
        .count();
    let (score, reasoning, impact) = if similar >= 3 {
        (90.0, format!("{} similar shifts worked before", similar), Impact::Positive)
    } else if similar > 0 {
        (75.0, format!("{} similar shift(s) worked before", similar), Impact::Neutral)
    } else {
        (60.0, "No history of shifts at this time of day".to_string(), Impact::Negative)
    };
    component.scored(score, reasoning).with_evidence(vec![EvidenceReference::new(
        EvidenceKind::Pattern,
        "roster",
        "Previous shifts starting within 2h of this start time",
        impact,
    )
    .with_value(similar as u64)])
}

fn score_efficiency(component: ScoringComponent, placement: &Placement) -> ScoringComponent {
    let shift = &placement.shift;
    let hours = shared::shift_hours(shift);
    let mut score: f64 = 80.0;
    let mut notes = vec![format!("{:.1}h shift", hours)];
    let mut evidence = Vec::new();

    if hours < 4.0 {
        score -= 20.0;
        notes.push("too short to be productive".to_string());
        evidence.push(
            EvidenceReference::new(EvidenceKind::Data, "shift", "Short shift", Impact::Negative)
                .with_value(shared::round1(hours)),
        );
    } else if hours > 8.0 {
        score -= 10.0;
        notes.push("long shift, fatigue risk".to_string());
        evidence.push(
            EvidenceReference::new(EvidenceKind::Risk, "shift", "Long shift", Impact::Negative)
                .with_value(shared::round1(hours)),
        );
    }
    let handoff = placement.existing.iter().any(|s| {
        let lead = shift.start - s.end;
        lead >= Duration::zero() && lead < Duration::hours(1)
    });
    if handoff {
        score += 10.0;
        notes.push("smooth handoff from the previous shift".to_string());
        evidence.push(EvidenceReference::new(
            EvidenceKind::Pattern,
            "roster",
            "Previous shift ends less than 1h before this one starts",
            Impact::Positive,
        ));
    }
    component
        .scored(score.min(100.0), notes.join("; "))
        .with_evidence(evidence)
}

fn within_business_hours(hour: f64) -> bool {
    hour > BUSINESS_OPEN && hour < BUSINESS_CLOSE
}

fn hour_of(at: NaiveDateTime) -> f64 {
    use chrono::Timelike;
    f64::from(at.hour()) + f64::from(at.minute()) / 60.0
}

fn score_continuity(
    component: ScoringComponent,
    placement: &Placement,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let shift = &placement.shift;
    let window = Duration::hours(2);
    let mut score: f64 = 100.0;
    let mut notes = Vec::new();

    if within_business_hours(hour_of(shift.start)) {
        let covered = placement
            .existing
            .iter()
            .any(|s| s.start < shift.start && s.end >= shift.start - window);
        if !covered {
            score -= 15.0;
            notes.push("no adjacent coverage within 2h before the start".to_string());
        }
    }
    if within_business_hours(hour_of(shift.end)) {
        let covered = placement
            .existing
            .iter()
            .any(|s| s.end > shift.end && s.start <= shift.end + window);
        if !covered {
            score -= 15.0;
            notes.push("no adjacent coverage within 2h after the end".to_string());
        }
    }
    if notes.is_empty() {
        notes.push("adjacent coverage on both sides".to_string());
    } else if score < 80.0 {
        assessment.suggest("Line up a colleague to hand over before and after this shift");
    }
    let impact = if score < 100.0 {
        Impact::Negative
    } else {
        Impact::Positive
    };
    component
        .scored(score, notes.join("; "))
        .with_evidence(vec![EvidenceReference::new(
            EvidenceKind::Pattern,
            "roster",
            "Adjacent coverage during business hours 08:00-20:00",
            impact,
        )])
}

/// Fraction of coverage goals whose minimum staffing is met.
fn score_goals(
    component: &mut ScoringComponent,
    goals: &[CoverageGoal],
    shifts: &[Shift],
    assessment: &mut Assessment,
) {
    let mut met = 0usize;
    let mut evidence = Vec::new();
    for goal in goals {
        let staff: BTreeSet<&str> = shifts
            .iter()
            .filter(|s| s.start < goal.end && goal.start < s.end)
            .map(|s| s.user_id.as_str())
            .collect();
        let label = goal
            .label
            .clone()
            .unwrap_or_else(|| goal.start.format("%a %H:%M").to_string());
        let ok = staff.len() >= goal.min_staff as usize;
        if ok {
            met += 1;
        } else {
            assessment.concern(Concern::warning(
                COVERAGE,
                format!(
                    "Coverage goal {} has {} of {} staff",
                    label,
                    staff.len(),
                    goal.min_staff
                ),
            ));
        }
        evidence.push(
            EvidenceReference::new(
                EvidenceKind::Calculation,
                "coverage_goals",
                format!("{}: minimum {} staff", label, goal.min_staff),
                if ok { Impact::Positive } else { Impact::Negative },
            )
            .with_value(staff.len() as u64),
        );
    }
    let score = met as f64 / goals.len() as f64 * 100.0;
    let missed = goals.len() - met;
    let reasoning = if missed == 0 {
        format!("All {} coverage goals met", goals.len())
    } else {
        format!("{} coverage gap(s): {} of {} goals met", missed, met, goals.len())
    };
    *component = component
        .clone()
        .scored(shared::round1(score), reasoning)
        .with_evidence(evidence);
}

impl Evaluator for OperationsAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Operations
    }

    fn assess(&self, ctx: &DecisionContext) -> Assessment {
        let placements = ctx.placements();
        let mut assessment = if placements.is_empty() {
            Self::neutral()
        } else {
            merge_assessments(
                placements.iter().map(|p| self.assess_placement(p)).collect(),
                MergeRule::Mean,
            )
        };

        if let Proposal::ScheduleCreation { coverage_goals, .. } = &ctx.proposal {
            if !coverage_goals.is_empty() {
                let projected = ctx.projected_shifts();
                // per-assignment coverage findings are replaced by the goal check
                assessment
                    .concerns
                    .retain(|c| c.component.as_deref() != Some(COVERAGE));
                let mut coverage = assessment.components.remove(0);
                score_goals(&mut coverage, coverage_goals, &projected, &mut assessment);
                assessment.components.insert(0, coverage);
            }
        }
        assessment
    }

    fn respond_to_debate(
        &self,
        _ctx: &DecisionContext,
        own: &AgentDecision,
        others: &[&AgentDecision],
        _topic: &str,
    ) -> DebateResponse {
        let current = own.effective_recommendation();
        if let Some(compliance) = find_role(others, AgentRole::Compliance) {
            if compliance.effective_recommendation() == Recommendation::Reject {
                if current == Recommendation::Reject && own.effective_confidence() >= 90.0 {
                    return DebateResponse::hold("Already rejecting alongside compliance");
                }
                return DebateResponse::change(
                    "Operations cannot rely on a non-compliant shift; aligning with rejection",
                    Recommendation::Reject,
                    90.0,
                );
            }
        }

        let welfare = find_role(others, AgentRole::EmployeeWelfare);
        if mentions_coverage_gap(own) {
            let opposed = [welfare, find_role(others, AgentRole::Cost)]
                .into_iter()
                .flatten()
                .any(|d| d.effective_recommendation() == Recommendation::Reject);
            if opposed {
                return DebateResponse::hold(
                    "This shift closes a coverage gap; rejecting it leaves the slot unstaffed",
                );
            }
        } else if let Some(welfare) = welfare.filter(|w| w.score < 50.0) {
            let yielded = welfare.effective_recommendation();
            if yielded != current {
                return DebateResponse::change(
                    format!(
                        "No coverage need and welfare at {:.1}; deferring to employee welfare",
                        welfare.score
                    ),
                    yielded,
                    75.0,
                );
            }
        }
        DebateResponse::hold(format!("Operations position stays at {}", current))
    }
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

    fn component<'a>(assessment: &'a Assessment, name: &str) -> &'a ScoringComponent {
        assessment.components.iter().find(|c| c.name == name).unwrap()
    }

    fn assess(existing: Vec<Shift>, candidate: Shift) -> Assessment {
        let ctx = DecisionContext::new(Proposal::assign(candidate), at("2025-02-01 09:00"))
            .with_shifts(existing);
        OperationsAgent.assess(&ctx)
    }

    #[test]
    fn test_empty_roster_fills_gap() {
        let assessment = assess(vec![], shift("u1", "2025-03-03 11:00", "2025-03-03 15:00"));
        let coverage = component(&assessment, COVERAGE);
        assert_eq!(coverage.score, 100.0);
        assert!(coverage.reasoning.contains("fills a coverage gap"));
    }

    #[test]
    fn test_peak_headcount_bands() {
        let colleagues = vec![shift("u2", "2025-03-03 10:00", "2025-03-03 15:00")];
        // peak: 2 of 3
        let assessment = assess(
            colleagues.clone(),
            shift("u1", "2025-03-03 11:00", "2025-03-03 15:00"),
        );
        assert_eq!(component(&assessment, COVERAGE).score, 90.0);

        // off-peak: 2 of 2
        let assessment = assess(
            vec![shift("u2", "2025-03-03 06:00", "2025-03-03 10:00")],
            shift("u1", "2025-03-03 07:00", "2025-03-03 10:30"),
        );
        assert_eq!(component(&assessment, COVERAGE).score, 90.0);

        // off-peak: 4 of 2
        let crowd: Vec<Shift> = ["u2", "u3", "u4"]
            .iter()
            .map(|u| shift(u, "2025-03-03 06:00", "2025-03-03 10:00"))
            .collect();
        let assessment = assess(crowd, shift("u1", "2025-03-03 07:00", "2025-03-03 10:30"));
        assert_eq!(component(&assessment, COVERAGE).score, 60.0);
    }

    #[test]
    fn test_skill_match_from_history() {
        let history: Vec<Shift> = (3..=5)
            .map(|d| {
                shift(
                    "u1",
                    &format!("2025-02-{:02} 09:00", d),
                    &format!("2025-02-{:02} 17:00", d),
                )
            })
            .collect();
        let assessment = assess(history, shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"));
        assert_eq!(component(&assessment, SKILL_MATCH).score, 90.0);

        let assessment = assess(vec![], shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"));
        assert_eq!(component(&assessment, SKILL_MATCH).score, 60.0);
    }

    #[test]
    fn test_efficiency_handoff_and_length() {
        let previous = vec![shift("u2", "2025-03-03 06:00", "2025-03-03 11:30")];
        let assessment = assess(previous, shift("u1", "2025-03-03 12:00", "2025-03-03 22:00"));
        // 80 - 10 (long) + 10 (handoff)
        assert_eq!(component(&assessment, EFFICIENCY).score, 80.0);

        let assessment = assess(vec![], shift("u1", "2025-03-03 12:00", "2025-03-03 15:00"));
        assert_eq!(component(&assessment, EFFICIENCY).score, 60.0);
    }

    #[test]
    fn test_continuity_business_hours() {
        // 08:00-20:00 exactly: both edges sit on the business-hour boundary
        let assessment = assess(vec![], shift("u1", "2025-03-03 08:00", "2025-03-03 20:00"));
        assert_eq!(component(&assessment, CONTINUITY).score, 100.0);

        let assessment = assess(vec![], shift("u1", "2025-03-03 10:00", "2025-03-03 14:00"));
        assert_eq!(component(&assessment, CONTINUITY).score, 70.0);
    }

    #[test]
    fn test_coverage_goals_fraction() {
        let proposal = Proposal::ScheduleCreation {
            assignments: vec![
                shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"),
                shift("u2", "2025-03-03 08:00", "2025-03-03 16:00"),
            ],
            coverage_goals: vec![
                CoverageGoal {
                    start: at("2025-03-03 09:00"),
                    end: at("2025-03-03 12:00"),
                    min_staff: 2,
                    label: Some("morning".into()),
                },
                CoverageGoal {
                    start: at("2025-03-03 17:00"),
                    end: at("2025-03-03 20:00"),
                    min_staff: 1,
                    label: Some("evening".into()),
                },
            ],
        };
        let ctx = DecisionContext::new(proposal, at("2025-02-01 09:00"));
        let assessment = OperationsAgent.assess(&ctx);
        let coverage = component(&assessment, COVERAGE);
        assert_eq!(coverage.score, 50.0);
        assert!(coverage.reasoning.contains("coverage gap"));
        assert_eq!(assessment.concerns.len(), 1);
    }

    #[test]
    fn test_yields_to_low_welfare_without_gap() {
        let colleagues = vec![shift("u2", "2025-03-03 10:00", "2025-03-03 15:00")];
        let ctx = DecisionContext::new(
            Proposal::assign(shift("u1", "2025-03-03 11:00", "2025-03-03 15:00")),
            at("2025-02-01 09:00"),
        )
        .with_shifts(colleagues);
        let own = OperationsAgent.evaluate(&ctx);
        assert!(!mentions_coverage_gap(&own));

        let mut welfare = own.clone();
        welfare.agent_role = AgentRole::EmployeeWelfare;
        welfare.score = 40.0;
        welfare.recommendation = Recommendation::NeedsModification;
        let response = OperationsAgent.respond_to_debate(&ctx, &own, &[&welfare], "topic");
        assert!(response.changed_position);
        assert_eq!(response.new_recommendation, Some(Recommendation::NeedsModification));
        assert_eq!(response.new_confidence, Some(75.0));
    }

    #[test]
    fn test_gap_pushes_back_on_cost_rejection() {
        let ctx = DecisionContext::new(
            Proposal::assign(shift("u1", "2025-03-03 11:00", "2025-03-03 15:00")),
            at("2025-02-01 09:00"),
        );
        let own = OperationsAgent.evaluate(&ctx);
        let mut cost = own.clone();
        cost.agent_role = AgentRole::Cost;
        cost.recommendation = Recommendation::Reject;
        let response = OperationsAgent.respond_to_debate(&ctx, &own, &[&cost], "topic");
        assert!(!response.changed_position);
        assert!(response.response.contains("coverage gap"));
    }
}
