//! Cost evaluator: overtime premiums, budget adherence and shift economics.
//!
//! Overtime and budget are judged over the whole proposal, using the same
//! weekly windows as the compliance checks. Shift efficiency is judged per
//! shift. Cost findings are never critical; a human may always decide to
//! spend the money.

use std::collections::{BTreeMap, BTreeSet};

use super::shared::{self, weekly_overtime};
use super::{merge_assessments, Assessment, Evaluator, MergeRule};
use crate::context::DecisionContext;
use crate::model::{
    AgentRole, Concern, EvidenceKind, EvidenceReference, Impact, LaborBudget, Proposal,
    ScoringComponent, Shift,
};

pub const OVERTIME_COST: &str = "Overtime Cost";
pub const BUDGET_IMPACT: &str = "Budget Impact";
pub const SHIFT_EFFICIENCY: &str = "Shift Efficiency";

/// Score when no budget is on file.
const NO_BUDGET_SCORE: f64 = 75.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostAgent;

impl CostAgent {
    fn components() -> [ScoringComponent; 3] {
        [
            ScoringComponent::new(OVERTIME_COST, 0.45, true),
            ScoringComponent::new(BUDGET_IMPACT, 0.35, true),
            ScoringComponent::new(SHIFT_EFFICIENCY, 0.20, true),
        ]
    }

    fn neutral() -> Assessment {
        let [overtime, budget, efficiency] = Self::components();
        Assessment::new(vec![
            overtime.scored(100.0, "No shifts added; no overtime premium"),
            budget.scored(NO_BUDGET_SCORE, "No shifts added; budget unchanged"),
            efficiency.scored(75.0, "No shifts added"),
        ])
    }

    /// Overtime, budget and efficiency for every shift the proposal adds.
    pub fn assess_proposal(&self, ctx: &DecisionContext) -> Assessment {
        let proposed = ctx.proposal.candidate_shifts();
        let base = ctx.base_shifts();
        let [overtime, budget, efficiency] = Self::components();
        let mut assessment = Assessment::default();

        let introduced = introduced_overtime(ctx, &base, &proposed);
        let overtime_hours: f64 = introduced.values().sum();

        let overtime = score_overtime(
            overtime,
            ctx.labor_budget.as_ref(),
            &introduced,
            &mut assessment,
        );
        let budget = match &ctx.labor_budget {
            Some(b) => score_budget(
                budget,
                b,
                &base,
                &proposed,
                overtime_hours,
                &mut assessment,
            ),
            None => budget
                .scored(NO_BUDGET_SCORE, "No labour budget on file; neutral budget score")
                .with_evidence(vec![EvidenceReference::new(
                    EvidenceKind::Data,
                    "labor_budget",
                    "No budget covers this period",
                    Impact::Neutral,
                )]),
        };

        let per_shift = merge_assessments(
            proposed
                .iter()
                .map(|shift| {
                    let mut part = Assessment::default();
                    let component = score_efficiency(efficiency.clone(), shift, &mut part);
                    part.components.push(component);
                    part
                })
                .collect(),
            MergeRule::Mean,
        );

        assessment.components = vec![overtime, budget];
        assessment.components.extend(per_shift.components);
        for concern in per_shift.concerns {
            assessment.concern(concern);
        }
        assessment
    }
}

/// Overtime hours the proposal adds per user: for every ISO week a proposed
/// shift starts in, overtime with the proposal applied minus overtime
/// without it.
fn introduced_overtime(
    ctx: &DecisionContext,
    base: &[Shift],
    proposed: &[Shift],
) -> BTreeMap<String, f64> {
    let weekly_cap = ctx.compliance.max_weekly_hours;
    let mut projected = base.to_vec();
    projected.extend(proposed.iter().cloned());

    let weeks: BTreeSet<_> = proposed
        .iter()
        .map(|s| (s.user_id.as_str(), shared::week_bounds(s.start).0))
        .collect();

    let mut introduced = BTreeMap::new();
    for (user_id, week_start) in weeks {
        let before = weekly_overtime(base, None, user_id, week_start, weekly_cap);
        let after = weekly_overtime(&projected, None, user_id, week_start, weekly_cap);
        let added = after - before;
        if added > 0.0 {
            *introduced.entry(user_id.to_string()).or_insert(0.0) += added;
        }
    }
    introduced
}

fn score_overtime(
    component: ScoringComponent,
    budget: Option<&LaborBudget>,
    introduced: &BTreeMap<String, f64>,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let hours: f64 = introduced.values().sum();
    if hours <= 0.0 {
        return component.scored(100.0, "No overtime premium introduced").with_evidence(vec![
            EvidenceReference::new(
                EvidenceKind::Calculation,
                "weekly_hours",
                "Proposed shifts stay within regular weekly hours",
                Impact::Positive,
            ),
        ]);
    }

    let mut evidence = vec![EvidenceReference::new(
        EvidenceKind::Calculation,
        "weekly_hours",
        "Overtime hours introduced by the proposal",
        Impact::Negative,
    )
    .with_value(shared::round1(hours))];
    if let Some(budget) = budget {
        let premium = hours * budget.hourly_rate * (budget.overtime_multiplier - 1.0);
        evidence.push(
            EvidenceReference::new(
                EvidenceKind::Calculation,
                "labor_budget",
                format!(
                    "Overtime premium at {}x the hourly rate",
                    budget.overtime_multiplier
                ),
                Impact::Negative,
            )
            .with_value((premium * 100.0).round() / 100.0),
        );
    }
    for (user_id, user_hours) in introduced {
        assessment.concern(Concern::warning(
            OVERTIME_COST,
            format!(
                "Proposal introduces {:.1}h of overtime pay for {}",
                user_hours, user_id
            ),
        ));
    }
    assessment.suggest("Prefer an employee with spare regular hours to avoid overtime pay");
    component
        .scored(
            (100.0 - 15.0 * hours).max(20.0),
            format!("{:.1}h overtime at premium pay", hours),
        )
        .with_evidence(evidence)
}

fn score_budget(
    component: ScoringComponent,
    budget: &LaborBudget,
    base: &[Shift],
    proposed: &[Shift],
    overtime_hours: f64,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let committed: f64 = base
        .iter()
        .filter(|s| budget.covers(s.date()))
        .map(|s| shared::shift_hours(s) * budget.hourly_rate)
        .sum();
    let hours: f64 = proposed.iter().map(shared::shift_hours).sum();
    let proposal_cost = hours * budget.hourly_rate
        + overtime_hours * budget.hourly_rate * (budget.overtime_multiplier - 1.0);
    let projected = committed + proposal_cost;
    let ratio = if budget.amount > 0.0 {
        projected / budget.amount
    } else {
        f64::INFINITY
    };

    let (score, impact, reasoning) = if ratio <= 0.90 {
        (100.0, Impact::Positive, "comfortably under budget")
    } else if ratio <= 1.00 {
        (80.0, Impact::Neutral, "within budget")
    } else if ratio <= 1.10 {
        (50.0, Impact::Negative, "over budget by up to 10%")
    } else {
        (20.0, Impact::Negative, "more than 10% over budget")
    };
    if ratio > 1.0 {
        assessment.concern(Concern::warning(
            BUDGET_IMPACT,
            format!(
                "Projected labour cost {:.0} exceeds the budget of {:.0}",
                projected, budget.amount
            ),
        ));
        assessment.suggest("Trim hours elsewhere in the period or raise the labour budget");
    }

    let percent = if ratio.is_finite() {
        format!("{:.0}%", ratio * 100.0)
    } else {
        "n/a".to_string()
    };
    component
        .scored(
            score,
            format!("Projected spend at {} of budget, {}", percent, reasoning),
        )
        .with_evidence(vec![EvidenceReference::new(
            EvidenceKind::Calculation,
            "labor_budget",
            format!(
                "Committed {:.0} plus the proposal {:.0} against {:.0}",
                committed, proposal_cost, budget.amount
            ),
            impact,
        )
        .with_value((projected * 100.0).round() / 100.0)])
}

fn score_efficiency(
    component: ScoringComponent,
    shift: &Shift,
    assessment: &mut Assessment,
) -> ScoringComponent {
    let hours = shared::shift_hours(shift);
    let evidence = |impact| {
        vec![
            EvidenceReference::new(EvidenceKind::Data, "shift", "Shift length", impact)
                .with_value(shared::round1(hours)),
        ]
    };
    if hours < 4.0 {
        assessment.concern(Concern::warning(
            SHIFT_EFFICIENCY,
            format!("Short {:.1}h shift carries fixed overhead", hours),
        ));
        component
            .scored(
                65.0,
                format!("Short {:.1}h shift is costly per productive hour", hours),
            )
            .with_evidence(evidence(Impact::Negative))
    } else if hours > 10.0 {
        component
            .scored(
                70.0,
                format!("Long {:.1}h shift lowers late-shift productivity", hours),
            )
            .with_evidence(evidence(Impact::Negative))
    } else {
        component
            .scored(90.0, format!("{:.1}h shift length is economical", hours))
            .with_evidence(evidence(Impact::Positive))
    }
}

impl Evaluator for CostAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Cost
    }

    fn assess(&self, ctx: &DecisionContext) -> Assessment {
        let mut assessment = if ctx.proposal.candidate_shifts().is_empty() {
            Self::neutral()
        } else {
            self.assess_proposal(ctx)
        };
        if let Proposal::ScheduleOptimization {
            expected_savings, ..
        } = &ctx.proposal
        {
            if *expected_savings > 0.0 {
                if let Some(efficiency) = assessment
                    .components
                    .iter_mut()
                    .find(|c| c.name == SHIFT_EFFICIENCY)
                {
                    let savings = EvidenceReference::new(
                        EvidenceKind::Calculation,
                        "optimization",
                        "Expected savings",
                        Impact::Positive,
                    )
                    .with_value(*expected_savings);
                    let mut evidence = std::mem::take(&mut efficiency.evidence);
                    evidence.push(savings);
                    *efficiency = efficiency
                        .clone()
                        .scored(100.0, format!("Expected savings of {:.2}", expected_savings))
                        .with_evidence(evidence);
                }
                assessment.note(format!("Optimisation saves {:.2}", expected_savings));
            }
        }
        assessment
    }
}
