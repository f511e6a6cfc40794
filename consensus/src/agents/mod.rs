//! Evaluators: four independent perspectives on a proposal.
//!
//! Every evaluator is a pure function of the [`DecisionContext`]. The set is
//! closed ([`Agent`]) because vote weights are keyed by role.

pub mod compliance;
pub mod cost;
pub mod operations;
pub mod shared;
pub mod welfare;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::context::DecisionContext;
use crate::model::{
    AgentDecision, AgentRole, Concern, Recommendation, ScoringComponent, Severity,
};

pub use compliance::ComplianceAgent;
pub use cost::CostAgent;
pub use operations::OperationsAgent;
pub use shared::determine_recommendation;
pub use welfare::WelfareAgent;

/// Everything an evaluator concluded before the score is turned into a
/// recommendation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    pub components: Vec<ScoringComponent>,
    pub concerns: Vec<Concern>,
    pub reasoning: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Assessment {
    pub fn new(components: Vec<ScoringComponent>) -> Self {
        Self {
            components,
            ..Default::default()
        }
    }

    pub fn concern(&mut self, concern: Concern) {
        if !self.concerns.contains(&concern) {
            self.concerns.push(concern);
        }
    }

    pub fn suggest(&mut self, suggestion: impl Into<String>) {
        let suggestion = suggestion.into();
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
    }

    pub fn note(&mut self, reasoning: impl Into<String>) {
        let reasoning = reasoning.into();
        if !self.reasoning.contains(&reasoning) {
            self.reasoning.push(reasoning);
        }
    }

    pub fn score(&self) -> f64 {
        shared::weighted_score(&self.components)
    }
}

/// How per-shift assessments of a composite proposal are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Worst case is binding.
    Minimum,
    Mean,
}

/// Combine per-placement assessments component by component.
///
/// All parts must come from the same evaluator, so components line up by
/// position.
pub fn merge_assessments(parts: Vec<Assessment>, rule: MergeRule) -> Assessment {
    let mut parts = parts.into_iter();
    let Some(first) = parts.next() else {
        return Assessment::default();
    };
    let rest: Vec<Assessment> = parts.collect();
    if rest.is_empty() {
        return first;
    }
    let count = rest.len() + 1;

    let mut merged = Assessment::new(Vec::with_capacity(first.components.len()));
    for (i, head) in first.components.iter().enumerate() {
        let column: Vec<&ScoringComponent> = std::iter::once(head)
            .chain(rest.iter().filter_map(|p| p.components.get(i)))
            .collect();
        let worst = column
            .iter()
            .copied()
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap_or(head);
        let (score, reasoning) = match rule {
            MergeRule::Minimum => (worst.score, worst.reasoning.clone()),
            MergeRule::Mean => {
                let mean = column.iter().map(|c| c.score).sum::<f64>() / column.len() as f64;
                let reasoning = if column.iter().all(|c| c.score == head.score) {
                    head.reasoning.clone()
                } else {
                    format!(
                        "Mean of {} shifts ({:.1}); lowest: {}",
                        column.len(),
                        mean,
                        worst.reasoning
                    )
                };
                (shared::round1(mean), reasoning)
            }
        };
        let mut evidence = Vec::new();
        for item in column.iter().flat_map(|c| c.evidence.iter()) {
            if !evidence.contains(item) {
                evidence.push(item.clone());
            }
        }
        merged.components.push(
            ScoringComponent::new(head.name.clone(), head.weight, head.user_editable)
                .scored(score, reasoning)
                .with_evidence(evidence),
        );
    }

    for part in std::iter::once(first).chain(rest) {
        for concern in part.concerns {
            merged.concern(concern);
        }
        for suggestion in part.suggestions {
            merged.suggest(suggestion);
        }
        for reasoning in part.reasoning {
            merged.note(reasoning);
        }
    }
    tracing::trace!(parts = count, "merged assessments");
    merged
}

/// Build the decision an assessment implies.
pub fn decide(
    role: AgentRole,
    assessment: Assessment,
    evaluated_at: NaiveDateTime,
) -> AgentDecision {
    let score = assessment.score();
    let has_critical = assessment
        .concerns
        .iter()
        .any(|c| c.severity == Severity::Critical);
    let has_warnings = assessment
        .concerns
        .iter()
        .any(|c| c.severity == Severity::Warning);
    let (recommendation, confidence) = determine_recommendation(score, has_critical, has_warnings);

    let score_breakdown: BTreeMap<String, f64> = assessment
        .components
        .iter()
        .map(|c| (c.name.clone(), c.score))
        .collect();
    let mut reasoning: Vec<String> = assessment
        .components
        .iter()
        .filter(|c| !c.reasoning.is_empty())
        .map(|c| format!("{}: {}", c.name, c.reasoning))
        .collect();
    reasoning.extend(assessment.reasoning);

    AgentDecision {
        agent_role: role,
        agent_name: role.agent_name().to_string(),
        recommendation,
        confidence,
        score,
        score_breakdown,
        reasoning,
        concerns: assessment.concerns,
        suggestions: assessment.suggestions,
        evaluated_at,
        revised_recommendation: None,
        revised_confidence: None,
        revised_in_round: None,
    }
}

/// An evaluator's reply in a debate round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateResponse {
    pub response: String,
    pub changed_position: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_recommendation: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_confidence: Option<f64>,
}

impl DebateResponse {
    pub fn hold(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            changed_position: false,
            new_recommendation: None,
            new_confidence: None,
        }
    }

    pub fn change(
        response: impl Into<String>,
        recommendation: Recommendation,
        confidence: f64,
    ) -> Self {
        Self {
            response: response.into(),
            changed_position: true,
            new_recommendation: Some(recommendation),
            new_confidence: Some(confidence),
        }
    }
}

/// One evaluator perspective.
pub trait Evaluator: Send + Sync {
    fn role(&self) -> AgentRole;

    fn name(&self) -> &'static str {
        self.role().agent_name()
    }

    /// Score the proposal. Pure and deterministic.
    fn assess(&self, ctx: &DecisionContext) -> Assessment;

    /// The weighted sub-scores behind [`Evaluator::evaluate`].
    fn scoring_components(&self, ctx: &DecisionContext) -> Vec<ScoringComponent> {
        self.assess(ctx).components
    }

    fn evaluate(&self, ctx: &DecisionContext) -> AgentDecision {
        decide(self.role(), self.assess(ctx), ctx.as_of)
    }

    /// React to the other evaluators' current decisions. Holds by default.
    fn respond_to_debate(
        &self,
        _ctx: &DecisionContext,
        own: &AgentDecision,
        _others: &[&AgentDecision],
        _topic: &str,
    ) -> DebateResponse {
        DebateResponse::hold(format!(
            "{} maintains {}",
            self.name(),
            own.effective_recommendation()
        ))
    }
}

/// The closed set of evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agent {
    Compliance(ComplianceAgent),
    Cost(CostAgent),
    Welfare(WelfareAgent),
    Operations(OperationsAgent),
}

impl Agent {
    pub fn for_role(role: AgentRole) -> Self {
        match role {
            AgentRole::Compliance => Self::Compliance(ComplianceAgent),
            AgentRole::Cost => Self::Cost(CostAgent),
            AgentRole::EmployeeWelfare => Self::Welfare(WelfareAgent),
            AgentRole::Operations => Self::Operations(OperationsAgent),
        }
    }

    /// One evaluator per role, in role order.
    pub fn panel() -> Vec<Agent> {
        AgentRole::ALL.iter().copied().map(Self::for_role).collect()
    }

    fn inner(&self) -> &dyn Evaluator {
        match self {
            Self::Compliance(agent) => agent,
            Self::Cost(agent) => agent,
            Self::Welfare(agent) => agent,
            Self::Operations(agent) => agent,
        }
    }
}

impl Evaluator for Agent {
    fn role(&self) -> AgentRole {
        self.inner().role()
    }

    fn assess(&self, ctx: &DecisionContext) -> Assessment {
        self.inner().assess(ctx)
    }

    fn respond_to_debate(
        &self,
        ctx: &DecisionContext,
        own: &AgentDecision,
        others: &[&AgentDecision],
        topic: &str,
    ) -> DebateResponse {
        self.inner().respond_to_debate(ctx, own, others, topic)
    }
}

/// The first decision in `others` with the given role.
pub(crate) fn find_role<'a>(
    others: &[&'a AgentDecision],
    role: AgentRole,
) -> Option<&'a AgentDecision> {
    others.iter().copied().find(|d| d.agent_role == role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvidenceKind, EvidenceReference, Impact};

    fn part(scores: [f64; 2]) -> Assessment {
        Assessment::new(vec![
            ScoringComponent::new("A", 0.5, true).scored(scores[0], format!("a={}", scores[0])),
            ScoringComponent::new("B", 0.5, true).scored(scores[1], format!("b={}", scores[1])),
        ])
    }

    #[test]
    fn test_merge_minimum_keeps_worst_reasoning() {
        let merged = merge_assessments(
            vec![part([100.0, 40.0]), part([0.0, 90.0])],
            MergeRule::Minimum,
        );
        assert_eq!(merged.components[0].score, 0.0);
        assert_eq!(merged.components[0].reasoning, "a=0");
        assert_eq!(merged.components[1].score, 40.0);
    }

    #[test]
    fn test_merge_mean() {
        let merged = merge_assessments(
            vec![part([100.0, 40.0]), part([50.0, 40.0])],
            MergeRule::Mean,
        );
        assert_eq!(merged.components[0].score, 75.0);
        assert!(merged.components[0].reasoning.contains("lowest: a=50"));
        assert_eq!(merged.components[1].reasoning, "b=40");
    }

    #[test]
    fn test_merge_dedups_concerns_and_evidence() {
        let evidence = EvidenceReference::new(EvidenceKind::Data, "roster", "x", Impact::Neutral);
        let mut a = part([80.0, 80.0]);
        a.components[0].evidence.push(evidence.clone());
        a.concern(Concern::warning("A", "same"));
        let b = a.clone();
        let merged = merge_assessments(vec![a, b], MergeRule::Mean);
        assert_eq!(merged.concerns.len(), 1);
        assert_eq!(merged.components[0].evidence.len(), 1);
    }

    #[test]
    fn test_decide_uses_recommendation_policy() {
        let mut assessment = part([100.0, 100.0]);
        let at = NaiveDateTime::parse_from_str("2025-03-01 09:00", "%Y-%m-%d %H:%M").unwrap();
        let decision = decide(AgentRole::Operations, assessment.clone(), at);
        assert_eq!(decision.recommendation, Recommendation::Approve);
        assert_eq!(decision.confidence, 100.0);
        assert_eq!(decision.score_breakdown["A"], 100.0);
        assert_eq!(decision.evaluated_at, at);

        assessment.concern(Concern::critical("A", "broken"));
        let decision = decide(AgentRole::Operations, assessment, at);
        assert_eq!(decision.recommendation, Recommendation::Reject);
        assert_eq!(decision.confidence, 90.0);
    }

    #[test]
    fn test_panel_is_one_per_role() {
        let roles: Vec<AgentRole> = Agent::panel().iter().map(|a| a.role()).collect();
        assert_eq!(roles, AgentRole::ALL.to_vec());
        assert_eq!(Agent::for_role(AgentRole::Cost).name(), "Cost Controller");
    }
}
