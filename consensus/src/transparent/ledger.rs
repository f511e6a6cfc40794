//! Editable ledger: the flattened, human-editable view of every evaluator's
//! scoring components, and the re-derivation of evaluator decisions from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::shared::{determine_recommendation, round1, weighted_mean};
use crate::error::{ConsensusError, EngineResult};
use crate::model::{AgentDecision, AgentRole, ScoringComponent, Severity};

/// One evaluator's decision together with the components behind it.
///
/// `decision` is the post-debate decision of the initial evaluation and is
/// never rewritten by edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvaluation {
    pub decision: AgentDecision,
    pub components: Vec<ScoringComponent>,
}

impl AgentEvaluation {
    pub fn role(&self) -> AgentRole {
        self.decision.agent_role
    }
}

/// A ledger entry for one scoring component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableComponent {
    pub id: String,
    pub agent_role: AgentRole,
    pub name: String,
    pub original_score: f64,
    pub current_score: f64,
    pub max_score: f64,
    pub weight: f64,
    pub is_editable: bool,
    pub user_modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_reason: Option<String>,
    pub reasoning: String,
}

impl EditableComponent {
    pub fn from_component(role: AgentRole, component: &ScoringComponent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_role: role,
            name: component.name.clone(),
            original_score: component.score,
            current_score: component.score,
            max_score: component.max_score,
            weight: component.weight,
            is_editable: component.user_editable,
            user_modified: false,
            user_reason: None,
            reasoning: component.reasoning.clone(),
        }
    }

    pub fn delta(&self) -> f64 {
        self.current_score - self.original_score
    }
}

/// A reviewer's override of one component score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEdit {
    pub component_id: String,
    pub new_score: f64,
    pub reason: String,
}

impl UserEdit {
    pub fn new(component_id: impl Into<String>, new_score: f64, reason: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            new_score,
            reason: reason.into(),
        }
    }
}

/// One ledger entry per component, in evaluator then component order.
pub fn flatten(evaluations: &[AgentEvaluation]) -> Vec<EditableComponent> {
    evaluations
        .iter()
        .flat_map(|e| {
            e.components
                .iter()
                .map(move |c| EditableComponent::from_component(e.role(), c))
        })
        .collect()
}

/// Check every edit against the ledger. Returns the ledger index of each
/// edit; nothing is mutated.
pub fn validate_edits(
    ledger: &[EditableComponent],
    edits: &[UserEdit],
) -> EngineResult<Vec<usize>> {
    edits
        .iter()
        .map(|edit| {
            let index = ledger
                .iter()
                .position(|c| c.id == edit.component_id)
                .ok_or_else(|| ConsensusError::UnknownComponent(edit.component_id.clone()))?;
            let entry = &ledger[index];
            if !entry.is_editable {
                return Err(ConsensusError::ComponentNotEditable {
                    component: entry.name.clone(),
                    agent: entry.agent_role,
                });
            }
            if !edit.new_score.is_finite() {
                return Err(ConsensusError::InvalidScore {
                    component_id: edit.component_id.clone(),
                    score: edit.new_score,
                });
            }
            Ok(index)
        })
        .collect()
}

/// Apply already validated edits. Scores are clamped into `[0, max_score]`.
pub fn apply_validated(ledger: &mut [EditableComponent], edits: &[UserEdit], indices: &[usize]) {
    for (edit, &index) in edits.iter().zip(indices) {
        let entry = &mut ledger[index];
        entry.current_score = edit.new_score.clamp(0.0, entry.max_score);
        entry.user_modified = true;
        entry.user_reason = Some(edit.reason.clone());
    }
}

/// The decision an evaluator stands by given the ledger.
///
/// Evaluators without a modified component keep their post-debate decision.
/// Otherwise the score is the weighted mean of the current ledger scores,
/// concerns raised against modified components are treated as reviewed, and
/// the recommendation is re-derived; the debate revision no longer applies.
pub fn rederive(evaluation: &AgentEvaluation, ledger: &[EditableComponent]) -> AgentDecision {
    let role = evaluation.role();
    let entries: Vec<&EditableComponent> = ledger.iter().filter(|c| c.agent_role == role).collect();
    let modified: Vec<&EditableComponent> =
        entries.iter().copied().filter(|c| c.user_modified).collect();
    if modified.is_empty() {
        return evaluation.decision.clone();
    }

    let score = weighted_mean(entries.iter().map(|c| (c.current_score, c.max_score, c.weight)));
    let concerns: Vec<_> = evaluation
        .decision
        .concerns
        .iter()
        .filter(|concern| {
            concern
                .component
                .as_deref()
                .map_or(true, |name| !modified.iter().any(|m| m.name == name))
        })
        .cloned()
        .collect();
    let has_critical = concerns.iter().any(|c| c.severity == Severity::Critical);
    let has_warnings = concerns.iter().any(|c| c.severity == Severity::Warning);
    let (recommendation, confidence) = determine_recommendation(score, has_critical, has_warnings);

    let score_breakdown: BTreeMap<String, f64> = entries
        .iter()
        .map(|c| (c.name.clone(), c.current_score))
        .collect();
    let mut reasoning = evaluation.decision.reasoning.clone();
    reasoning.extend(modified.iter().map(|c| {
        format!(
            "{}: adjusted by reviewer from {:.1} to {:.1} ({})",
            c.name,
            c.original_score,
            round1(c.current_score),
            c.user_reason.as_deref().unwrap_or("no reason given")
        )
    }));

    AgentDecision {
        recommendation,
        confidence,
        score,
        score_breakdown,
        reasoning,
        concerns,
        revised_recommendation: None,
        revised_confidence: None,
        revised_in_round: None,
        ..evaluation.decision.clone()
    }
}
