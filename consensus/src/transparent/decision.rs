//! The transparent decision: a reviewable, editable record of one consensus
//! evaluation.
//!
//! Edits re-enter at the aggregation stage only. No evaluator runs again and
//! the debate history is carried over untouched.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::ledger::{self, AgentEvaluation, EditableComponent, UserEdit};
use super::summary::DecisionSummary;
use crate::aggregate::{ConsensusAggregator, ConsensusResult};
use crate::config::ConsensusConfig;
use crate::error::{ConsensusError, EngineResult};
use crate::model::{AgentDecision, AgentRole, DecisionType, Proposal};

/// Review lifecycle of a transparent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    PendingReview,
    Modified,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(self) -> &'static [ReviewStatus] {
        match self {
            Self::PendingReview | Self::Modified => {
                &[Self::Modified, Self::Approved, Self::Rejected]
            }
            Self::Approved | Self::Rejected => &[],
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingReview => write!(f, "pending_review"),
            Self::Modified => write!(f, "modified"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparentDecision {
    pub id: String,
    pub decision_type: DecisionType,
    pub proposal: Proposal,
    pub evaluations: Vec<AgentEvaluation>,
    pub editable_components: Vec<EditableComponent>,
    pub consensus: ConsensusResult,
    pub summary: DecisionSummary,
    pub status: ReviewStatus,
    /// Config the consensus was aggregated with; recomputation reuses it.
    pub config: ConsensusConfig,
    pub created_at: NaiveDateTime,
}

impl TransparentDecision {
    /// Wrap an initial evaluation. Each component gets a fresh ledger id.
    pub fn new(
        proposal: Proposal,
        evaluations: Vec<AgentEvaluation>,
        consensus: ConsensusResult,
        config: ConsensusConfig,
    ) -> Self {
        let editable_components = ledger::flatten(&evaluations);
        let summary = DecisionSummary::derive(&proposal, &consensus);
        Self {
            id: Uuid::new_v4().to_string(),
            decision_type: proposal.decision_type(),
            created_at: consensus.evaluated_at,
            proposal,
            evaluations,
            editable_components,
            consensus,
            summary,
            status: ReviewStatus::PendingReview,
            config,
        }
    }

    pub fn component(&self, id: &str) -> Option<&EditableComponent> {
        self.editable_components.iter().find(|c| c.id == id)
    }

    /// Ledger entry by evaluator and component name.
    pub fn find_component(&self, role: AgentRole, name: &str) -> Option<&EditableComponent> {
        self.editable_components
            .iter()
            .find(|c| c.agent_role == role && c.name == name)
    }

    pub fn modified_components(&self) -> impl Iterator<Item = &EditableComponent> {
        self.editable_components.iter().filter(|c| c.user_modified)
    }

    /// Apply reviewer edits and recompute the consensus.
    ///
    /// All-or-nothing: every edit is validated before anything changes.
    /// Applying the same edits again yields the same result.
    pub fn apply_user_edits(&mut self, edits: &[UserEdit]) -> EngineResult<&ConsensusResult> {
        self.check_transition(ReviewStatus::Modified)?;
        let indices = ledger::validate_edits(&self.editable_components, edits)?;
        ledger::apply_validated(&mut self.editable_components, edits, &indices);
        for &index in &indices {
            let component = &self.editable_components[index];
            debug!(
                component = %component.id,
                delta = component.delta(),
                reason = component.user_reason.as_deref().unwrap_or_default(),
                "component score overridden"
            );
        }

        self.recompute();
        self.status = ReviewStatus::Modified;
        info!(
            decision_id = %self.id,
            edits = edits.len(),
            modified = self.modified_components().count(),
            decision = %self.consensus.final_decision,
            status = %self.consensus.status,
            "user edits applied"
        );
        Ok(&self.consensus)
    }

    /// Per-evaluator decisions implied by the current ledger.
    pub fn current_decisions(&self) -> Vec<AgentDecision> {
        self.evaluations
            .iter()
            .map(|e| ledger::rederive(e, &self.editable_components))
            .collect()
    }

    fn recompute(&mut self) {
        let aggregator = ConsensusAggregator::new(self.config.clone());
        self.consensus = aggregator.aggregate(
            self.current_decisions(),
            self.consensus.debate_rounds.clone(),
            self.consensus.evaluated_at,
            self.consensus.evaluation_duration_ms,
        );
        self.summary = DecisionSummary::derive(&self.proposal, &self.consensus);
    }

    pub fn approve(&mut self) -> EngineResult<()> {
        self.finish(ReviewStatus::Approved)
    }

    pub fn reject(&mut self) -> EngineResult<()> {
        self.finish(ReviewStatus::Rejected)
    }

    fn finish(&mut self, to: ReviewStatus) -> EngineResult<()> {
        self.check_transition(to)?;
        info!(decision_id = %self.id, from = %self.status, to = %to, "review closed");
        self.status = to;
        Ok(())
    }

    fn check_transition(&self, to: ReviewStatus) -> EngineResult<()> {
        if self.status.valid_transitions().contains(&to) {
            Ok(())
        } else {
            Err(ConsensusError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| r#"{"error":"serialization failed"}"#.to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
