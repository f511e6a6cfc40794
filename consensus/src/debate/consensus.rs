//! Consensus check run after every debate round.
//!
//! Counts heads, not weights: the weighted vote belongs to the aggregator.

use serde::{Deserialize, Serialize};

use crate::model::AgentDecision;

/// Head count of one decision snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusCheck {
    pub approvals: usize,
    pub rejections: usize,
    /// Votes a side needs: `ceil(total × threshold)`.
    pub required: usize,
    /// Every evaluator holds the same recommendation.
    pub collapsed: bool,
}

impl ConsensusCheck {
    pub fn is_reached(&self) -> bool {
        self.collapsed || self.approvals >= self.required || self.rejections >= self.required
    }
}

/// Majority rule for debate rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusProtocol {
    /// Fraction of evaluators a side needs, in (0, 1].
    pub majority_threshold: f64,
}

impl ConsensusProtocol {
    pub fn new(majority_threshold: f64) -> Self {
        Self { majority_threshold }
    }

    /// `ceil(total × threshold)`, tolerant of float noise in the product.
    pub fn required_votes(&self, total: usize) -> usize {
        let raw = total as f64 * self.majority_threshold;
        ((raw - 1e-9).ceil().max(0.0) as usize).max(1)
    }

    pub fn evaluate(&self, decisions: &[AgentDecision]) -> ConsensusCheck {
        let approvals = decisions
            .iter()
            .filter(|d| d.effective_recommendation().is_approval())
            .count();
        let rejections = decisions
            .iter()
            .filter(|d| d.effective_recommendation().is_rejection())
            .count();
        let collapsed = decisions
            .first()
            .map(|first| {
                decisions
                    .iter()
                    .all(|d| d.effective_recommendation() == first.effective_recommendation())
            })
            .unwrap_or(true);
        ConsensusCheck {
            approvals,
            rejections,
            required: self.required_votes(decisions.len()),
            collapsed,
        }
    }
}
