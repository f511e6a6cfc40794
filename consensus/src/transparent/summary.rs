//! Reviewer-facing summary of a consensus result.

use serde::{Deserialize, Serialize};

use crate::aggregate::{ConsensusResult, FinalDecision};
use crate::model::{Proposal, Severity};

/// Number of pooled reasoning/concern strings shown.
const KEY_POINT_LIMIT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// ≥80 high, ≥60 medium, else low.
    pub fn from_score(confidence: f64) -> Self {
        if confidence >= 80.0 {
            Self::High
        } else if confidence >= 60.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    Approve,
    Reject,
    Modify,
    RequestAlternative,
}

impl QuickAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Reject => "Reject",
            Self::Modify => "Adjust scores",
            Self::RequestAlternative => "Request an alternative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub headline: String,
    pub recommendation: FinalDecision,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// Concerns first (critical before warnings), then reasoning.
    pub key_points: Vec<String>,
    pub quick_actions: Vec<QuickAction>,
}

impl DecisionSummary {
    pub fn derive(proposal: &Proposal, result: &ConsensusResult) -> Self {
        let what = proposal.describe();
        let headline = match result.final_decision {
            FinalDecision::Approve => format!("Recommended: {}", what),
            FinalDecision::Reject => format!("Not recommended: {}", what),
            FinalDecision::Escalate => format!("Needs your judgement: {}", what),
        };

        let decisions = &result.agent_decisions;
        let critical = decisions
            .iter()
            .flat_map(|d| d.concerns.iter())
            .filter(|c| c.severity == Severity::Critical);
        let warnings = decisions
            .iter()
            .flat_map(|d| d.concerns.iter())
            .filter(|c| c.severity == Severity::Warning);
        let reasoning = decisions.iter().flat_map(|d| d.reasoning.iter());

        let mut key_points: Vec<String> = Vec::with_capacity(KEY_POINT_LIMIT);
        for point in critical
            .chain(warnings)
            .map(|c| c.message.as_str())
            .chain(reasoning.map(String::as_str))
        {
            if key_points.len() == KEY_POINT_LIMIT {
                break;
            }
            if !key_points.iter().any(|p| p == point) {
                key_points.push(point.to_string());
            }
        }

        let mut quick_actions = vec![
            QuickAction::Approve,
            QuickAction::Reject,
            QuickAction::Modify,
        ];
        let has_concerns = decisions.iter().any(|d| !d.concerns.is_empty());
        if result.final_decision == FinalDecision::Reject || has_concerns {
            quick_actions.push(QuickAction::RequestAlternative);
        }

        Self {
            headline,
            recommendation: result.final_decision,
            confidence: result.confidence_level,
            confidence_level: ConfidenceLevel::from_score(result.confidence_level),
            key_points,
            quick_actions,
        }
    }
}
