//! Weighted voting over evaluator decisions.
//!
//! Each evaluator puts its configured role weight into the approve bucket
//! (`approve`, `approve_with_conditions`), the reject bucket (`reject`) or
//! abstains (`needs_modification`). The consensus score is a separate,
//! unweighted clustering measure of how aligned the evaluators were.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::escalation::{EscalationPolicy, EscalationReason};
use crate::config::ConsensusConfig;
use crate::debate::DebateRound;
use crate::model::{AgentDecision, Recommendation, Severity};

/// Ratio comparisons tolerate float noise in the weight sums.
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    UnanimousApprove,
    UnanimousReject,
    MajorityApprove,
    MajorityReject,
    Deadlock,
    Escalate,
}

impl std::fmt::Display for ConsensusStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnanimousApprove => write!(f, "unanimous_approve"),
            Self::UnanimousReject => write!(f, "unanimous_reject"),
            Self::MajorityApprove => write!(f, "majority_approve"),
            Self::MajorityReject => write!(f, "majority_reject"),
            Self::Deadlock => write!(f, "deadlock"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalDecision {
    Approve,
    Reject,
    Escalate,
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

/// Vote weight per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub approve_weight: f64,
    pub reject_weight: f64,
    pub abstain_weight: f64,
}

impl VoteTally {
    pub fn total_weight(&self) -> f64 {
        self.approve_weight + self.reject_weight + self.abstain_weight
    }

    pub fn approve_ratio(&self) -> f64 {
        ratio(self.approve_weight, self.total_weight())
    }

    pub fn reject_ratio(&self) -> f64 {
        ratio(self.reject_weight, self.total_weight())
    }
}

fn ratio(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total
    } else {
        0.0
    }
}

/// Final outcome of a consensus evaluation.
///
/// Fully derived from `agent_decisions`, `debate_rounds` and the config, so
/// aggregating the same inputs again reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub status: ConsensusStatus,
    pub final_decision: FinalDecision,
    pub votes_for: f64,
    pub votes_against: f64,
    pub abstentions: f64,
    pub agent_decisions: Vec<AgentDecision>,
    pub debate_rounds: Vec<DebateRound>,
    pub total_rounds: u32,
    /// Share of evaluators in the largest recommendation cluster, 0–100.
    pub consensus_score: f64,
    /// Mean effective confidence, 0–100.
    pub confidence_level: f64,
    pub summary: String,
    pub key_reasons: Vec<String>,
    pub remaining_concerns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    pub evaluated_at: NaiveDateTime,
    pub evaluation_duration_ms: u64,
}

impl ConsensusResult {
    pub fn needs_review(&self) -> bool {
        self.final_decision == FinalDecision::Escalate
    }
}

pub struct ConsensusAggregator {
    config: ConsensusConfig,
    policy: EscalationPolicy,
}

impl ConsensusAggregator {
    pub fn new(config: ConsensusConfig) -> Self {
        let policy = EscalationPolicy::from_config(&config);
        Self { config, policy }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Weighted buckets of the effective recommendations.
    pub fn tally(&self, decisions: &[AgentDecision]) -> VoteTally {
        let mut tally = VoteTally::default();
        for decision in decisions {
            let weight = self.config.weight_for(decision.agent_role);
            match decision.effective_recommendation() {
                r if r.is_approval() => tally.approve_weight += weight,
                Recommendation::Reject => tally.reject_weight += weight,
                _ => tally.abstain_weight += weight,
            }
        }
        tally
    }

    /// Vote outcome before the low-confidence override.
    pub fn vote(&self, tally: &VoteTally) -> (ConsensusStatus, FinalDecision) {
        let approve = tally.approve_ratio();
        let reject = tally.reject_ratio();
        if tally.total_weight() > 0.0 {
            if approve + RATIO_EPSILON >= 1.0 {
                return (ConsensusStatus::UnanimousApprove, FinalDecision::Approve);
            }
            if reject + RATIO_EPSILON >= 1.0 {
                return (ConsensusStatus::UnanimousReject, FinalDecision::Reject);
            }
        }
        if !self.config.require_unanimous {
            let threshold = self.config.majority_threshold;
            if tally.approve_weight > 0.0 && approve + RATIO_EPSILON >= threshold {
                return (ConsensusStatus::MajorityApprove, FinalDecision::Approve);
            }
            if tally.reject_weight > 0.0 && reject + RATIO_EPSILON >= threshold {
                return (ConsensusStatus::MajorityReject, FinalDecision::Reject);
            }
        }
        (self.policy.deadlock_status(), FinalDecision::Escalate)
    }

    /// Aggregate the (possibly revised) decisions into one result.
    ///
    /// Decisions are ordered by role first, so the outcome does not depend on
    /// the order evaluators finished in.
    pub fn aggregate(
        &self,
        mut decisions: Vec<AgentDecision>,
        debate_rounds: Vec<DebateRound>,
        evaluated_at: NaiveDateTime,
        evaluation_duration_ms: u64,
    ) -> ConsensusResult {
        decisions.sort_by_key(|d| d.agent_role);

        let tally = self.tally(&decisions);
        let mean_confidence = mean_confidence(&decisions);
        let (status, final_decision) = self.vote(&tally);
        let (status, final_decision, escalation_reason) =
            self.policy.apply(status, final_decision, mean_confidence);
        let confidence_level = crate::agents::shared::round1(mean_confidence);
        let consensus_score = consensus_score(&decisions);

        info!(
            approve_weight = tally.approve_weight,
            reject_weight = tally.reject_weight,
            abstain_weight = tally.abstain_weight,
            status = %status,
            decision = %final_decision,
            consensus_score,
            confidence_level,
            rounds = debate_rounds.len(),
            "consensus aggregated"
        );
        if let Some(reason) = escalation_reason {
            debug!(reason = %reason, "outcome escalated");
        }

        let summary = summarize(
            &tally,
            status,
            final_decision,
            escalation_reason,
            debate_rounds.len(),
        );
        let key_reasons = key_reasons(&decisions, final_decision);
        let remaining_concerns = remaining_concerns(&decisions);
        let conditions = conditions(&decisions, final_decision);

        ConsensusResult {
            status,
            final_decision,
            votes_for: tally.approve_weight,
            votes_against: tally.reject_weight,
            abstentions: tally.abstain_weight,
            agent_decisions: decisions,
            total_rounds: debate_rounds.len() as u32,
            debate_rounds,
            consensus_score,
            confidence_level,
            summary,
            key_reasons,
            remaining_concerns,
            conditions,
            escalation_reason,
            evaluated_at,
            evaluation_duration_ms,
        }
    }
}

fn mean_confidence(decisions: &[AgentDecision]) -> f64 {
    if decisions.is_empty() {
        return 0.0;
    }
    let mut confidences: Vec<f64> = decisions.iter().map(|d| d.effective_confidence()).collect();
    confidences.sort_by(f64::total_cmp);
    confidences.iter().sum::<f64>() / confidences.len() as f64
}

/// 100 when every evaluator holds the same recommendation, otherwise the
/// share of the largest cluster. Ignores vote weights.
pub fn consensus_score(decisions: &[AgentDecision]) -> f64 {
    if decisions.is_empty() {
        return 0.0;
    }
    let mut clusters: BTreeMap<Recommendation, usize> = BTreeMap::new();
    for decision in decisions {
        *clusters.entry(decision.effective_recommendation()).or_default() += 1;
    }
    if clusters.len() == 1 {
        return 100.0;
    }
    let largest = clusters.values().copied().max().unwrap_or(0);
    (largest as f64 / decisions.len() as f64 * 100.0).round()
}

fn summarize(
    tally: &VoteTally,
    status: ConsensusStatus,
    decision: FinalDecision,
    reason: Option<EscalationReason>,
    rounds: usize,
) -> String {
    let total = tally.total_weight();
    let mut summary = match decision {
        FinalDecision::Approve => format!(
            "Approved ({}): {:.1} of {:.1} vote weight in favour",
            status, tally.approve_weight, total
        ),
        FinalDecision::Reject => format!(
            "Rejected ({}): {:.1} of {:.1} vote weight against",
            status, tally.reject_weight, total
        ),
        FinalDecision::Escalate => format!(
            "Escalated for human review ({}): {:.1} for, {:.1} against, {:.1} abstaining",
            reason.map_or_else(|| status.to_string(), |r| r.to_string()),
            tally.approve_weight,
            tally.reject_weight,
            tally.abstain_weight
        ),
    };
    if rounds > 0 {
        summary.push_str(&format!(" after {} debate round(s)", rounds));
    }
    summary
}

/// The reasoning line behind an evaluator's strongest (approving) or
/// weakest (otherwise) component.
fn headline_reason(decision: &AgentDecision, strongest: bool) -> Option<String> {
    let mut components = decision.score_breakdown.iter();
    let pick = if strongest {
        components.max_by(|a, b| a.1.total_cmp(b.1))
    } else {
        components.min_by(|a, b| a.1.total_cmp(b.1))
    };
    pick.and_then(|(name, _)| {
        let prefix = format!("{}:", name);
        decision.reasoning.iter().find(|r| r.starts_with(&prefix))
    })
    .or_else(|| decision.reasoning.first())
    .map(|line| format!("{}: {}", decision.agent_name, line))
}

fn key_reasons(decisions: &[AgentDecision], final_decision: FinalDecision) -> Vec<String> {
    decisions
        .iter()
        .filter(|d| match final_decision {
            FinalDecision::Approve => d.effective_recommendation().is_approval(),
            FinalDecision::Reject => d.effective_recommendation().is_rejection(),
            FinalDecision::Escalate => true,
        })
        .filter_map(|d| headline_reason(d, d.effective_recommendation().is_approval()))
        .collect()
}

fn remaining_concerns(decisions: &[AgentDecision]) -> Vec<String> {
    let mut concerns: Vec<String> = Vec::new();
    for message in decisions.iter().flat_map(|d| d.concern_messages()) {
        if !concerns.iter().any(|c| c == message) {
            concerns.push(message.to_string());
        }
    }
    concerns
}

/// Conditions attached to an approval by evaluators that approved with
/// conditions: their suggestions, or their warnings when they suggested
/// nothing.
fn conditions(decisions: &[AgentDecision], final_decision: FinalDecision) -> Option<Vec<String>> {
    if final_decision != FinalDecision::Approve {
        return None;
    }
    let mut conditions: Vec<String> = Vec::new();
    for decision in decisions
        .iter()
        .filter(|d| d.effective_recommendation() == Recommendation::ApproveWithConditions)
    {
        let items: Vec<&str> = if decision.suggestions.is_empty() {
            decision
                .concerns
                .iter()
                .filter(|c| c.severity == Severity::Warning)
                .map(|c| c.message.as_str())
                .collect()
        } else {
            decision.suggestions.iter().map(String::as_str).collect()
        };
        for item in items {
            if !conditions.iter().any(|c| c == item) {
                conditions.push(item.to_string());
            }
        }
    }
    if conditions.is_empty() {
        None
    } else {
        Some(conditions)
    }
}
