//! Free-text heuristics the debate relies on.
//!
//! Keyword matching is fragile; it is kept here so callers and tests go
//! through one place.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::AgentDecision;

/// Topics asking for a legal exception.
static LEGAL_TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)exception|override").expect("LEGAL_TOPIC_RE regex should compile")
});

/// Reasoning that reports an uncovered slot.
static COVERAGE_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)gap").expect("COVERAGE_GAP_RE regex should compile"));

pub const ALIGNMENT_TOPIC: &str = "Reaching alignment on the proposed action";

/// What a debate topic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Asks to bend a legal rule.
    Legal,
    General,
}

pub fn classify_topic(topic: &str) -> TopicKind {
    if LEGAL_TOPIC_RE.is_match(topic) {
        TopicKind::Legal
    } else {
        TopicKind::General
    }
}

pub fn is_legal_topic(topic: &str) -> bool {
    classify_topic(topic) == TopicKind::Legal
}

/// Whether any reasoning line of the decision mentions a coverage gap.
pub fn mentions_coverage_gap(decision: &AgentDecision) -> bool {
    decision.reasoning.iter().any(|r| COVERAGE_GAP_RE.is_match(r))
}

/// Topic for a round: the first concern of the first rejecting evaluator
/// when both approvers and rejecters exist, otherwise a generic one.
pub fn pick_topic(decisions: &[AgentDecision]) -> String {
    let has_approvers = decisions
        .iter()
        .any(|d| d.effective_recommendation().is_approval());
    let first_rejecter = decisions
        .iter()
        .find(|d| d.effective_recommendation().is_rejection());
    match first_rejecter {
        Some(rejecter) if has_approvers => rejecter
            .concern_messages()
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} rejects the proposal", rejecter.agent_name)),
        _ => ALIGNMENT_TOPIC.to_string(),
    }
}
