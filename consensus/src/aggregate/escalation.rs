//! Escalation policy: when a vote outcome is handed to a human instead of
//! being decided automatically.
//!
//! Deterministic, no collaborators.

use serde::{Deserialize, Serialize};

use super::voting::{ConsensusStatus, FinalDecision};
use crate::config::ConsensusConfig;

/// Why an outcome was escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Neither side reached the majority threshold.
    Deadlock,
    /// Mean evaluator confidence fell below the configured floor.
    LowConfidence,
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deadlock => write!(f, "deadlock"),
            Self::LowConfidence => write!(f, "low_confidence"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub escalate_on_deadlock: bool,
    pub escalate_on_low_confidence: bool,
    pub minimum_confidence_threshold: f64,
}

impl EscalationPolicy {
    pub fn from_config(config: &ConsensusConfig) -> Self {
        Self {
            escalate_on_deadlock: config.escalate_on_deadlock,
            escalate_on_low_confidence: config.escalate_on_low_confidence,
            minimum_confidence_threshold: config.minimum_confidence_threshold,
        }
    }

    /// Status reported when no side carries the vote. The decision is
    /// `escalate` either way.
    pub fn deadlock_status(&self) -> ConsensusStatus {
        if self.escalate_on_deadlock {
            ConsensusStatus::Escalate
        } else {
            ConsensusStatus::Deadlock
        }
    }

    /// Apply the low-confidence override on top of a vote outcome. Always
    /// runs last and wins over any vote.
    pub fn apply(
        &self,
        status: ConsensusStatus,
        decision: FinalDecision,
        mean_confidence: f64,
    ) -> (ConsensusStatus, FinalDecision, Option<EscalationReason>) {
        if self.escalate_on_low_confidence && mean_confidence < self.minimum_confidence_threshold
        {
            return (
                ConsensusStatus::Escalate,
                FinalDecision::Escalate,
                Some(EscalationReason::LowConfidence),
            );
        }
        let reason = match status {
            ConsensusStatus::Deadlock | ConsensusStatus::Escalate => {
                Some(EscalationReason::Deadlock)
            }
            _ => None,
        };
        (status, decision, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlock_status_follows_flag() {
        let mut config = ConsensusConfig::default();
        assert_eq!(
            EscalationPolicy::from_config(&config).deadlock_status(),
            ConsensusStatus::Escalate
        );
        config.escalate_on_deadlock = false;
        assert_eq!(
            EscalationPolicy::from_config(&config).deadlock_status(),
            ConsensusStatus::Deadlock
        );
    }

    #[test]
    fn test_low_confidence_overrides_unanimity() {
        let policy = EscalationPolicy::from_config(&ConsensusConfig::default());
        let (status, decision, reason) =
            policy.apply(ConsensusStatus::UnanimousApprove, FinalDecision::Approve, 45.0);
        assert_eq!(status, ConsensusStatus::Escalate);
        assert_eq!(decision, FinalDecision::Escalate);
        assert_eq!(reason, Some(EscalationReason::LowConfidence));
    }

    #[test]
    fn test_low_confidence_ignored_when_disabled() {
        let config = ConsensusConfig {
            escalate_on_low_confidence: false,
            ..Default::default()
        };
        let policy = EscalationPolicy::from_config(&config);
        let (status, decision, reason) =
            policy.apply(ConsensusStatus::MajorityReject, FinalDecision::Reject, 10.0);
        assert_eq!(status, ConsensusStatus::MajorityReject);
        assert_eq!(decision, FinalDecision::Reject);
        assert!(reason.is_none());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let policy = EscalationPolicy::from_config(&ConsensusConfig::default());
        let (status, _, _) =
            policy.apply(ConsensusStatus::MajorityApprove, FinalDecision::Approve, 50.0);
        assert_eq!(status, ConsensusStatus::MajorityApprove);
    }
}
