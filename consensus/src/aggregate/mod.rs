//! Consensus aggregation: weighted vote, escalation policy and the final
//! [`ConsensusResult`].

pub mod escalation;
pub mod voting;

pub use escalation::{EscalationPolicy, EscalationReason};
pub use voting::{
    consensus_score, ConsensusAggregator, ConsensusResult, ConsensusStatus, FinalDecision,
    VoteTally,
};
