//! Debate and aggregation working together.

mod common;

use std::collections::BTreeMap;

use common::{at, shift, AS_OF};
use roster_consensus::aggregate::{ConsensusStatus, FinalDecision};
use roster_consensus::debate::DebatePhase;
use roster_consensus::model::Concern;
use roster_consensus::{
    AgentDecision, AgentRole, ConsensusAggregator, ConsensusConfig, DebateCoordinator,
    DecisionContext, Proposal, Recommendation,
};

fn decision(role: AgentRole, recommendation: Recommendation, confidence: f64) -> AgentDecision {
    AgentDecision {
        agent_role: role,
        agent_name: role.agent_name().to_string(),
        recommendation,
        confidence,
        score: confidence,
        score_breakdown: BTreeMap::new(),
        reasoning: vec![format!("{} says {}", role, recommendation)],
        concerns: vec![],
        suggestions: vec![],
        evaluated_at: at(AS_OF),
        revised_recommendation: None,
        revised_confidence: None,
        revised_in_round: None,
    }
}

fn ctx() -> DecisionContext {
    DecisionContext::new(
        Proposal::assign(shift("u1", "2025-03-04 09:00", "2025-03-04 15:00")),
        at(AS_OF),
    )
}

fn run(
    config: &ConsensusConfig,
    decisions: Vec<AgentDecision>,
) -> roster_consensus::ConsensusResult {
    let outcome = DebateCoordinator::new(config).run(&ctx(), decisions).unwrap();
    ConsensusAggregator::new(config.clone()).aggregate(
        outcome.decisions,
        outcome.rounds,
        at(AS_OF),
        0,
    )
}

#[test]
fn test_unanimous_approval_needs_no_debate() {
    for enable_cross_evaluation in [true, false] {
        let config = ConsensusConfig {
            enable_cross_evaluation,
            ..Default::default()
        };
        let decisions = AgentRole::ALL
            .iter()
            .map(|r| decision(*r, Recommendation::Approve, 88.0))
            .collect();
        let result = run(&config, decisions);
        assert_eq!(result.status, ConsensusStatus::UnanimousApprove);
        assert_eq!(result.final_decision, FinalDecision::Approve);
        assert_eq!(result.consensus_score, 100.0);
        assert!(result.debate_rounds.is_empty());
        assert_eq!(result.total_rounds, 0);
    }
}

#[test]
fn test_threshold_boundary_resolves_to_majority() {
    // 3.0 of 4.0 approve at a 0.75 threshold.
    let config = ConsensusConfig {
        majority_threshold: 0.75,
        enable_cross_evaluation: false,
        ..Default::default()
    }
    .with_weight(AgentRole::Compliance, 2.0);
    let decisions = vec![
        decision(AgentRole::Compliance, Recommendation::Approve, 85.0),
        decision(AgentRole::Cost, Recommendation::ApproveWithConditions, 70.0),
        decision(AgentRole::EmployeeWelfare, Recommendation::Reject, 80.0),
        decision(AgentRole::Operations, Recommendation::NeedsModification, 70.0),
    ];
    let mut config = config;
    config.agent_weights.insert(AgentRole::Operations, 0.0);
    let result = run(&config, decisions);
    assert_eq!(result.status, ConsensusStatus::MajorityApprove);
    assert_eq!(result.votes_for, 3.0);
    assert_eq!(result.votes_against, 1.0);
}

#[test]
fn test_compliance_rejection_carries_the_debate() {
    let mut compliance = decision(AgentRole::Compliance, Recommendation::Reject, 90.0);
    compliance
        .concerns
        .push(Concern::critical("Daily Rest Period", "Only 2.0h rest between shifts"));
    let decisions = vec![
        compliance,
        decision(AgentRole::Cost, Recommendation::Approve, 90.0),
        decision(AgentRole::EmployeeWelfare, Recommendation::Approve, 85.0),
        decision(AgentRole::Operations, Recommendation::Approve, 90.0),
    ];
    let config = ConsensusConfig::default();
    let outcome = DebateCoordinator::new(&config).run(&ctx(), decisions).unwrap();
    assert_eq!(outcome.session.phase, DebatePhase::Resolved);
    assert_eq!(outcome.rounds[0].topic, "Only 2.0h rest between shifts");

    let result = ConsensusAggregator::new(config).aggregate(
        outcome.decisions,
        outcome.rounds,
        at(AS_OF),
        0,
    );
    assert_eq!(result.status, ConsensusStatus::MajorityReject);
    assert_eq!(result.votes_against, 3.5);
    assert_eq!(result.consensus_score, 75.0);
    // Originals stay retrievable next to the revision.
    let welfare = &result.agent_decisions[2];
    assert_eq!(welfare.recommendation, Recommendation::Approve);
    assert_eq!(welfare.effective_recommendation(), Recommendation::Reject);
}

#[test]
fn test_aggregation_ignores_arrival_order() {
    let decisions = vec![
        decision(AgentRole::Compliance, Recommendation::ApproveWithConditions, 75.0),
        decision(AgentRole::Cost, Recommendation::Reject, 80.0),
        decision(AgentRole::EmployeeWelfare, Recommendation::NeedsModification, 70.0),
        decision(AgentRole::Operations, Recommendation::Approve, 90.0),
    ];
    let aggregator = ConsensusAggregator::new(ConsensusConfig::default());
    let expected = aggregator.aggregate(decisions.clone(), vec![], at(AS_OF), 0);
    for rotation in 1..decisions.len() {
        let mut shuffled = decisions.clone();
        shuffled.rotate_left(rotation);
        assert_eq!(aggregator.aggregate(shuffled, vec![], at(AS_OF), 0), expected);
    }
}

#[test]
fn test_exhausted_debate_escalates() {
    let config = ConsensusConfig {
        max_debate_rounds: 2,
        ..Default::default()
    };
    let decisions = vec![
        decision(AgentRole::Cost, Recommendation::Reject, 80.0),
        decision(AgentRole::Operations, Recommendation::NeedsModification, 70.0),
        decision(AgentRole::EmployeeWelfare, Recommendation::Approve, 82.0),
    ];
    let result = run(&config, decisions);
    assert_eq!(result.total_rounds, 2);
    assert!(result.debate_rounds.iter().all(|r| !r.consensus_reached));
    assert_eq!(result.final_decision, FinalDecision::Escalate);
    assert_eq!(result.status, ConsensusStatus::Escalate);
}
