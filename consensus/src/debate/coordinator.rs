//! Debate coordinator: drives rounds of evaluator responses until a
//! majority forms or the round budget runs out.
//!
//! Each round reads one immutable snapshot of decisions and produces the
//! next; rounds are append-only history.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::consensus::{ConsensusCheck, ConsensusProtocol};
use super::state::{DebatePhase, DebateSession};
use super::topic::pick_topic;
use crate::agents::{Agent, Evaluator};
use crate::config::ConsensusConfig;
use crate::context::DecisionContext;
use crate::error::EngineResult;
use crate::model::{AgentDecision, AgentRole, Recommendation};

/// One evaluator's contribution to a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_role: AgentRole,
    pub agent_name: String,
    pub response: String,
    pub changed_position: bool,
    /// Effective recommendation entering the round.
    pub previous_recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_recommendation: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_confidence: Option<f64>,
}

/// One synchronized exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRound {
    pub round_number: u32,
    pub topic: String,
    pub responses: Vec<AgentResponse>,
    pub consensus_reached: bool,
}

impl DebateRound {
    pub fn changed_positions(&self) -> usize {
        self.responses.iter().filter(|r| r.changed_position).count()
    }
}

/// Result of a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateOutcome {
    /// Decisions after the last round, revisions recorded alongside the
    /// originals.
    pub decisions: Vec<AgentDecision>,
    pub rounds: Vec<DebateRound>,
    pub session: DebateSession,
}

impl DebateOutcome {
    pub fn consensus_reached(&self) -> bool {
        self.session.phase == DebatePhase::Resolved
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        format!(
            "[{}] {} rounds, {} position changes",
            self.session.phase,
            self.rounds.len(),
            self.rounds.iter().map(DebateRound::changed_positions).sum::<usize>()
        )
    }
}

/// More than one distinct effective recommendation.
pub fn has_disagreement(decisions: &[AgentDecision]) -> bool {
    decisions
        .first()
        .map(|first| {
            decisions
                .iter()
                .any(|d| d.effective_recommendation() != first.effective_recommendation())
        })
        .unwrap_or(false)
}

pub struct DebateCoordinator {
    max_rounds: u32,
    enable_cross_evaluation: bool,
    protocol: ConsensusProtocol,
}

impl DebateCoordinator {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            max_rounds: config.max_debate_rounds,
            enable_cross_evaluation: config.enable_cross_evaluation,
            protocol: ConsensusProtocol::new(config.majority_threshold),
        }
    }

    /// Run the debate over `decisions`. Each decision is answered by the
    /// evaluator of its role.
    pub fn run(
        &self,
        ctx: &DecisionContext,
        decisions: Vec<AgentDecision>,
    ) -> EngineResult<DebateOutcome> {
        let mut session = DebateSession::new(self.max_rounds);
        let mut rounds = Vec::new();

        if !self.enable_cross_evaluation || !has_disagreement(&decisions) {
            let reason = if self.enable_cross_evaluation {
                "evaluators agree"
            } else {
                "cross-evaluation disabled"
            };
            session.transition(DebatePhase::Skipped, reason)?;
            debug!(reason, "debate skipped");
            return Ok(DebateOutcome {
                decisions,
                rounds,
                session,
            });
        }

        let mut snapshot = decisions;
        loop {
            let round = session.next_round()?;
            let topic = pick_topic(&snapshot);
            let (next, responses) = self.run_round(ctx, &snapshot, &topic, round);
            let check = self.protocol.evaluate(&next);
            let changed = responses.iter().filter(|r| r.changed_position).count();

            info!(
                round,
                topic = %topic,
                changed,
                approvals = check.approvals,
                rejections = check.rejections,
                required = check.required,
                consensus_reached = check.is_reached(),
                "debate round complete"
            );

            rounds.push(DebateRound {
                round_number: round,
                topic,
                responses,
                consensus_reached: check.is_reached(),
            });
            snapshot = next;

            if check.is_reached() {
                session.transition(DebatePhase::Resolved, &describe(&check))?;
                break;
            }
            if !session.has_rounds_remaining() {
                session.transition(DebatePhase::Exhausted, "round budget spent")?;
                break;
            }
        }

        Ok(DebateOutcome {
            decisions: snapshot,
            rounds,
            session,
        })
    }

    /// Every evaluator answers the same pre-round snapshot.
    fn run_round(
        &self,
        ctx: &DecisionContext,
        snapshot: &[AgentDecision],
        topic: &str,
        round: u32,
    ) -> (Vec<AgentDecision>, Vec<AgentResponse>) {
        let mut next = Vec::with_capacity(snapshot.len());
        let mut responses = Vec::with_capacity(snapshot.len());
        for (i, own) in snapshot.iter().enumerate() {
            let others: Vec<&AgentDecision> = snapshot
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, d)| d)
                .collect();
            let agent = Agent::for_role(own.agent_role);
            let reply = agent.respond_to_debate(ctx, own, &others, topic);

            let revised = match (reply.changed_position, reply.new_recommendation) {
                (true, Some(recommendation)) => own.revised(
                    recommendation,
                    reply.new_confidence.unwrap_or_else(|| own.effective_confidence()),
                    round,
                ),
                _ => own.clone(),
            };
            responses.push(AgentResponse {
                agent_role: own.agent_role,
                agent_name: own.agent_name.clone(),
                response: reply.response,
                changed_position: reply.changed_position,
                previous_recommendation: own.effective_recommendation(),
                new_recommendation: reply.new_recommendation,
                new_confidence: reply.new_confidence,
            });
            next.push(revised);
        }
        (next, responses)
    }
}

fn describe(check: &ConsensusCheck) -> String {
    if check.collapsed {
        "all evaluators agree".to_string()
    } else if check.approvals >= check.required {
        format!("{} of {} needed approve", check.approvals, check.required)
    } else {
        format!("{} of {} needed reject", check.rejections, check.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Concern, Proposal, Shift};
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn ctx() -> DecisionContext {
        DecisionContext::new(
            Proposal::assign(Shift::new("u1", at("2025-03-03 08:00"), at("2025-03-03 16:00"))),
            at("2025-02-01 09:00"),
        )
    }

    fn decision(role: AgentRole, recommendation: Recommendation, score: f64) -> AgentDecision {
        AgentDecision {
            agent_role: role,
            agent_name: role.agent_name().to_string(),
            recommendation,
            confidence: 80.0,
            score,
            score_breakdown: BTreeMap::new(),
            reasoning: vec![],
            concerns: vec![],
            suggestions: vec![],
            evaluated_at: at("2025-02-01 09:00"),
            revised_recommendation: None,
            revised_confidence: None,
            revised_in_round: None,
        }
    }

    #[test]
    fn test_agreement_skips_debate() {
        let decisions: Vec<_> = AgentRole::ALL
            .iter()
            .map(|r| decision(*r, Recommendation::Approve, 90.0))
            .collect();
        let outcome = DebateCoordinator::new(&ConsensusConfig::default())
            .run(&ctx(), decisions)
            .unwrap();
        assert!(outcome.rounds.is_empty());
        assert_eq!(outcome.session.phase, DebatePhase::Skipped);
    }

    #[test]
    fn test_disabled_cross_evaluation_skips_debate() {
        let decisions = vec![
            decision(AgentRole::Compliance, Recommendation::Reject, 0.0),
            decision(AgentRole::Cost, Recommendation::Approve, 90.0),
        ];
        let config = ConsensusConfig {
            enable_cross_evaluation: false,
            ..Default::default()
        };
        let outcome = DebateCoordinator::new(&config).run(&ctx(), decisions).unwrap();
        assert!(outcome.rounds.is_empty());
    }

    #[test]
    fn test_compliance_rejection_pulls_welfare_and_operations() {
        let mut compliance = decision(AgentRole::Compliance, Recommendation::Reject, 20.0);
        compliance.concerns.push(Concern::critical("Daily Rest Period", "Daily rest too short"));
        let decisions = vec![
            compliance,
            decision(AgentRole::Cost, Recommendation::Approve, 90.0),
            decision(AgentRole::EmployeeWelfare, Recommendation::Approve, 85.0),
            decision(AgentRole::Operations, Recommendation::Approve, 90.0),
        ];
        let outcome = DebateCoordinator::new(&ConsensusConfig::default())
            .run(&ctx(), decisions)
            .unwrap();

        assert_eq!(outcome.rounds.len(), 1);
        let round = &outcome.rounds[0];
        assert_eq!(round.topic, "Daily rest too short");
        assert!(round.consensus_reached);

        let welfare = &outcome.decisions[2];
        assert_eq!(welfare.recommendation, Recommendation::Approve);
        assert_eq!(welfare.effective_recommendation(), Recommendation::Reject);
        assert_eq!(welfare.effective_confidence(), 95.0);
        assert_eq!(welfare.revised_in_round, Some(1));
        assert_eq!(outcome.decisions[3].effective_confidence(), 90.0);
        // cost never moves
        assert!(!outcome.decisions[1].is_revised());
        assert!(outcome.consensus_reached());
    }

    #[test]
    fn test_round_reads_pre_round_snapshot() {
        // Compliance only echoes a rejection that already exists entering the round.
        let decisions = vec![
            decision(AgentRole::Compliance, Recommendation::Reject, 20.0),
            decision(AgentRole::Cost, Recommendation::Approve, 90.0),
            decision(AgentRole::EmployeeWelfare, Recommendation::Approve, 85.0),
        ];
        let outcome = DebateCoordinator::new(&ConsensusConfig::default())
            .run(&ctx(), decisions)
            .unwrap();
        let compliance_reply = &outcome.rounds[0].responses[0];
        assert!(!compliance_reply.changed_position);
    }

    #[test]
    fn test_exhausts_without_consensus() {
        let decisions = vec![
            decision(AgentRole::Cost, Recommendation::Approve, 90.0),
            decision(AgentRole::Cost, Recommendation::NeedsModification, 50.0),
        ];
        let config = ConsensusConfig {
            max_debate_rounds: 2,
            majority_threshold: 1.0,
            ..Default::default()
        };
        let outcome = DebateCoordinator::new(&config).run(&ctx(), decisions).unwrap();
        assert_eq!(outcome.rounds.len(), 2);
        assert!(outcome.rounds.iter().all(|r| !r.consensus_reached));
        assert_eq!(outcome.session.phase, DebatePhase::Exhausted);
        assert_eq!(outcome.rounds[1].round_number, 2);
    }

    #[test]
    fn test_disagreement_detection() {
        assert!(!has_disagreement(&[]));
        assert!(has_disagreement(&[
            decision(AgentRole::Cost, Recommendation::Approve, 90.0),
            decision(AgentRole::Operations, Recommendation::ApproveWithConditions, 70.0),
        ]));
    }
}
