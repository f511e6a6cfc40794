//! Consensus engine: orchestrates context building, the evaluator fan-out,
//! debate, aggregation and auditing.
//!
//! ```text
//! ConsensusRequest
//!   → ContextBuilder (only I/O)
//!   → 4 evaluators in parallel over Arc<DecisionContext>
//!   → DebateCoordinator (when they disagree)
//!   → ConsensusAggregator
//!   → ConsensusResponse | TransparentDecision
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::agents::{Agent, Evaluator};
use crate::aggregate::{ConsensusAggregator, ConsensusResult, ConsensusStatus, FinalDecision};
use crate::audit::{AuditRecord, AuditSink};
use crate::config::{ConsensusConfig, EngineConfig};
use crate::context::{ContextBuilder, DecisionContext, RosterStore};
use crate::debate::DebateCoordinator;
use crate::error::{ConsensusError, EngineResult};
use crate::model::{AgentRole, DecisionType, Proposal};
use crate::transparent::{AgentEvaluation, TransparentDecision};

/// A request for a consensus decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRequest {
    pub decision_type: DecisionType,
    pub proposal: Proposal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster_id: Option<String>,
    /// Overrides the engine's consensus config for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConsensusConfig>,
    pub requested_by: String,
    /// Evaluation instant; the wall clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDateTime>,
}

impl ConsensusRequest {
    pub fn new(proposal: Proposal, requested_by: impl Into<String>) -> Self {
        Self {
            decision_type: proposal.decision_type(),
            proposal,
            roster_id: None,
            config: None,
            requested_by: requested_by.into(),
            as_of: None,
        }
    }

    pub fn for_roster(mut self, roster_id: impl Into<String>) -> Self {
        self.roster_id = Some(roster_id.into());
        self
    }

    pub fn with_config(mut self, config: ConsensusConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn at(mut self, as_of: NaiveDateTime) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.proposal.validate()?;
        let actual = self.proposal.decision_type();
        if self.decision_type != actual {
            return Err(ConsensusError::InvalidProposal(format!(
                "decision type {} does not match a {} proposal",
                self.decision_type, actual
            )));
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        Ok(())
    }
}

/// Quick-path answer. Never an `Err`: failures arrive as `success: false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ConsensusResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ConsensusResponse {
    fn ok(result: ConsensusResult, audit_id: Option<String>) -> Self {
        Self {
            success: true,
            result: Some(result),
            audit_id,
            error: None,
            error_code: None,
        }
    }

    fn failed(err: &ConsensusError) -> Self {
        Self {
            success: false,
            result: None,
            audit_id: None,
            error: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
        }
    }
}

/// Outcome of one proposal in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub decision_type: DecisionType,
    pub status: ConsensusStatus,
    pub final_decision: FinalDecision,
    pub consensus_score: f64,
    pub confidence_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
}

/// A proposal that failed; excluded from the decision counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub code: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_proposals: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Escalations.
    pub needs_review: usize,
    pub outcomes: Vec<BatchOutcome>,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        format!(
            "{} proposals: {} approved, {} rejected, {} need review, {} failed",
            self.total_proposals,
            self.approved,
            self.rejected,
            self.needs_review,
            self.failures.len()
        )
    }
}

/// Everything one deliberation produced.
struct Deliberation {
    evaluations: Vec<AgentEvaluation>,
    result: ConsensusResult,
    config: ConsensusConfig,
}

pub struct ConsensusEngine {
    config: EngineConfig,
    builder: ContextBuilder,
    audit: Option<Arc<dyn AuditSink>>,
}

impl ConsensusEngine {
    pub fn new(store: Arc<dyn RosterStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let builder = ContextBuilder::new(store, config.compliance.clone());
        Ok(Self {
            config,
            builder,
            audit: None,
        })
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Purge audit records past their retention horizon. Without a sink
    /// there is nothing to purge.
    pub async fn purge_expired_audit(&self, now: NaiveDateTime) -> EngineResult<usize> {
        let Some(sink) = self.audit.as_ref() else {
            return Ok(0);
        };
        let dropped = sink.purge_expired(now).await?;
        info!(dropped, now = %now, "audit retention enforced");
        Ok(dropped)
    }

    /// Quick path: the consensus result, audited. Errors become
    /// `success: false`.
    pub async fn get_consensus(&self, request: ConsensusRequest) -> ConsensusResponse {
        match self.evaluate(&request).await {
            Ok((result, audit_id)) => ConsensusResponse::ok(result, audit_id),
            Err(err) => {
                warn!(
                    decision_type = %request.decision_type,
                    code = err.code(),
                    error = %err,
                    "consensus request failed"
                );
                ConsensusResponse::failed(&err)
            }
        }
    }

    /// Review path: the full editable decision. Errors propagate.
    pub async fn get_transparent_decision(
        &self,
        request: ConsensusRequest,
    ) -> EngineResult<TransparentDecision> {
        let deliberation = self.deliberate(&request, true).await?;
        let decision = TransparentDecision::new(
            request.proposal,
            deliberation.evaluations,
            deliberation.result,
            deliberation.config,
        );
        info!(
            decision_id = %decision.id,
            components = decision.editable_components.len(),
            "transparent decision ready for review"
        );
        Ok(decision)
    }

    /// Evaluate proposals concurrently. A failing proposal is logged and
    /// counted only in `total_proposals` and `failures`.
    pub async fn evaluate_batch(&self, requests: Vec<ConsensusRequest>) -> BatchSummary {
        let total_proposals = requests.len();
        info!(total_proposals, "batch evaluation started");
        let results = join_all(requests.iter().map(|r| self.evaluate(r))).await;

        let mut summary = BatchSummary {
            total_proposals,
            ..Default::default()
        };
        for (index, (request, result)) in requests.iter().zip(results).enumerate() {
            match result {
                Ok((result, audit_id)) => {
                    match result.final_decision {
                        FinalDecision::Approve => summary.approved += 1,
                        FinalDecision::Reject => summary.rejected += 1,
                        FinalDecision::Escalate => summary.needs_review += 1,
                    }
                    summary.outcomes.push(BatchOutcome {
                        index,
                        decision_type: request.decision_type,
                        status: result.status,
                        final_decision: result.final_decision,
                        consensus_score: result.consensus_score,
                        confidence_level: result.confidence_level,
                        audit_id,
                    });
                }
                Err(err) => {
                    warn!(index, code = err.code(), error = %err, "batch proposal failed");
                    summary.failures.push(BatchFailure {
                        index,
                        code: err.code().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            approved = summary.approved,
            rejected = summary.rejected,
            needs_review = summary.needs_review,
            failed = summary.failures.len(),
            "batch evaluation complete"
        );
        summary
    }

    async fn evaluate(
        &self,
        request: &ConsensusRequest,
    ) -> EngineResult<(ConsensusResult, Option<String>)> {
        let deliberation = self.deliberate(request, false).await?;
        let audit_id = self.record_audit(request, &deliberation.result).await;
        Ok((deliberation.result, audit_id))
    }

    async fn deliberate(
        &self,
        request: &ConsensusRequest,
        with_components: bool,
    ) -> EngineResult<Deliberation> {
        let started = Instant::now();
        request.validate()?;
        let config = request
            .config
            .clone()
            .unwrap_or_else(|| self.config.consensus.clone());
        let as_of = request
            .as_of
            .unwrap_or_else(|| Local::now().naive_local());

        info!(
            decision_type = %request.decision_type,
            roster_id = request.roster_id.as_deref().unwrap_or("-"),
            requested_by = %request.requested_by,
            "consensus evaluation started"
        );

        let ctx = Arc::new(
            self.builder
                .build(&request.proposal, request.roster_id.as_deref(), as_of)
                .await?,
        );
        let evaluations = evaluate_panel(Arc::clone(&ctx), with_components).await?;

        let decisions = evaluations.iter().map(|e| e.decision.clone()).collect();
        let outcome = DebateCoordinator::new(&config).run(&ctx, decisions)?;
        debug!(debate = %outcome.summary_line(), "debate finished");

        let evaluations: Vec<AgentEvaluation> = evaluations
            .into_iter()
            .zip(outcome.decisions.iter().cloned())
            .map(|(evaluation, decision)| AgentEvaluation {
                decision,
                components: evaluation.components,
            })
            .collect();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = ConsensusAggregator::new(config.clone()).aggregate(
            outcome.decisions,
            outcome.rounds,
            ctx.as_of,
            elapsed_ms,
        );
        Ok(Deliberation {
            evaluations,
            result,
            config,
        })
    }

    /// Audit failures are logged and leave the id empty.
    async fn record_audit(
        &self,
        request: &ConsensusRequest,
        result: &ConsensusResult,
    ) -> Option<String> {
        let sink = self.audit.as_ref()?;
        let record = AuditRecord::new(
            &request.proposal,
            result,
            &request.requested_by,
            Local::now().naive_local(),
            self.config.audit_retention_days,
        );
        match sink.record(&record).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(
                    error = %err,
                    decision_type = %request.decision_type,
                    "audit record not stored"
                );
                None
            }
        }
    }
}

/// Run every evaluator on its own blocking task. Results come back in role
/// order regardless of completion order.
async fn evaluate_panel(
    ctx: Arc<DecisionContext>,
    with_components: bool,
) -> EngineResult<Vec<AgentEvaluation>> {
    let mut join_set: JoinSet<(AgentRole, Result<AgentEvaluation, String>)> = JoinSet::new();
    let mut roles: HashMap<task::Id, AgentRole> = HashMap::new();
    for agent in Agent::panel() {
        let ctx = Arc::clone(&ctx);
        let handle = join_set.spawn_blocking(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                let decision = agent.evaluate(&ctx);
                let components = if with_components {
                    agent.scoring_components(&ctx)
                } else {
                    Vec::new()
                };
                AgentEvaluation {
                    decision,
                    components,
                }
            }));
            (agent.role(), outcome.map_err(panic_message))
        });
        roles.insert(handle.id(), agent.role());
    }

    let mut evaluations = Vec::with_capacity(AgentRole::ALL.len());
    while let Some(joined) = join_set.join_next().await {
        let (role, outcome) = joined.map_err(|e| task_failure(&roles, e))?;
        let evaluation = outcome.map_err(|message| ConsensusError::Evaluation { role, message })?;
        debug!(
            agent = %role,
            recommendation = %evaluation.decision.recommendation,
            score = evaluation.decision.score,
            "evaluator finished"
        );
        evaluations.push(evaluation);
    }
    evaluations.sort_by_key(AgentEvaluation::role);
    Ok(evaluations)
}

/// Error for an evaluator task that never produced a result, attributed to
/// the role it was spawned for.
fn task_failure(roles: &HashMap<task::Id, AgentRole>, err: JoinError) -> ConsensusError {
    let message = format!("evaluator task aborted: {}", err);
    match roles.get(&err.id()) {
        Some(role) => ConsensusError::Evaluation {
            role: *role,
            message,
        },
        None => ConsensusError::EvaluatorTask(message),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "evaluator panicked".to_string()
    }
}
