//! Audit trail for consensus decisions.
//!
//! The engine only builds records and hands them to an [`AuditSink`];
//! storage and retention enforcement belong to the sink.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::aggregate::{ConsensusResult, ConsensusStatus, FinalDecision};
use crate::error::EngineResult;
use crate::model::{AgentRole, DecisionType, Proposal, Recommendation};

/// Headline numbers of a consensus result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub status: ConsensusStatus,
    pub final_decision: FinalDecision,
    pub votes_for: f64,
    pub votes_against: f64,
    pub abstentions: f64,
    pub consensus_score: f64,
    pub confidence_level: f64,
    pub total_rounds: u32,
    pub summary: String,
}

impl From<&ConsensusResult> for ResultSummary {
    fn from(result: &ConsensusResult) -> Self {
        Self {
            status: result.status,
            final_decision: result.final_decision,
            votes_for: result.votes_for,
            votes_against: result.votes_against,
            abstentions: result.abstentions,
            consensus_score: result.consensus_score,
            confidence_level: result.confidence_level,
            total_rounds: result.total_rounds,
            summary: result.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_role: AgentRole,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub score: f64,
    /// The recommendation changed during debate.
    pub revised: bool,
}

/// Hashed part of an audit record.
#[derive(Serialize)]
struct AuditBody<'a> {
    decision_type: DecisionType,
    proposal: &'a Proposal,
    result_summary: &'a ResultSummary,
    agent_summaries: &'a [AgentSummary],
    requested_by: &'a str,
    recorded_at: NaiveDateTime,
    retain_until: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub decision_type: DecisionType,
    pub proposal: Proposal,
    pub result_summary: ResultSummary,
    pub agent_summaries: Vec<AgentSummary>,
    pub requested_by: String,
    pub recorded_at: NaiveDateTime,
    pub retain_until: NaiveDateTime,
    /// blake3 hex digest of the JSON body (every field but `id` and this one).
    pub content_hash: String,
}

impl AuditRecord {
    pub fn new(
        proposal: &Proposal,
        result: &ConsensusResult,
        requested_by: &str,
        recorded_at: NaiveDateTime,
        retention_days: u32,
    ) -> Self {
        let agent_summaries = result
            .agent_decisions
            .iter()
            .map(|d| AgentSummary {
                agent_role: d.agent_role,
                recommendation: d.effective_recommendation(),
                confidence: d.effective_confidence(),
                score: d.score,
                revised: d.is_revised(),
            })
            .collect();
        let mut record = Self {
            id: Uuid::new_v4().to_string(),
            decision_type: proposal.decision_type(),
            proposal: proposal.clone(),
            result_summary: ResultSummary::from(result),
            agent_summaries,
            requested_by: requested_by.to_string(),
            recorded_at,
            retain_until: recorded_at + Duration::days(i64::from(retention_days)),
            content_hash: String::new(),
        };
        record.content_hash = record.compute_hash();
        record
    }

    fn compute_hash(&self) -> String {
        let body = AuditBody {
            decision_type: self.decision_type,
            proposal: &self.proposal,
            result_summary: &self.result_summary,
            agent_summaries: &self.agent_summaries,
            requested_by: &self.requested_by,
            recorded_at: self.recorded_at,
            retain_until: self.retain_until,
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// The stored hash still matches the record body.
    pub fn verify(&self) -> bool {
        self.compute_hash() == self.content_hash
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now > self.retain_until
    }
}

/// Where audit records go.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist a record and return its id.
    async fn record(&self, record: &AuditRecord) -> EngineResult<String>;

    /// Drop records past their retention horizon. Returns how many went.
    async fn purge_expired(&self, now: NaiveDateTime) -> EngineResult<usize>;
}

/// In-process sink, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> EngineResult<String> {
        self.records.write().await.push(record.clone());
        Ok(record.id.clone())
    }

    async fn purge_expired(&self, now: NaiveDateTime) -> EngineResult<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !r.is_expired(now));
        Ok(before - records.len())
    }
}
