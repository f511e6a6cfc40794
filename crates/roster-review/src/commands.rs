//! Subcommand bodies. Each returns the JSON document to print and whether
//! the run counts as a success for the exit code.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use roster_consensus::{
    ConsensusEngine, ConsensusRequest, EngineConfig, MemoryRosterStore, Proposal, StoreSnapshot,
    TransparentDecision, UserEdit,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::audit_log::JsonlAuditSink;

/// Format accepted for `--as-of`.
pub const AS_OF_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn parse_as_of(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, AS_OF_FORMAT)
        .map_err(|e| format!("expected YYYY-MM-DD HH:MM ({})", e))
}

/// Reviewer verdict recorded after edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Verdict {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub json: String,
    pub success: bool,
}

impl CommandOutput {
    fn of<T: Serialize>(value: &T, success: bool) -> Result<Self> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        Ok(Self { json, success })
    }
}

/// Engine over the fixture store, with the JSON-lines sink when a log path
/// is given.
pub fn build_engine(
    config: EngineConfig,
    snapshot: StoreSnapshot,
    audit_log: Option<&Path>,
) -> Result<ConsensusEngine> {
    let store = Arc::new(MemoryRosterStore::from_snapshot(snapshot));
    let engine = ConsensusEngine::new(store, config).context("Failed to build consensus engine")?;
    Ok(match audit_log {
        Some(path) => {
            info!(path = %path.display(), "Audit records go to JSON-lines log");
            engine.with_audit_sink(Arc::new(JsonlAuditSink::new(path)))
        }
        None => engine,
    })
}

/// Options for `evaluate`.
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    pub roster_id: Option<String>,
    pub requested_by: String,
    pub as_of: Option<NaiveDateTime>,
    /// Produce the transparent decision instead of the quick response.
    pub review: bool,
}

pub async fn evaluate(
    engine: &ConsensusEngine,
    proposal: Proposal,
    options: EvaluateOptions,
) -> Result<CommandOutput> {
    let mut request = ConsensusRequest::new(proposal, options.requested_by);
    request.roster_id = options.roster_id;
    request.as_of = options.as_of;

    if options.review {
        let decision = engine
            .get_transparent_decision(request)
            .await
            .context("Consensus evaluation failed")?;
        info!(
            decision_id = %decision.id,
            components = decision.editable_components.len(),
            headline = %decision.summary.headline,
            "Transparent decision ready for review"
        );
        return Ok(CommandOutput {
            json: decision.to_json(),
            success: true,
        });
    }

    let response = engine.get_consensus(request).await;
    if let Some(error) = &response.error {
        warn!(code = ?response.error_code, "Consensus request failed: {error}");
    }
    CommandOutput::of(&response, response.success)
}

pub async fn batch(
    engine: &ConsensusEngine,
    requests: Vec<ConsensusRequest>,
) -> Result<CommandOutput> {
    let summary = engine.evaluate_batch(requests).await;
    info!("{}", summary.summary_line());
    CommandOutput::of(&summary, summary.failures.is_empty())
}

#[derive(Debug, Serialize)]
struct PurgeReport {
    as_of: NaiveDateTime,
    dropped: usize,
}

/// Drop audit records whose retention horizon has passed by `as_of`
/// (defaults to now).
pub async fn purge(
    engine: &ConsensusEngine,
    as_of: Option<NaiveDateTime>,
) -> Result<CommandOutput> {
    let as_of = as_of.unwrap_or_else(|| Local::now().naive_local());
    let dropped = engine
        .purge_expired_audit(as_of)
        .await
        .context("Failed to purge the audit log")?;
    CommandOutput::of(&PurgeReport { as_of, dropped }, true)
}

/// Apply `edits` to a saved decision, then record the verdict if any.
pub fn edit(
    mut decision: TransparentDecision,
    edits: &[UserEdit],
    verdict: Option<Verdict>,
) -> Result<CommandOutput> {
    if !edits.is_empty() {
        decision
            .apply_user_edits(edits)
            .context("Failed to apply edits")?;
    }
    match verdict {
        Some(Verdict::Approve) => decision.approve().context("Failed to approve decision")?,
        Some(Verdict::Reject) => decision.reject().context("Failed to reject decision")?,
        None => {}
    }
    info!(
        decision_id = %decision.id,
        status = %decision.status,
        modified = decision.modified_components().count(),
        "Decision updated"
    );
    Ok(CommandOutput {
        json: decision.to_json(),
        success: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_of() {
        let parsed = parse_as_of("2025-03-04 09:30").unwrap();
        assert_eq!(parsed.format(AS_OF_FORMAT).to_string(), "2025-03-04 09:30");
        assert!(parse_as_of("2025-03-04").is_err());
        assert!(parse_as_of("tomorrow").is_err());
    }

    #[test]
    fn test_build_engine_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.consensus.majority_threshold = 0.0;
        assert!(build_engine(config, StoreSnapshot::default(), None).is_err());
    }
}
