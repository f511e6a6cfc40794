//! Engine configuration for the CLI: an optional TOML file, then
//! environment overrides on top.

use std::path::Path;

use anyhow::{Context, Result};
use roster_consensus::EngineConfig;
use thiserror::Error;
use tracing::info;

pub const MAJORITY_THRESHOLD_VAR: &str = "ROSTER_MAJORITY_THRESHOLD";
pub const MAX_DEBATE_ROUNDS_VAR: &str = "ROSTER_MAX_DEBATE_ROUNDS";
pub const AUDIT_RETENTION_DAYS_VAR: &str = "ROSTER_AUDIT_RETENTION_DAYS";

/// An environment variable that is set but does not parse.
#[derive(Debug, Error)]
#[error("{var}={value:?} is not a valid {expected}")]
pub struct OverrideError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Load the config file (defaults when `path` is `None`), apply
/// `ROSTER_*` overrides from the process environment and validate.
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let applied = apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    config
        .validate()
        .context("Configuration is invalid after environment overrides")?;
    info!(
        majority_threshold = config.consensus.majority_threshold,
        max_debate_rounds = config.consensus.max_debate_rounds,
        audit_retention_days = config.audit_retention_days,
        overrides = applied,
        "Engine configuration loaded"
    );
    Ok(config)
}

/// Apply overrides read through `lookup`. Returns how many were applied.
pub fn apply_overrides(
    config: &mut EngineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<usize, OverrideError> {
    let mut applied = 0;
    if let Some(value) = parse_var(&lookup, MAJORITY_THRESHOLD_VAR, "number")? {
        config.consensus.majority_threshold = value;
        applied += 1;
    }
    if let Some(value) = parse_var(&lookup, MAX_DEBATE_ROUNDS_VAR, "round count")? {
        config.consensus.max_debate_rounds = value;
        applied += 1;
    }
    if let Some(value) = parse_var(&lookup, AUDIT_RETENTION_DAYS_VAR, "day count")? {
        config.audit_retention_days = value;
        applied += 1;
    }
    Ok(applied)
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, OverrideError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| OverrideError {
        var,
        value: raw.clone(),
        expected,
    })
}
