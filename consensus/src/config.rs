//! Construction-time configuration for the consensus engine.
//!
//! Defaults follow the Norwegian Working Environment Act. Every struct is
//! `#[serde(default)]` so a partial TOML file only overrides what it names.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, EngineResult};
use crate::model::AgentRole;

/// Voting, debate and escalation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Only a unanimous vote may decide; any split escalates or deadlocks.
    pub require_unanimous: bool,
    /// Share of vote weight a side needs, in (0, 1]. Inclusive.
    pub majority_threshold: f64,
    /// Upper bound on debate rounds, in [1, 10].
    pub max_debate_rounds: u32,
    /// Let evaluators react to each other when they disagree.
    pub enable_cross_evaluation: bool,
    /// Vote weight per role; missing roles weigh 1.0.
    pub agent_weights: HashMap<AgentRole, f64>,
    /// Mean confidence (0–100) below which the result may be escalated.
    pub minimum_confidence_threshold: f64,
    pub escalate_on_deadlock: bool,
    pub escalate_on_low_confidence: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        let agent_weights = HashMap::from([
            (AgentRole::Compliance, 1.5),
            (AgentRole::Cost, 1.0),
            (AgentRole::EmployeeWelfare, 1.0),
            (AgentRole::Operations, 1.0),
        ]);
        Self {
            require_unanimous: false,
            majority_threshold: 0.6,
            max_debate_rounds: 3,
            enable_cross_evaluation: true,
            agent_weights,
            minimum_confidence_threshold: 50.0,
            escalate_on_deadlock: true,
            escalate_on_low_confidence: true,
        }
    }
}

impl ConsensusConfig {
    /// Vote weight for a role.
    pub fn weight_for(&self, role: AgentRole) -> f64 {
        self.agent_weights.get(&role).copied().unwrap_or(1.0)
    }

    pub fn with_weight(mut self, role: AgentRole, weight: f64) -> Self {
        self.agent_weights.insert(role, weight);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.majority_threshold > 0.0 && self.majority_threshold <= 1.0) {
            return Err(ConsensusError::InvalidConfig(format!(
                "majority_threshold must be in (0, 1], got {}",
                self.majority_threshold
            )));
        }
        if !(1..=10).contains(&self.max_debate_rounds) {
            return Err(ConsensusError::InvalidConfig(format!(
                "max_debate_rounds must be in [1, 10], got {}",
                self.max_debate_rounds
            )));
        }
        if let Some((role, weight)) = self
            .agent_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(ConsensusError::InvalidConfig(format!(
                "weight for {} must be a non-negative number, got {}",
                role, weight
            )));
        }
        if !(0.0..=100.0).contains(&self.minimum_confidence_threshold) {
            return Err(ConsensusError::InvalidConfig(format!(
                "minimum_confidence_threshold must be in [0, 100], got {}",
                self.minimum_confidence_threshold
            )));
        }
        Ok(())
    }
}

/// Working-time limits the Compliance evaluator enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub max_daily_hours: f64,
    pub max_weekly_hours: f64,
    /// Minimum rest between two shifts, in hours.
    pub min_daily_rest: f64,
    /// Minimum continuous rest inside a Monday–Sunday week, in hours.
    pub min_weekly_rest: f64,
    /// Days before a shift the schedule must be published.
    pub publish_deadline_days: u32,
    pub max_overtime_per_week: f64,
    pub max_overtime_per_4_weeks: f64,
    pub max_overtime_per_year: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            max_daily_hours: 9.0,
            max_weekly_hours: 40.0,
            min_daily_rest: 11.0,
            min_weekly_rest: 35.0,
            publish_deadline_days: 14,
            max_overtime_per_week: 10.0,
            max_overtime_per_4_weeks: 25.0,
            max_overtime_per_year: 200.0,
        }
    }
}

impl ComplianceConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let limits = [
            ("max_daily_hours", self.max_daily_hours),
            ("max_weekly_hours", self.max_weekly_hours),
            ("min_daily_rest", self.min_daily_rest),
            ("min_weekly_rest", self.min_weekly_rest),
            ("max_overtime_per_week", self.max_overtime_per_week),
            ("max_overtime_per_4_weeks", self.max_overtime_per_4_weeks),
            ("max_overtime_per_year", self.max_overtime_per_year),
        ];
        for (name, value) in limits {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConsensusError::InvalidConfig(format!(
                    "{} must be a positive number of hours, got {}",
                    name, value
                )));
            }
        }
        if self.min_weekly_rest > 7.0 * 24.0 {
            return Err(ConsensusError::InvalidConfig(format!(
                "min_weekly_rest cannot exceed a week, got {}",
                self.min_weekly_rest
            )));
        }
        Ok(())
    }
}

/// Everything the engine needs at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub consensus: ConsensusConfig,
    pub compliance: ComplianceConfig,
    /// How long audit records must be retained.
    pub audit_retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusConfig::default(),
            compliance: ComplianceConfig::default(),
            audit_retention_days: 365,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConsensusError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ConsensusError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.consensus.validate()?;
        self.compliance.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norwegian_defaults() {
        let config = ComplianceConfig::default();
        assert_eq!(config.max_daily_hours, 9.0);
        assert_eq!(config.max_weekly_hours, 40.0);
        assert_eq!(config.min_daily_rest, 11.0);
        assert_eq!(config.min_weekly_rest, 35.0);
        assert_eq!(config.publish_deadline_days, 14);
        assert_eq!(config.max_overtime_per_week, 10.0);
        assert_eq!(config.max_overtime_per_4_weeks, 25.0);
        assert_eq!(config.max_overtime_per_year, 200.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_role_weighs_one() {
        let mut config = ConsensusConfig::default();
        config.agent_weights.remove(&AgentRole::Cost);
        assert_eq!(config.weight_for(AgentRole::Cost), 1.0);
        assert_eq!(config.weight_for(AgentRole::Compliance), 1.5);
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = ConsensusConfig::default();
        config.majority_threshold = 0.0;
        assert!(config.validate().is_err());
        config.majority_threshold = 1.0;
        assert!(config.validate().is_ok());
        config.majority_threshold = 1.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_bounds() {
        let mut config = ConsensusConfig::default();
        config.max_debate_rounds = 0;
        assert!(config.validate().is_err());
        config.max_debate_rounds = 11;
        assert!(config.validate().is_err());
        config.max_debate_rounds = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            audit_retention_days = 90

            [consensus]
            majority_threshold = 0.75

            [consensus.agent_weights]
            operations = 2.0

            [compliance]
            max_daily_hours = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.audit_retention_days, 90);
        assert_eq!(config.consensus.majority_threshold, 0.75);
        assert_eq!(config.consensus.max_debate_rounds, 3);
        assert_eq!(config.consensus.weight_for(AgentRole::Operations), 2.0);
        assert_eq!(config.consensus.weight_for(AgentRole::Cost), 1.0);
        assert_eq!(config.compliance.max_daily_hours, 10.0);
        assert_eq!(config.compliance.min_daily_rest, 11.0);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[consensus]\nmax_debate_rounds = 42").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }
}
