//! Error taxonomy for the consensus engine.
//!
//! Input errors fail fast before any decision object is mutated. Context
//! errors come from the roster collaborator and surface either as a
//! `ConsensusResponse { success: false, .. }` (quick path) or as `Err` (review
//! path). Nothing here is fatal to the host process.

use thiserror::Error;

use crate::model::AgentRole;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, ConsensusError>;

/// Errors raised by the consensus engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsensusError {
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("unknown editable component: {0}")]
    UnknownComponent(String),

    #[error("component '{component}' of the {agent} evaluator is not editable (legal requirement)")]
    ComponentNotEditable { component: String, agent: AgentRole },

    #[error("invalid score {score} for component {component_id}")]
    InvalidScore { component_id: String, score: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("roster not found: {0}")]
    RosterNotFound(String),

    #[error("user {user_id} is not a member of roster {roster_id}")]
    UserNotFound { user_id: String, roster_id: String },

    #[error("roster store error: {0}")]
    Store(String),

    #[error("{role} evaluator failed: {message}")]
    Evaluation { role: AgentRole, message: String },

    #[error("evaluator task failed: {0}")]
    EvaluatorTask(String),

    #[error("invalid transition {from} → {to}")]
    InvalidTransition { from: String, to: String },

    #[error("audit sink error: {0}")]
    Audit(String),
}

impl ConsensusError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidProposal(_) => "INVALID_PROPOSAL",
            Self::UnknownComponent(_) => "UNKNOWN_COMPONENT",
            Self::ComponentNotEditable { .. } => "COMPONENT_NOT_EDITABLE",
            Self::InvalidScore { .. } => "INVALID_SCORE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::RosterNotFound(_) => "ROSTER_NOT_FOUND",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
            Self::Evaluation { .. } | Self::EvaluatorTask(_) => "EVALUATION_FAILED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Audit(_) => "AUDIT_FAILED",
        }
    }

    /// Whether the caller sent something malformed (as opposed to a
    /// collaborator or evaluator failure).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidProposal(_)
                | Self::UnknownComponent(_)
                | Self::ComponentNotEditable { .. }
                | Self::InvalidScore { .. }
                | Self::InvalidConfig(_)
                | Self::InvalidTransition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ConsensusError::InvalidProposal("x".into()).code(),
            "INVALID_PROPOSAL"
        );
        assert_eq!(
            ConsensusError::ComponentNotEditable {
                component: "Daily Rest Period".into(),
                agent: AgentRole::Compliance,
            }
            .code(),
            "COMPONENT_NOT_EDITABLE"
        );
        assert_eq!(
            ConsensusError::RosterNotFound("r-1".into()).code(),
            "ROSTER_NOT_FOUND"
        );
    }

    #[test]
    fn test_not_editable_message_names_component() {
        let err = ConsensusError::ComponentNotEditable {
            component: "Daily Rest Period".into(),
            agent: AgentRole::Compliance,
        };
        let msg = err.to_string();
        assert!(msg.contains("Daily Rest Period"));
        assert!(msg.contains("compliance"));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(ConsensusError::UnknownComponent("c".into()).is_input_error());
        assert!(!ConsensusError::Store("down".into()).is_input_error());
        assert!(!ConsensusError::RosterNotFound("r".into()).is_input_error());
    }
}
