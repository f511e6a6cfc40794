//! Debate state machine: phases, transitions and session tracking.

use serde::{Deserialize, Serialize};

/// Phase of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Session created, no round run yet.
    Idle,
    /// Evaluators are exchanging responses.
    Deliberating,
    /// A round ended with a majority or a single shared recommendation.
    Resolved,
    /// Round budget spent without consensus.
    Exhausted,
    /// No debate needed: evaluators agree, or cross-evaluation is off.
    Skipped,
}

impl DebatePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Exhausted | Self::Skipped)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [DebatePhase] {
        match self {
            Self::Idle => &[Self::Deliberating, Self::Skipped],
            Self::Deliberating => &[Self::Deliberating, Self::Resolved, Self::Exhausted],
            Self::Resolved | Self::Exhausted | Self::Skipped => &[],
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Deliberating => write!(f, "deliberating"),
            Self::Resolved => write!(f, "resolved"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTransition {
    pub from: DebatePhase,
    pub to: DebatePhase,
    /// Round in progress after the transition.
    pub round: u32,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DebatePhase,
    pub to: DebatePhase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

impl From<TransitionError> for crate::error::ConsensusError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidTransition {
            from: err.from.to_string(),
            to: err.to.to_string(),
        }
    }
}

/// A debate session tracking phase and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSession {
    pub phase: DebatePhase,
    /// Current round number (0 before the first round).
    pub current_round: u32,
    pub max_rounds: u32,
    pub transitions: Vec<DebateTransition>,
}

impl DebateSession {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            phase: DebatePhase::Idle,
            current_round: 0,
            max_rounds,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: DebatePhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }
        if to == DebatePhase::Deliberating {
            if !self.has_rounds_remaining() {
                return Err(TransitionError {
                    from: self.phase,
                    to,
                    reason: format!("all {} rounds used", self.max_rounds),
                });
            }
            self.current_round += 1;
        }

        self.transitions.push(DebateTransition {
            from: self.phase,
            to,
            round: self.current_round,
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }

    /// Begin the next round (Idle/Deliberating → Deliberating).
    pub fn next_round(&mut self) -> Result<u32, TransitionError> {
        self.transition(DebatePhase::Deliberating, "round started")?;
        Ok(self.current_round)
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn has_rounds_remaining(&self) -> bool {
        self.current_round < self.max_rounds
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | {} transitions",
            self.phase,
            self.current_round,
            self.max_rounds,
            self.transitions.len()
        )
    }
}
