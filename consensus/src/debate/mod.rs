//! Debate: structured rebuttals between evaluators that disagree.
//!
//! # Debate Flow
//!
//! ```text
//! Idle ─┬─ agreement / cross-evaluation off ──────────→ Skipped
//!       └─ disagreement → Deliberating (round 1..max)
//!                              │
//!                              ├─ majority or single recommendation → Resolved
//!                              ├─ rounds left → Deliberating
//!                              └─ max rounds → Exhausted
//! ```

pub mod consensus;
pub mod coordinator;
pub mod state;
pub mod topic;

pub use consensus::{ConsensusCheck, ConsensusProtocol};
pub use coordinator::{
    has_disagreement, AgentResponse, DebateCoordinator, DebateOutcome, DebateRound,
};
pub use state::{DebatePhase, DebateSession, DebateTransition, TransitionError};
pub use topic::{classify_topic, TopicKind};
