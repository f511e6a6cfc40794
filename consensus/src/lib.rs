//! Roster Consensus Library
//!
//! Multi-agent consensus for labour-roster scheduling decisions. A proposed
//! action (assign a shift, swap shifts, publish a schedule, apply an
//! optimisation) is judged by four independent evaluators, debated when they
//! disagree, and aggregated into one weighted decision that a reviewer can
//! inspect and edit.
//!
//! # Pipeline
//!
//! - `context`: builds the immutable [`DecisionContext`] from a [`RosterStore`]
//! - `agents`: Compliance, Cost, Employee-Welfare and Operations evaluators
//! - `debate`: rebuttal rounds until a majority forms or rounds run out
//! - `aggregate`: weighted vote, deadlock and low-confidence escalation
//! - `transparent`: editable per-component ledger with deterministic recompute
//! - `audit`: hashed audit records handed to an [`AuditSink`]
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), roster_consensus::ConsensusError> {
//! use std::sync::Arc;
//! use roster_consensus::{
//!     ConsensusEngine, ConsensusRequest, EngineConfig, MemoryRosterStore, Proposal, Shift,
//! };
//!
//! let start =
//!     chrono::NaiveDateTime::parse_from_str("2025-03-03 08:00", "%Y-%m-%d %H:%M").unwrap();
//! let shift = Shift::new("u1", start, start + chrono::Duration::hours(8));
//! let store = Arc::new(MemoryRosterStore::default());
//! let engine = ConsensusEngine::new(store, EngineConfig::default())?;
//! let response = engine
//!     .get_consensus(ConsensusRequest::new(Proposal::assign(shift), "manager-1"))
//!     .await;
//! println!("{:?}", response.result.map(|r| r.final_decision));
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod agents;
pub mod aggregate;
pub mod audit;
pub mod config;
pub mod context;
pub mod debate;
pub mod engine;
pub mod error;
pub mod model;
pub mod transparent;

pub use agents::{Agent, Evaluator};
pub use aggregate::{ConsensusAggregator, ConsensusResult, ConsensusStatus, FinalDecision};
pub use audit::{AuditRecord, AuditSink, MemoryAuditSink};
pub use config::{ComplianceConfig, ConsensusConfig, EngineConfig};
pub use context::{ContextBuilder, DecisionContext, MemoryRosterStore, RosterStore, StoreSnapshot};
pub use debate::{DebateCoordinator, DebateRound};
pub use engine::{BatchSummary, ConsensusEngine, ConsensusRequest, ConsensusResponse};
pub use error::{ConsensusError, EngineResult};
pub use model::{
    AgentDecision, AgentRole, DecisionType, EmployeePreference, LaborBudget, Proposal,
    Recommendation, Roster, Shift,
};
pub use transparent::{ReviewStatus, TransparentDecision, UserEdit};
