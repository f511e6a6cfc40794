//! Transparent decisions: per-component breakdowns a reviewer can edit, with
//! deterministic recomputation of the consensus.

pub mod decision;
pub mod ledger;
pub mod summary;

pub use decision::{ReviewStatus, TransparentDecision};
pub use ledger::{AgentEvaluation, EditableComponent, UserEdit};
pub use summary::{ConfidenceLevel, DecisionSummary, QuickAction};
