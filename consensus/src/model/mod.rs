//! Domain model shared by every stage of the engine.

pub mod decision;
pub mod proposal;
pub mod shift;

pub use decision::{
    AgentDecision, AgentRole, Concern, EvidenceKind, EvidenceReference, Impact, Recommendation,
    ScoringComponent, Severity,
};
pub use proposal::{CoverageGoal, DecisionType, OptimizationChange, Proposal};
pub use shift::{
    is_weekend, EmployeePreference, LaborBudget, Roster, Shift, ShiftPeriod, Unavailability,
};
