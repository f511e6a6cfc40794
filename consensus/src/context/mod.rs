//! Decision context: the read-only bundle every evaluator judges against.

pub mod builder;
pub mod store;

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::ComplianceConfig;
use crate::model::{EmployeePreference, LaborBudget, Proposal, Shift};

pub use builder::ContextBuilder;
pub use store::{MemoryRosterStore, RosterStore, StoreSnapshot};

/// Immutable input to one decision. Built once per request and shared by
/// every evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub proposal: Proposal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster_id: Option<String>,
    /// Shifts already on the roster, minus any the proposal replaces.
    #[serde(default)]
    pub existing_shifts: Vec<Shift>,
    /// Keyed by user id. Users without a record are treated neutrally.
    #[serde(default)]
    pub preferences: HashMap<String, EmployeePreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labor_budget: Option<LaborBudget>,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    /// The single "now" every time-relative rule reads.
    pub as_of: NaiveDateTime,
}

/// One shift the proposal would place, together with the roster it would be
/// placed into.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub shift: Shift,
    /// Every other shift on the roster at the moment of placement.
    pub existing: Vec<Shift>,
    /// The placement takes over a previously assigned slot.
    pub replaces_existing: bool,
}

impl DecisionContext {
    /// Context with no roster data.
    pub fn new(proposal: Proposal, as_of: NaiveDateTime) -> Self {
        Self {
            proposal,
            roster_id: None,
            existing_shifts: Vec::new(),
            preferences: HashMap::new(),
            labor_budget: None,
            compliance: ComplianceConfig::default(),
            as_of,
        }
    }

    pub fn with_roster_id(mut self, roster_id: impl Into<String>) -> Self {
        self.roster_id = Some(roster_id.into());
        self
    }

    pub fn with_shifts(mut self, shifts: Vec<Shift>) -> Self {
        self.existing_shifts = shifts;
        self
    }

    pub fn with_preferences(
        mut self,
        preferences: impl IntoIterator<Item = EmployeePreference>,
    ) -> Self {
        self.preferences = preferences
            .into_iter()
            .map(|p| (p.user_id.clone(), p))
            .collect();
        self
    }

    pub fn with_budget(mut self, budget: LaborBudget) -> Self {
        self.labor_budget = Some(budget);
        self
    }

    pub fn with_compliance(mut self, compliance: ComplianceConfig) -> Self {
        self.compliance = compliance;
        self
    }

    pub fn preference_for(&self, user_id: &str) -> Option<&EmployeePreference> {
        self.preferences.get(user_id)
    }

    /// Existing shifts that stay on the roster once the proposal is applied,
    /// before any of the proposal's own shifts are added.
    pub fn base_shifts(&self) -> Vec<Shift> {
        self.existing_shifts
            .iter()
            .filter(|s| !self.proposal.supersedes(s))
            .cloned()
            .collect()
    }

    /// The proposal broken into single-shift placements.
    ///
    /// Schedules and optimisations accumulate: each placement sees the
    /// earlier ones as existing. A swap places each party's received shift
    /// with the other party's received shift already in place.
    pub fn placements(&self) -> Vec<Placement> {
        let base = self.base_shifts();
        match &self.proposal {
            Proposal::ShiftAssignment {
                shift,
                is_new,
                replaces_previous_assignment,
                ..
            } => vec![Placement {
                shift: shift.clone(),
                existing: base,
                replaces_existing: !is_new || replaces_previous_assignment.is_some(),
            }],
            Proposal::ShiftSwap { .. } => {
                let received = self.proposal.candidate_shifts();
                received
                    .iter()
                    .enumerate()
                    .map(|(i, shift)| {
                        let mut existing = base.clone();
                        existing.extend(
                            received
                                .iter()
                                .enumerate()
                                .filter(|(j, _)| *j != i)
                                .map(|(_, s)| s.clone()),
                        );
                        Placement {
                            shift: shift.clone(),
                            existing,
                            replaces_existing: true,
                        }
                    })
                    .collect()
            }
            Proposal::ScheduleCreation { .. } | Proposal::ScheduleOptimization { .. } => {
                accumulate(base, self.proposal.candidate_shifts())
            }
        }
    }

    /// Every shift on the roster once the whole proposal is applied.
    pub fn projected_shifts(&self) -> Vec<Shift> {
        let mut shifts = self.base_shifts();
        shifts.extend(self.proposal.candidate_shifts());
        shifts
    }
}

fn accumulate(mut existing: Vec<Shift>, shifts: Vec<Shift>) -> Vec<Placement> {
    let mut placements = Vec::with_capacity(shifts.len());
    for shift in shifts {
        placements.push(Placement {
            shift: shift.clone(),
            existing: existing.clone(),
            replaces_existing: false,
        });
        existing.push(shift);
    }
    placements
}
