//! Proposals: the scheduling actions under judgment.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::shift::Shift;
use crate::error::{ConsensusError, EngineResult};

/// Kind of decision being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    ShiftAssignment,
    ShiftSwap,
    SchedulePublish,
    ScheduleOptimization,
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShiftAssignment => write!(f, "shift_assignment"),
            Self::ShiftSwap => write!(f, "shift_swap"),
            Self::SchedulePublish => write!(f, "schedule_publish"),
            Self::ScheduleOptimization => write!(f, "schedule_optimization"),
        }
    }
}

/// A staffing target for a window of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGoal {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub min_staff: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One change in an optimisation: remove `original`, add `proposed`, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationChange {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<Shift>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed: Option<Shift>,
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

/// What is being judged. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Proposal {
    ShiftAssignment {
        user_id: String,
        shift: Shift,
        #[serde(default = "default_true")]
        is_new: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaces_previous_assignment: Option<String>,
    },
    ShiftSwap {
        requesting_user_id: String,
        target_user_id: String,
        shift_to_swap: Shift,
        shift_to_receive: Shift,
        #[serde(default)]
        reason: String,
    },
    ScheduleCreation {
        assignments: Vec<Shift>,
        #[serde(default)]
        coverage_goals: Vec<CoverageGoal>,
    },
    ScheduleOptimization {
        changes: Vec<OptimizationChange>,
        #[serde(default)]
        expected_savings: f64,
        #[serde(default)]
        affects_compliance: bool,
    },
}

impl Proposal {
    /// New-shift assignment for the shift's owner.
    pub fn assign(shift: Shift) -> Self {
        Self::ShiftAssignment {
            user_id: shift.user_id.clone(),
            shift,
            is_new: true,
            replaces_previous_assignment: None,
        }
    }

    pub fn decision_type(&self) -> DecisionType {
        match self {
            Self::ShiftAssignment { .. } => DecisionType::ShiftAssignment,
            Self::ShiftSwap { .. } => DecisionType::ShiftSwap,
            Self::ScheduleCreation { .. } => DecisionType::SchedulePublish,
            Self::ScheduleOptimization { .. } => DecisionType::ScheduleOptimization,
        }
    }

    /// Check the proposal is internally consistent.
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            Self::ShiftAssignment { user_id, shift, .. } => {
                shift.validate()?;
                if &shift.user_id != user_id {
                    return Err(ConsensusError::InvalidProposal(format!(
                        "assignment for {} carries a shift owned by {}",
                        user_id, shift.user_id
                    )));
                }
            }
            Self::ShiftSwap {
                requesting_user_id,
                target_user_id,
                shift_to_swap,
                shift_to_receive,
                ..
            } => {
                if requesting_user_id == target_user_id {
                    return Err(ConsensusError::InvalidProposal(
                        "a swap needs two different users".to_string(),
                    ));
                }
                shift_to_swap.validate()?;
                shift_to_receive.validate()?;
                if &shift_to_swap.user_id != requesting_user_id {
                    return Err(ConsensusError::InvalidProposal(format!(
                        "shift to swap is owned by {}, not the requester {}",
                        shift_to_swap.user_id, requesting_user_id
                    )));
                }
                if &shift_to_receive.user_id != target_user_id {
                    return Err(ConsensusError::InvalidProposal(format!(
                        "shift to receive is owned by {}, not the target {}",
                        shift_to_receive.user_id, target_user_id
                    )));
                }
            }
            Self::ScheduleCreation { assignments, coverage_goals } => {
                if assignments.is_empty() {
                    return Err(ConsensusError::InvalidProposal(
                        "schedule contains no assignments".to_string(),
                    ));
                }
                for shift in assignments {
                    shift.validate()?;
                }
                for goal in coverage_goals {
                    if goal.end <= goal.start {
                        return Err(ConsensusError::InvalidProposal(format!(
                            "coverage goal starting {} has an empty window",
                            goal.start
                        )));
                    }
                }
            }
            Self::ScheduleOptimization {
                changes,
                expected_savings,
                ..
            } => {
                if changes.is_empty() {
                    return Err(ConsensusError::InvalidProposal(
                        "optimisation contains no changes".to_string(),
                    ));
                }
                if !expected_savings.is_finite() {
                    return Err(ConsensusError::InvalidProposal(
                        "expected savings must be a finite number".to_string(),
                    ));
                }
                for change in changes {
                    if change.original.is_none() && change.proposed.is_none() {
                        return Err(ConsensusError::InvalidProposal(format!(
                            "change for {} has neither an original nor a proposed shift",
                            change.user_id
                        )));
                    }
                    for shift in change.original.iter().chain(change.proposed.iter()) {
                        shift.validate()?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Users whose schedules the proposal touches, sorted and de-duplicated.
    pub fn affected_users(&self) -> Vec<String> {
        let mut users: Vec<String> = match self {
            Self::ShiftAssignment { user_id, .. } => vec![user_id.clone()],
            Self::ShiftSwap {
                requesting_user_id,
                target_user_id,
                ..
            } => vec![requesting_user_id.clone(), target_user_id.clone()],
            Self::ScheduleCreation { assignments, .. } => {
                assignments.iter().map(|s| s.user_id.clone()).collect()
            }
            Self::ScheduleOptimization { changes, .. } => {
                changes.iter().map(|c| c.user_id.clone()).collect()
            }
        };
        users.sort();
        users.dedup();
        users
    }

    /// Shifts the proposal would add to the roster.
    pub fn candidate_shifts(&self) -> Vec<Shift> {
        match self {
            Self::ShiftAssignment { shift, .. } => vec![shift.clone()],
            Self::ShiftSwap {
                requesting_user_id,
                target_user_id,
                shift_to_swap,
                shift_to_receive,
                ..
            } => vec![
                shift_to_receive.reassigned_to(requesting_user_id),
                shift_to_swap.reassigned_to(target_user_id),
            ],
            Self::ScheduleCreation { assignments, .. } => assignments.clone(),
            Self::ScheduleOptimization { changes, .. } => {
                changes.iter().filter_map(|c| c.proposed.clone()).collect()
            }
        }
    }

    /// Whether an existing shift is superseded by this proposal and must be
    /// left out of the evaluation context.
    pub fn supersedes(&self, existing: &Shift) -> bool {
        match self {
            Self::ShiftAssignment {
                shift,
                is_new,
                replaces_previous_assignment,
                ..
            } => {
                let replaced = match (replaces_previous_assignment, &existing.id) {
                    (Some(replaced_id), Some(id)) => replaced_id == id,
                    _ => false,
                };
                let updated = !is_new
                    && matches!((&shift.id, &existing.id), (Some(a), Some(b)) if a == b);
                replaced || updated
            }
            Self::ShiftSwap {
                shift_to_swap,
                shift_to_receive,
                ..
            } => shift_to_swap.same_slot(existing) || shift_to_receive.same_slot(existing),
            Self::ScheduleCreation { .. } => false,
            Self::ScheduleOptimization { changes, .. } => changes
                .iter()
                .filter_map(|c| c.original.as_ref())
                .any(|original| original.same_slot(existing)),
        }
    }

    /// One-line human description.
    pub fn describe(&self) -> String {
        match self {
            Self::ShiftAssignment { user_id, shift, .. } => format!(
                "assign {} to {} – {} ({:.1}h)",
                user_id,
                shift.start.format("%a %Y-%m-%d %H:%M"),
                shift.end.format("%H:%M"),
                shift.working_hours()
            ),
            Self::ShiftSwap {
                requesting_user_id,
                target_user_id,
                ..
            } => format!("swap shifts between {} and {}", requesting_user_id, target_user_id),
            Self::ScheduleCreation { assignments, .. } => {
                format!("publish schedule with {} assignments", assignments.len())
            }
            Self::ScheduleOptimization {
                changes,
                expected_savings,
                ..
            } => format!(
                "apply optimisation with {} changes (expected savings {:.2})",
                changes.len(),
                expected_savings
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn shift(user: &str, start: &str, end: &str) -> Shift {
        Shift::new(user, at(start), at(end))
    }

    #[test]
    fn test_assignment_user_mismatch_rejected() {
        let proposal = Proposal::ShiftAssignment {
            user_id: "u2".into(),
            shift: shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"),
            is_new: true,
            replaces_previous_assignment: None,
        };
        let err = proposal.validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_PROPOSAL");
    }

    #[test]
    fn test_swap_requires_distinct_users() {
        let proposal = Proposal::ShiftSwap {
            requesting_user_id: "u1".into(),
            target_user_id: "u1".into(),
            shift_to_swap: shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"),
            shift_to_receive: shift("u1", "2025-03-04 08:00", "2025-03-04 16:00"),
            reason: String::new(),
        };
        assert!(proposal.validate().is_err());
    }

    #[test]
    fn test_swap_candidates_are_reassigned() {
        let proposal = Proposal::ShiftSwap {
            requesting_user_id: "u1".into(),
            target_user_id: "u2".into(),
            shift_to_swap: shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"),
            shift_to_receive: shift("u2", "2025-03-04 08:00", "2025-03-04 16:00"),
            reason: "childcare".into(),
        };
        proposal.validate().unwrap();
        let candidates = proposal.candidate_shifts();
        assert_eq!(candidates[0].user_id, "u1");
        assert_eq!(candidates[0].start, at("2025-03-04 08:00"));
        assert_eq!(candidates[1].user_id, "u2");
        assert_eq!(proposal.affected_users(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_empty_schedule_rejected() {
        let proposal = Proposal::ScheduleCreation {
            assignments: vec![],
            coverage_goals: vec![],
        };
        assert!(proposal.validate().is_err());
    }

    #[test]
    fn test_replaced_assignment_is_superseded() {
        let old = shift("u1", "2025-03-03 08:00", "2025-03-03 16:00").with_id("s-old");
        let proposal = Proposal::ShiftAssignment {
            user_id: "u1".into(),
            shift: shift("u1", "2025-03-03 10:00", "2025-03-03 18:00"),
            is_new: true,
            replaces_previous_assignment: Some("s-old".into()),
        };
        assert!(proposal.supersedes(&old));
        assert!(!Proposal::assign(shift("u1", "2025-03-03 10:00", "2025-03-03 18:00"))
            .supersedes(&old));
    }

    #[test]
    fn test_proposal_serde_tag() {
        let proposal = Proposal::assign(shift("u1", "2025-03-03 08:00", "2025-03-03 16:00"));
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["type"], "shift_assignment");
        let parsed: Proposal = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, proposal);
        assert_eq!(parsed.decision_type(), DecisionType::ShiftAssignment);
    }
}
