//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use roster_consensus::{
    ConsensusEngine, ConsensusRequest, EmployeePreference, EngineConfig, MemoryRosterStore,
    Proposal, Roster, Shift, StoreSnapshot,
};

pub const ROSTER_ID: &str = "roster-1";
pub const AS_OF: &str = "2025-02-01 09:00";

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn shift(user: &str, start: &str, end: &str) -> Shift {
    Shift::new(user, at(start), at(end))
}

pub fn roster(members: &[&str]) -> Roster {
    Roster {
        id: ROSTER_ID.to_string(),
        name: "Front desk".to_string(),
        organization_id: "org-1".to_string(),
        location_id: Some("oslo".to_string()),
        member_ids: members.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn snapshot(shifts: Vec<Shift>, preferences: Vec<EmployeePreference>) -> StoreSnapshot {
    StoreSnapshot {
        rosters: vec![roster(&["u1", "u2", "u3"])],
        shifts: BTreeMap::from([(ROSTER_ID.to_string(), shifts)]),
        preferences,
        budgets: vec![],
    }
}

pub fn store(shifts: Vec<Shift>, preferences: Vec<EmployeePreference>) -> Arc<MemoryRosterStore> {
    Arc::new(MemoryRosterStore::from_snapshot(snapshot(shifts, preferences)))
}

pub fn engine(shifts: Vec<Shift>, preferences: Vec<EmployeePreference>) -> ConsensusEngine {
    ConsensusEngine::new(store(shifts, preferences), EngineConfig::default()).unwrap()
}

/// Request against the fixture roster at the fixed evaluation instant.
pub fn request(proposal: Proposal) -> ConsensusRequest {
    ConsensusRequest::new(proposal, "manager-1")
        .for_roster(ROSTER_ID)
        .at(at(AS_OF))
}
