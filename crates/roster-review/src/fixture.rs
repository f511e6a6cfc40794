//! JSON inputs of the CLI: roster fixtures, proposals, request batches,
//! saved decisions and edit files.

use std::path::Path;

use anyhow::{Context, Result};
use roster_consensus::transparent::TransparentDecision;
use roster_consensus::{ConsensusRequest, Proposal, StoreSnapshot, UserEdit};
use serde::de::DeserializeOwned;
use tracing::info;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {} in {}", what, path.display()))
}

/// Roster store snapshot; an empty store when no fixture is given.
pub fn load_snapshot(path: Option<&Path>) -> Result<StoreSnapshot> {
    let Some(path) = path else {
        return Ok(StoreSnapshot::default());
    };
    let snapshot: StoreSnapshot = read_json(path, "roster fixture")?;
    info!(
        path = %path.display(),
        rosters = snapshot.rosters.len(),
        shifts = snapshot.shifts.values().map(Vec::len).sum::<usize>(),
        preferences = snapshot.preferences.len(),
        budgets = snapshot.budgets.len(),
        "Loaded roster fixture"
    );
    Ok(snapshot)
}

pub fn load_proposal(path: &Path) -> Result<Proposal> {
    read_json(path, "proposal")
}

/// A JSON array of consensus requests.
pub fn load_requests(path: &Path) -> Result<Vec<ConsensusRequest>> {
    read_json(path, "request batch")
}

/// A JSON array of edits.
pub fn load_edits(path: &Path) -> Result<Vec<UserEdit>> {
    read_json(path, "edit list")
}

pub fn load_decision(path: &Path) -> Result<TransparentDecision> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read decision from {}", path.display()))?;
    TransparentDecision::from_json(&raw)
        .with_context(|| format!("Failed to parse decision in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fixture_is_empty_store() {
        let snapshot = load_snapshot(None).unwrap();
        assert!(snapshot.rosters.is_empty());
    }

    #[test]
    fn test_snapshot_parses_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{
                "rosters": [{ "id": "r1", "organization_id": "org", "member_ids": ["u1"] }],
                "shifts": { "r1": [
                    {
                        "user_id": "u1",
                        "start": "2025-03-03T08:00:00",
                        "end": "2025-03-03T16:00:00"
                    }
                ] }
            }"#,
        )
        .unwrap();
        let snapshot = load_snapshot(Some(&path)).unwrap();
        assert_eq!(snapshot.rosters[0].member_ids, vec!["u1".to_string()]);
        assert_eq!(snapshot.shifts["r1"].len(), 1);
        assert!(snapshot.budgets.is_empty());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proposal.json");
        std::fs::write(&path, r#"{ "type": "shift_teleport" }"#).unwrap();
        let err = load_proposal(&path).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("proposal"));
        assert!(message.contains("proposal.json"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_edits(&dir.path().join("absent.json")).is_err());
    }
}
