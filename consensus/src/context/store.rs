//! Roster data collaborator.
//!
//! The engine only reads through [`RosterStore`]; persistence lives elsewhere.
//! [`MemoryRosterStore`] serves fixtures and tests.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::model::{EmployeePreference, LaborBudget, Roster, Shift};

/// Read-only queries the context builder needs. Collections may be empty.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn find_roster(&self, roster_id: &str) -> EngineResult<Option<Roster>>;

    async fn shifts_by_roster(&self, roster_id: &str) -> EngineResult<Vec<Shift>>;

    async fn preferences_for_users(
        &self,
        user_ids: &[String],
    ) -> EngineResult<Vec<EmployeePreference>>;

    /// Budget in force on `on` for the organisation, preferring one scoped to
    /// `location_id` over an organisation-wide one.
    async fn labor_budget(
        &self,
        organization_id: &str,
        location_id: Option<&str>,
        on: NaiveDate,
    ) -> EngineResult<Option<LaborBudget>>;
}

/// Serialisable dump of roster data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub rosters: Vec<Roster>,
    /// Shifts keyed by roster id.
    pub shifts: BTreeMap<String, Vec<Shift>>,
    pub preferences: Vec<EmployeePreference>,
    pub budgets: Vec<LaborBudget>,
}

/// In-memory [`RosterStore`] over a [`StoreSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRosterStore {
    snapshot: StoreSnapshot,
}

impl MemoryRosterStore {
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn find_roster(&self, roster_id: &str) -> EngineResult<Option<Roster>> {
        Ok(self
            .snapshot
            .rosters
            .iter()
            .find(|r| r.id == roster_id)
            .cloned())
    }

    async fn shifts_by_roster(&self, roster_id: &str) -> EngineResult<Vec<Shift>> {
        Ok(self
            .snapshot
            .shifts
            .get(roster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn preferences_for_users(
        &self,
        user_ids: &[String],
    ) -> EngineResult<Vec<EmployeePreference>> {
        let wanted: HashSet<&str> = user_ids.iter().map(String::as_str).collect();
        Ok(self
            .snapshot
            .preferences
            .iter()
            .filter(|p| wanted.contains(p.user_id.as_str()))
            .cloned()
            .collect())
    }

    async fn labor_budget(
        &self,
        organization_id: &str,
        location_id: Option<&str>,
        on: NaiveDate,
    ) -> EngineResult<Option<LaborBudget>> {
        let in_force = |b: &&LaborBudget| b.organization_id == organization_id && b.covers(on);
        let scoped = location_id.and_then(|loc| {
            self.snapshot
                .budgets
                .iter()
                .filter(in_force)
                .find(|b| b.location_id.as_deref() == Some(loc))
        });
        let budget = scoped.or_else(|| {
            self.snapshot
                .budgets
                .iter()
                .filter(in_force)
                .find(|b| b.location_id.is_none())
        });
        Ok(budget.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(location: Option<&str>, amount: f64) -> LaborBudget {
        LaborBudget {
            organization_id: "org".into(),
            location_id: location.map(String::from),
            period_start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            amount,
            hourly_rate: 250.0,
            overtime_multiplier: 1.4,
        }
    }

    #[tokio::test]
    async fn test_location_budget_preferred() {
        let store = MemoryRosterStore::from_snapshot(StoreSnapshot {
            budgets: vec![budget(None, 1000.0), budget(Some("oslo"), 500.0)],
            ..Default::default()
        });
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let scoped = store.labor_budget("org", Some("oslo"), day).await.unwrap();
        assert_eq!(scoped.map(|b| b.amount), Some(500.0));

        let fallback = store.labor_budget("org", Some("bergen"), day).await.unwrap();
        assert_eq!(fallback.map(|b| b.amount), Some(1000.0));

        let outside = store
            .labor_budget("org", None, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap())
            .await
            .unwrap();
        assert!(outside.is_none());
    }

    #[tokio::test]
    async fn test_unknown_roster_has_no_shifts() {
        let store = MemoryRosterStore::default();
        assert!(store.find_roster("r1").await.unwrap().is_none());
        assert!(store.shifts_by_roster("r1").await.unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_deserializes_with_missing_sections() {
        let snapshot: StoreSnapshot =
            serde_json::from_str(r#"{"rosters":[{"id":"r1","organization_id":"org"}]}"#).unwrap();
        assert_eq!(snapshot.rosters.len(), 1);
        assert!(snapshot.shifts.is_empty());
    }
}
