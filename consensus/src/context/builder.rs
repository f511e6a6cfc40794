//! Builds a [`DecisionContext`] from a proposal and the roster store.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;

use super::store::RosterStore;
use super::DecisionContext;
use crate::config::ComplianceConfig;
use crate::error::{ConsensusError, EngineResult};
use crate::model::Proposal;

/// Pure read: fetches the roster's shifts, member preferences and budget.
pub struct ContextBuilder {
    store: Arc<dyn RosterStore>,
    compliance: ComplianceConfig,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn RosterStore>, compliance: ComplianceConfig) -> Self {
        Self { store, compliance }
    }

    /// Without a roster id the context is empty apart from the proposal;
    /// evaluators fall back to neutral scores.
    pub async fn build(
        &self,
        proposal: &Proposal,
        roster_id: Option<&str>,
        as_of: NaiveDateTime,
    ) -> EngineResult<DecisionContext> {
        let ctx =
            DecisionContext::new(proposal.clone(), as_of).with_compliance(self.compliance.clone());
        let Some(roster_id) = roster_id else {
            debug!("no roster given, building empty context");
            return Ok(ctx);
        };

        let roster = self
            .store
            .find_roster(roster_id)
            .await?
            .ok_or_else(|| ConsensusError::RosterNotFound(roster_id.to_string()))?;

        let affected = proposal.affected_users();
        if let Some(missing) = affected.iter().find(|u| !roster.member_ids.contains(u)) {
            return Err(ConsensusError::UserNotFound {
                user_id: missing.clone(),
                roster_id: roster_id.to_string(),
            });
        }

        let shifts: Vec<_> = self
            .store
            .shifts_by_roster(roster_id)
            .await?
            .into_iter()
            .filter(|s| !proposal.supersedes(s))
            .collect();

        let preferences = self.store.preferences_for_users(&roster.member_ids).await?;

        let budget_day = proposal
            .candidate_shifts()
            .iter()
            .map(|s| s.date())
            .min()
            .unwrap_or_else(|| as_of.date());
        let budget = self
            .store
            .labor_budget(&roster.organization_id, roster.location_id.as_deref(), budget_day)
            .await?;

        debug!(
            roster_id,
            shifts = shifts.len(),
            preferences = preferences.len(),
            has_budget = budget.is_some(),
            "decision context built"
        );

        let mut ctx = ctx
            .with_roster_id(roster_id)
            .with_shifts(shifts)
            .with_preferences(preferences);
        if let Some(budget) = budget {
            ctx = ctx.with_budget(budget);
        }
        Ok(ctx)
    }
}
