//! End-to-end scenarios through the engine and the evaluators.

mod common;

use chrono::{Duration, Weekday};
use common::{at, engine, request, shift, AS_OF};
use roster_consensus::agents::compliance::{ComplianceAgent, DAILY_REST};
use roster_consensus::agents::operations::{OperationsAgent, COVERAGE};
use roster_consensus::agents::shared::weighted_score;
use roster_consensus::agents::welfare::PREFERENCE_MATCH;
use roster_consensus::aggregate::FinalDecision;
use roster_consensus::model::{Impact, ScoringComponent, Severity};
use roster_consensus::transparent::AgentEvaluation;
use roster_consensus::{
    AgentRole, DecisionContext, EmployeePreference, Evaluator, MemoryAuditSink, Proposal,
    Recommendation, Shift,
};
use std::sync::Arc;

fn evaluation(evaluations: &[AgentEvaluation], role: AgentRole) -> &AgentEvaluation {
    evaluations.iter().find(|e| e.role() == role).unwrap()
}

fn component<'a>(evaluation: &'a AgentEvaluation, name: &str) -> &'a ScoringComponent {
    evaluation.components.iter().find(|c| c.name == name).unwrap()
}

#[tokio::test]
async fn test_short_rest_is_rejected_by_compliance() {
    let existing = shift("u1", "2025-03-03 08:00", "2025-03-03 16:00");
    let proposed = shift("u1", "2025-03-03 18:00", "2025-03-03 22:00");
    let engine = engine(vec![existing], vec![]);

    let decision = engine
        .get_transparent_decision(request(Proposal::assign(proposed)))
        .await
        .unwrap();

    let compliance = evaluation(&decision.evaluations, AgentRole::Compliance);
    let rest = component(compliance, DAILY_REST);
    assert_eq!(rest.score, 0.0);
    assert!(rest.reasoning.contains("VIOLATION"));
    assert!(rest.reasoning.contains("11"));
    assert_eq!(compliance.decision.recommendation, Recommendation::Reject);
    assert_eq!(compliance.decision.confidence, 90.0);

    let result = &decision.consensus;
    assert_eq!(result.final_decision, FinalDecision::Reject);
    assert!(!result.debate_rounds.is_empty());
    let welfare = result
        .agent_decisions
        .iter()
        .find(|d| d.agent_role == AgentRole::EmployeeWelfare)
        .unwrap();
    assert_eq!(welfare.effective_recommendation(), Recommendation::Reject);
    assert_eq!(welfare.score_breakdown.len(), 4);
}

#[test]
fn test_daily_rest_component_tracks_gap() {
    let existing = shift("u1", "2025-03-03 08:00", "2025-03-03 16:00");
    for gap in 1..=20 {
        let start = at("2025-03-03 16:00") + Duration::hours(gap);
        let candidate = Shift::new("u1", start, start + Duration::hours(4));
        let ctx = DecisionContext::new(Proposal::assign(candidate), at(AS_OF))
            .with_shifts(vec![existing.clone()]);

        let components = ComplianceAgent.scoring_components(&ctx);
        let rest = components.iter().find(|c| c.name == DAILY_REST).unwrap();
        if gap < 11 {
            assert_eq!(rest.score, 0.0, "gap {}h", gap);
            let decision = ComplianceAgent.evaluate(&ctx);
            assert_eq!(decision.recommendation, Recommendation::Reject);
            assert_eq!(decision.confidence, 90.0);
        } else {
            assert_eq!(rest.score, 100.0, "gap {}h", gap);
        }
    }
}

#[test]
fn test_weighted_score_ignores_component_order() {
    let components = vec![
        ScoringComponent::new("Coverage", 0.35, true).scored(60.0, ""),
        ScoringComponent::new("Skill Match", 0.25, true).scored(75.0, ""),
        ScoringComponent::new("Efficiency", 0.25, true).scored(90.0, ""),
        ScoringComponent::new("Continuity", 0.15, true).scored(85.0, ""),
        ScoringComponent::new("Extra", 0.7, true).scored(33.3, ""),
    ];
    let expected = weighted_score(&components);
    for rotation in 0..components.len() {
        let mut permuted = components.clone();
        permuted.rotate_left(rotation);
        assert_eq!(weighted_score(&permuted), expected);
        permuted.reverse();
        assert_eq!(weighted_score(&permuted), expected);
    }
}

#[tokio::test]
async fn test_avoided_saturday_lowers_preference_match() {
    let mut preference = EmployeePreference::new("u1");
    preference.avoid_days = vec![Weekday::Sat];
    let engine = engine(vec![], vec![preference]);
    let saturday = shift("u1", "2025-03-08 10:00", "2025-03-08 16:00");

    let decision = engine
        .get_transparent_decision(request(Proposal::assign(saturday)))
        .await
        .unwrap();

    let welfare = evaluation(&decision.evaluations, AgentRole::EmployeeWelfare);
    let preference = component(welfare, PREFERENCE_MATCH);
    assert_eq!(preference.score, 40.0);
    let negative: Vec<_> = preference
        .evidence
        .iter()
        .filter(|e| e.impact == Impact::Negative)
        .collect();
    assert_eq!(negative.len(), 1);
    assert!(negative[0].description.contains("Avoided Day"));

    let ledger = decision
        .find_component(AgentRole::EmployeeWelfare, PREFERENCE_MATCH)
        .unwrap();
    assert_eq!(ledger.original_score, 40.0);
    assert!(ledger.is_editable);
}

#[test]
fn test_empty_peak_slot_fills_gap() {
    let ctx = DecisionContext::new(
        Proposal::assign(shift("u1", "2025-03-04 11:00", "2025-03-04 15:00")),
        at(AS_OF),
    );
    let components = OperationsAgent.scoring_components(&ctx);
    let coverage = components.iter().find(|c| c.name == COVERAGE).unwrap();
    assert_eq!(coverage.score, 100.0);
    assert!(coverage.reasoning.contains("fills a coverage gap"));
}

#[tokio::test]
async fn test_quick_path_is_audited() {
    let sink = Arc::new(MemoryAuditSink::new());
    let engine = engine(vec![], vec![]).with_audit_sink(sink.clone());
    let response = engine
        .get_consensus(request(Proposal::assign(shift(
            "u2",
            "2025-03-04 09:00",
            "2025-03-04 15:00",
        ))))
        .await;

    assert!(response.success);
    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(response.audit_id.as_deref(), Some(records[0].id.as_str()));
    assert!(records[0].verify());
    assert_eq!(records[0].agent_summaries.len(), 4);
    assert_eq!(records[0].requested_by, "manager-1");
}

#[tokio::test]
async fn test_non_member_fails_quick_path() {
    let response = engine(vec![], vec![])
        .get_consensus(request(Proposal::assign(shift(
            "stranger",
            "2025-03-04 09:00",
            "2025-03-04 15:00",
        ))))
        .await;
    assert!(!response.success);
    assert_eq!(response.error_code.as_deref(), Some("USER_NOT_FOUND"));
}

#[tokio::test]
async fn test_swap_leaving_receiver_short_rest_is_rejected() {
    let given = shift("u1", "2025-03-04 14:00", "2025-03-04 22:00").with_id("s1");
    let taken = shift("u2", "2025-03-07 08:00", "2025-03-07 16:00").with_id("s2");
    // u2 already opens the next morning: 8h after the swapped-in late shift
    let early = shift("u2", "2025-03-05 06:00", "2025-03-05 14:00").with_id("s3");
    let engine = engine(vec![given.clone(), taken.clone(), early], vec![]);

    let swap = Proposal::ShiftSwap {
        requesting_user_id: "u1".into(),
        target_user_id: "u2".into(),
        shift_to_swap: given,
        shift_to_receive: taken,
        reason: "Childcare".into(),
    };
    let decision = engine.get_transparent_decision(request(swap)).await.unwrap();

    let compliance = evaluation(&decision.evaluations, AgentRole::Compliance);
    assert_eq!(component(compliance, DAILY_REST).score, 0.0);
    assert!(compliance
        .decision
        .concerns
        .iter()
        .any(|c| c.severity == Severity::Critical && c.component.as_deref() == Some(DAILY_REST)));
    assert_eq!(compliance.decision.recommendation, Recommendation::Reject);
    assert_eq!(decision.consensus.final_decision, FinalDecision::Reject);
}

#[tokio::test]
async fn test_clean_swap_and_schedule_evaluate() {
    let a = shift("u1", "2025-03-04 08:00", "2025-03-04 16:00").with_id("s1");
    let b = shift("u2", "2025-03-05 08:00", "2025-03-05 16:00").with_id("s2");
    let engine = engine(vec![a.clone(), b.clone()], vec![]);

    let swap = Proposal::ShiftSwap {
        requesting_user_id: "u1".into(),
        target_user_id: "u2".into(),
        shift_to_swap: a,
        shift_to_receive: b,
        reason: "Childcare".into(),
    };
    let decision = engine.get_transparent_decision(request(swap)).await.unwrap();
    let compliance = evaluation(&decision.evaluations, AgentRole::Compliance);
    assert_eq!(component(compliance, DAILY_REST).score, 100.0);
    assert!(!compliance.decision.has_critical_concerns());

    let schedule = Proposal::ScheduleCreation {
        assignments: vec![
            shift("u3", "2025-03-10 08:00", "2025-03-10 16:00"),
            shift("u3", "2025-03-11 08:00", "2025-03-11 16:00"),
        ],
        coverage_goals: vec![],
    };
    let decision = engine.get_transparent_decision(request(schedule)).await.unwrap();
    assert_eq!(decision.evaluations.len(), 4);
    assert_eq!(decision.editable_components.len(), 5 + 3 + 4 + 4);
}

#[tokio::test]
async fn test_no_roster_gives_neutral_context() {
    let engine = engine(vec![], vec![]);
    let mut request = request(Proposal::assign(shift(
        "anyone",
        "2025-03-04 09:00",
        "2025-03-04 15:00",
    )));
    request.roster_id = None;
    let response = engine.get_consensus(request).await;
    assert!(response.success);
    assert_eq!(response.result.unwrap().agent_decisions.len(), 4);
}
