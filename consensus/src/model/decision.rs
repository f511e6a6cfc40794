//! Evaluator output: roles, recommendations, scoring components and evidence.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The four evaluator perspectives. The set is closed: vote weights are keyed
/// by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Compliance,
    Cost,
    EmployeeWelfare,
    Operations,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Compliance,
        AgentRole::Cost,
        AgentRole::EmployeeWelfare,
        AgentRole::Operations,
    ];

    /// Persona name shown to reviewers.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Self::Compliance => "Compliance Officer",
            Self::Cost => "Cost Controller",
            Self::EmployeeWelfare => "Employee Advocate",
            Self::Operations => "Operations Planner",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Compliance => "Working-time law: rest periods, hour caps, overtime ceilings",
            Self::Cost => "Labour cost: overtime premiums, budget adherence, shift economics",
            Self::EmployeeWelfare => {
                "Employee wellbeing: preferences, fairness, work-life balance, stability"
            }
            Self::Operations => "Service delivery: coverage, skills, efficiency, continuity",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compliance => write!(f, "compliance"),
            Self::Cost => write!(f, "cost"),
            Self::EmployeeWelfare => write!(f, "employee_welfare"),
            Self::Operations => write!(f, "operations"),
        }
    }
}

/// Discrete recommendation an evaluator gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    ApproveWithConditions,
    NeedsModification,
    Reject,
}

impl Recommendation {
    /// Counts toward the approve bucket of the vote.
    pub fn is_approval(self) -> bool {
        matches!(self, Self::Approve | Self::ApproveWithConditions)
    }

    pub fn is_rejection(self) -> bool {
        self == Self::Reject
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::ApproveWithConditions => write!(f, "approve_with_conditions"),
            Self::NeedsModification => write!(f, "needs_modification"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Category of an evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Rule,
    Data,
    Calculation,
    Preference,
    Pattern,
    Risk,
}

/// Direction an evidence item pushed the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

/// Atomic unit of explanation behind a score change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceReference {
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub source: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub impact: Impact,
    pub weight: f64,
}

impl EvidenceReference {
    pub fn new(
        kind: EvidenceKind,
        source: impl Into<String>,
        description: impl Into<String>,
        impact: Impact,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            description: description.into(),
            value: None,
            impact,
            weight: 1.0,
        }
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// One named, weighted sub-score of an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringComponent {
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    /// Relative weight; weights of one evaluator need not sum to 1.
    pub weight: f64,
    pub evidence: Vec<EvidenceReference>,
    pub reasoning: String,
    /// False for components tied to non-negotiable legal rules.
    pub user_editable: bool,
}

impl ScoringComponent {
    pub fn new(name: impl Into<String>, weight: f64, user_editable: bool) -> Self {
        Self {
            name: name.into(),
            score: 100.0,
            max_score: 100.0,
            weight,
            evidence: Vec::new(),
            reasoning: String::new(),
            user_editable,
        }
    }

    pub fn scored(mut self, score: f64, reasoning: impl Into<String>) -> Self {
        self.score = score.clamp(0.0, self.max_score);
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<EvidenceReference>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Score normalised to a 0–100 scale.
    pub fn normalized(&self) -> f64 {
        if self.max_score <= 0.0 {
            0.0
        } else {
            self.score / self.max_score * 100.0
        }
    }
}

/// How serious a concern is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// A concern raised by an evaluator, optionally tied to one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concern {
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl Concern {
    pub fn critical(component: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Critical,
            component: Some(component.to_string()),
        }
    }

    pub fn warning(component: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
            component: Some(component.to_string()),
        }
    }

    /// Concern about the proposal as a whole.
    pub fn general(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            component: None,
        }
    }
}

/// One evaluator's decision on a proposal.
///
/// Debate revisions never overwrite `recommendation`/`confidence`; they are
/// recorded alongside so both stay retrievable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub agent_role: AgentRole,
    pub agent_name: String,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub score: f64,
    pub score_breakdown: BTreeMap<String, f64>,
    pub reasoning: Vec<String>,
    pub concerns: Vec<Concern>,
    pub suggestions: Vec<String>,
    pub evaluated_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_recommendation: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_in_round: Option<u32>,
}

impl AgentDecision {
    /// Recommendation after any debate revision.
    pub fn effective_recommendation(&self) -> Recommendation {
        self.revised_recommendation.unwrap_or(self.recommendation)
    }

    /// Confidence after any debate revision.
    pub fn effective_confidence(&self) -> f64 {
        self.revised_confidence.unwrap_or(self.confidence)
    }

    pub fn is_revised(&self) -> bool {
        self.revised_recommendation.is_some()
    }

    pub fn has_critical_concerns(&self) -> bool {
        self.concerns.iter().any(|c| c.severity == Severity::Critical)
    }

    pub fn has_warnings(&self) -> bool {
        self.concerns.iter().any(|c| c.severity == Severity::Warning)
    }

    /// A copy carrying a debate revision; the original values are kept.
    pub fn revised(&self, recommendation: Recommendation, confidence: f64, round: u32) -> Self {
        Self {
            revised_recommendation: Some(recommendation),
            revised_confidence: Some(confidence),
            revised_in_round: Some(round),
            ..self.clone()
        }
    }

    /// Concern messages in raised order.
    pub fn concern_messages(&self) -> impl Iterator<Item = &str> {
        self.concerns.iter().map(|c| c.message.as_str())
    }
}
