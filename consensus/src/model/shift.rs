//! Shift, preference and roster value objects.
//!
//! All timestamps are roster-local wall-clock times.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, EngineResult};

/// A single working shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    /// Persisted id, absent for shifts that only exist in a proposal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning user.
    pub user_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Unpaid break inside the shift.
    #[serde(default)]
    pub break_minutes: u32,
}

impl Shift {
    pub fn new(user_id: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            start,
            end,
            break_minutes: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_break(mut self, minutes: u32) -> Self {
        self.break_minutes = minutes;
        self
    }

    /// Working hours: `(end − start) − break`, never negative.
    pub fn working_hours(&self) -> f64 {
        let minutes = (self.end - self.start).num_minutes() - i64::from(self.break_minutes);
        minutes.max(0) as f64 / 60.0
    }

    /// Start time as fractional hour of day (08:30 → 8.5).
    pub fn start_hour(&self) -> f64 {
        f64::from(self.start.hour()) + f64::from(self.start.minute()) / 60.0
    }

    /// Calendar date the shift starts on.
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn weekday(&self) -> Weekday {
        self.start.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        is_weekend(self.weekday())
    }

    /// Whether the two shifts share any instant.
    pub fn overlaps(&self, other: &Shift) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` denotes the same roster slot: equal ids when both are
    /// persisted, otherwise the same owner and interval.
    pub fn same_slot(&self, other: &Shift) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.user_id == other.user_id && self.start == other.start && self.end == other.end
            }
        }
    }

    /// Copy of this shift owned by another user.
    pub fn reassigned_to(&self, user_id: &str) -> Shift {
        Shift {
            user_id: user_id.to_string(),
            ..self.clone()
        }
    }

    /// Reject shapes no evaluator can reason about.
    pub fn validate(&self) -> EngineResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(ConsensusError::InvalidProposal(
                "shift has no owning user".to_string(),
            ));
        }
        if self.end <= self.start {
            return Err(ConsensusError::InvalidProposal(format!(
                "shift for {} ends ({}) before it starts ({})",
                self.user_id, self.end, self.start
            )));
        }
        let duration_minutes = (self.end - self.start).num_minutes();
        if i64::from(self.break_minutes) >= duration_minutes {
            return Err(ConsensusError::InvalidProposal(format!(
                "break of {} minutes does not fit a {} minute shift",
                self.break_minutes, duration_minutes
            )));
        }
        Ok(())
    }
}

/// Saturday or Sunday.
pub fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Part of the day a shift starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPeriod {
    /// 05:00–12:00
    Morning,
    /// 12:00–16:00
    Afternoon,
    /// 16:00–22:00
    Evening,
    /// 22:00–05:00
    Night,
}

impl ShiftPeriod {
    pub fn of(shift: &Shift) -> Self {
        match shift.start.hour() {
            5..=11 => Self::Morning,
            12..=15 => Self::Afternoon,
            16..=21 => Self::Evening,
            _ => Self::Night,
        }
    }
}

impl std::fmt::Display for ShiftPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Afternoon => write!(f, "afternoon"),
            Self::Evening => write!(f, "evening"),
            Self::Night => write!(f, "night"),
        }
    }
}

/// Declared interval in which the employee cannot work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unavailability {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    #[serde(default)]
    pub reason: String,
}

impl Unavailability {
    pub fn covers(&self, shift: &Shift) -> bool {
        shift.start < self.to && self.from < shift.end
    }
}

/// Optional per-user scheduling preferences. A missing record means neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeePreference {
    pub user_id: String,
    pub preferred_days: Vec<Weekday>,
    pub avoid_days: Vec<Weekday>,
    pub prefers_morning: bool,
    pub prefers_evening: bool,
    pub prefers_night: bool,
    pub min_hours_per_week: Option<f64>,
    pub max_hours_per_week: Option<f64>,
    pub unavailable: Option<Unavailability>,
}

impl EmployeePreference {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Whether any time-of-day affinity was declared.
    pub fn has_period_affinity(&self) -> bool {
        self.prefers_morning || self.prefers_evening || self.prefers_night
    }

    /// Whether the declared affinities include `period`.
    pub fn likes_period(&self, period: ShiftPeriod) -> bool {
        match period {
            ShiftPeriod::Morning => self.prefers_morning,
            ShiftPeriod::Evening => self.prefers_evening,
            ShiftPeriod::Night => self.prefers_night,
            ShiftPeriod::Afternoon => false,
        }
    }
}

/// A roster: the unit of scheduling that owns shifts and members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub organization_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Labour budget for an organisation (optionally a single location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborBudget {
    pub organization_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Total budget for the period.
    pub amount: f64,
    /// Default hourly wage used to cost shifts.
    pub hourly_rate: f64,
    /// Multiplier applied to overtime hours.
    #[serde(default = "default_overtime_multiplier")]
    pub overtime_multiplier: f64,
}

fn default_overtime_multiplier() -> f64 {
    1.4
}

impl LaborBudget {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_working_hours_subtracts_break() {
        let shift = Shift::new("u1", at("2025-03-03", "08:00"), at("2025-03-03", "16:00"))
            .with_break(30);
        assert!((shift.working_hours() - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_inverted_interval() {
        let shift = Shift::new("u1", at("2025-03-03", "16:00"), at("2025-03-03", "08:00"));
        assert!(matches!(
            shift.validate(),
            Err(ConsensusError::InvalidProposal(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_break() {
        let shift = Shift::new("u1", at("2025-03-03", "08:00"), at("2025-03-03", "09:00"))
            .with_break(60);
        assert!(shift.validate().is_err());
    }

    #[test]
    fn test_period_classification() {
        let morning = Shift::new("u1", at("2025-03-03", "07:00"), at("2025-03-03", "15:00"));
        let evening = Shift::new("u1", at("2025-03-03", "17:00"), at("2025-03-03", "23:00"));
        let night = Shift::new("u1", at("2025-03-03", "23:00"), at("2025-03-04", "07:00"));
        assert_eq!(ShiftPeriod::of(&morning), ShiftPeriod::Morning);
        assert_eq!(ShiftPeriod::of(&evening), ShiftPeriod::Evening);
        assert_eq!(ShiftPeriod::of(&night), ShiftPeriod::Night);
    }

    #[test]
    fn test_same_slot_prefers_ids() {
        let a = Shift::new("u1", at("2025-03-03", "08:00"), at("2025-03-03", "16:00"))
            .with_id("s1");
        let b = a.reassigned_to("u2");
        assert!(a.same_slot(&b));

        let c = Shift::new("u1", at("2025-03-03", "08:00"), at("2025-03-03", "16:00"));
        assert!(a.same_slot(&c));
        assert!(!b.same_slot(&c));
    }

    #[test]
    fn test_weekend() {
        let saturday = Shift::new("u1", at("2025-03-08", "08:00"), at("2025-03-08", "16:00"));
        assert!(saturday.is_weekend());
        assert!(!is_weekend(Weekday::Fri));
    }

    #[test]
    fn test_preference_days_deserialize_from_names() {
        let json = r#"{"user_id":"u1","avoid_days":["Saturday"],"prefers_morning":true}"#;
        let pref: EmployeePreference = serde_json::from_str(json).unwrap();
        assert_eq!(pref.avoid_days, vec![Weekday::Sat]);
        assert!(pref.has_period_affinity());
        assert!(pref.preferred_days.is_empty());
    }
}
