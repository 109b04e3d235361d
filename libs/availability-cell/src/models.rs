use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// A recurring weekly working window for one doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    /// Weekday token as stored. The store carries Portuguese or English names
    /// (and legacy numeric day codes); always compare through
    /// `weekday::canonical_weekday`, never directly.
    #[serde(alias = "day_of_week", alias = "dia_semana", deserialize_with = "de_weekday")]
    pub weekday: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(alias = "duration_minutes")]
    pub slot_minutes: i32,
    pub appointment_type: AppointmentType,
    #[serde(alias = "is_active", default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

// Older rows carry day_of_week as a bare number; newer ones as a name.
fn de_weekday<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawWeekday {
        Name(String),
        Code(i64),
    }

    Ok(match RawWeekday::deserialize(deserializer)? {
        RawWeekday::Name(name) => name,
        RawWeekday::Code(code) => code.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[serde(alias = "presencial", alias = "in-person")]
    InPerson,
    #[serde(alias = "telemedicina")]
    Telemedicine,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InPerson => write!(f, "in_person"),
            AppointmentType::Telemedicine => write!(f, "telemedicine"),
        }
    }
}

/// A date-specific override to a doctor's weekly schedule.
///
/// Both times absent means the whole day is covered. Date and times stay raw
/// strings here: one malformed row must never poison a fetched batch, so the
/// conflict scan re-parses per row and skips what it cannot read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default, alias = "exception_date", alias = "data")]
    pub date: Option<String>,
    #[serde(default, alias = "hora_inicio")]
    pub start_time: Option<String>,
    #[serde(default, alias = "hora_fim")]
    pub end_time: Option<String>,
    #[serde(alias = "tipo")]
    pub kind: ExceptionKind,
    #[serde(default, alias = "motivo")]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AvailabilityException {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
    }

    pub fn is_whole_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    #[serde(alias = "bloqueio")]
    Block,
    #[serde(alias = "liberacao", alias = "liberação")]
    Release,
}

// ==============================================================================
// CONFLICT DECISION
// ==============================================================================

/// Outcome of checking a candidate slot against a doctor's exceptions.
/// Computed fresh on every create/update attempt, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictCheckResult {
    pub blocked: bool,
    pub blocking_date: Option<NaiveDate>,
    pub blocking_times: Option<String>,
    pub reason: Option<String>,
}

impl ConflictCheckResult {
    pub fn clear() -> Self {
        Self {
            blocked: false,
            blocking_date: None,
            blocking_times: None,
            reason: None,
        }
    }

    pub fn whole_day(date: NaiveDate, reason: Option<String>) -> Self {
        Self {
            blocked: true,
            blocking_date: Some(date),
            blocking_times: None,
            reason,
        }
    }

    pub fn window(date: NaiveDate, times: String, reason: Option<String>) -> Self {
        Self {
            blocked: true,
            blocking_date: Some(date),
            blocking_times: Some(times),
            reason,
        }
    }
}

/// What a create/update attempt produced: either the saved row, or the
/// conflict that blocked it. A blocked candidate is an expected business
/// outcome, not an error.
#[derive(Debug)]
pub enum AvailabilityOutcome {
    Saved(WeeklyAvailability),
    Blocked(ConflictCheckResult),
}

// ==============================================================================
// REQUEST DTOS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub weekday: String,
    pub start_time: String,
    pub end_time: String,
    pub slot_minutes: i32,
    pub appointment_type: AppointmentType,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub weekday: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub slot_minutes: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub kind: ExceptionKind,
    pub reason: Option<String>,
}
