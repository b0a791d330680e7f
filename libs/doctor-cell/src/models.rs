// libs/doctor-cell/src/models.rs
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CONSULTATION_MINUTES: i32 = 15;

/// Weekday index as stored in working-hour rows: 0 = Monday .. 6 = Sunday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub years_of_experience: i32,
    pub registration_no: Option<String>,
    pub consultation_duration_min: i32,
    /// 0 means no daily cap.
    pub max_daily_appointments: i32,
    pub clinic_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Step between slots; falls back to the default when unset.
    pub fn slot_step_minutes(&self) -> i64 {
        if self.consultation_duration_min > 0 {
            self.consultation_duration_min as i64
        } else {
            DEFAULT_CONSULTATION_MINUTES as i64
        }
    }
}

/// A recurring weekly interval during which a doctor accepts appointments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkingHours {
    /// Block membership. The end of the block is exclusive, matching
    /// slot generation, so every bookable time is a generatable slot.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

/// A one-off exception removing availability within or across a date.
/// A window with no times blocks the whole day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unavailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unavailability {
    pub fn blocks(&self, time: NaiveTime) -> bool {
        match (self.start_time, self.end_time) {
            (None, None) => true,
            (Some(start), Some(end)) => start <= time && time <= end,
            // Half-open windows are rejected on creation; treat a stray
            // one as whole-day rather than silently ignoring it.
            _ => true,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkingHoursRequest {
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUnavailabilityRequest {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

/// A discrete bookable time point derived from a working-hour block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub time: NaiveTime,
    pub label: String,
    pub booked: bool,
    pub blocked: bool,
}

impl Slot {
    pub fn new(time: NaiveTime, booked: bool, blocked: bool) -> Self {
        Self {
            time,
            label: time.format("%H:%M").to_string(),
            booked,
            blocked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Working-hours block not found")]
    BlockNotFound,

    #[error("Start time must be before end time")]
    InvalidTimeRange,

    #[error("Weekday must be between 0 (Monday) and 6 (Sunday)")]
    InvalidWeekday,

    #[error("An identical working-hours block already exists")]
    DuplicateBlock,

    #[error("An identical unavailability window already exists")]
    DuplicateWindow,

    #[error("Unavailability needs either both times or neither")]
    InvalidWindow,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
