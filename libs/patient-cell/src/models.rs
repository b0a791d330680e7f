// libs/patient-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::Appointment;
use visit_cell::models::{Prescription, Visit};

/// Patient profile row. The id is the Supabase auth user id, so
/// ownership checks compare it directly against the token subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: Option<String>,
    pub date_of_birth: NaiveDate,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub phone_number: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub current_medications: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: Option<String>,
    pub date_of_birth: NaiveDate,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub phone_number: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub current_medications: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub patient: Patient,
    pub upcoming_appointments: Vec<Appointment>,
    pub recent_visits: Vec<Visit>,
    pub recent_prescriptions: Vec<Prescription>,
}

// ==============================================================================
// VALIDATION
// ==============================================================================

pub fn validate_date_of_birth(dob: NaiveDate, today: NaiveDate) -> Result<(), PatientError> {
    if dob > today {
        return Err(PatientError::ValidationError(
            "Date of birth cannot be in the future".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_pincode(pincode: &str) -> Result<(), PatientError> {
    if pincode.len() != 6 || !pincode.chars().all(|c| c.is_ascii_digit()) {
        return Err(PatientError::ValidationError(
            "Pincode must be exactly 6 digits".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_phone_number(phone: &str) -> Result<(), PatientError> {
    if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(PatientError::ValidationError(
            "Phone number must be exactly 10 digits".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("A patient profile already exists for this email")]
    EmailTaken,

    #[error("A patient profile already exists for this account")]
    ProfileExists,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn dob_today_or_earlier_is_accepted() {
        let today = d(2026, 8, 29);
        assert!(validate_date_of_birth(d(1990, 4, 12), today).is_ok());
        assert!(validate_date_of_birth(today, today).is_ok());
    }

    #[test]
    fn future_dob_is_rejected() {
        let today = d(2026, 8, 29);
        let err = validate_date_of_birth(d(2026, 8, 30), today).unwrap_err();
        assert_matches!(err, PatientError::ValidationError(_));
    }

    #[test]
    fn pincode_must_be_six_digits() {
        assert!(validate_pincode("411001").is_ok());
        assert_matches!(validate_pincode("41100").unwrap_err(), PatientError::ValidationError(_));
        assert_matches!(validate_pincode("4110011").unwrap_err(), PatientError::ValidationError(_));
        assert_matches!(validate_pincode("41100a").unwrap_err(), PatientError::ValidationError(_));
    }

    #[test]
    fn phone_number_must_be_ten_digits() {
        assert!(validate_phone_number("9876543210").is_ok());
        assert_matches!(
            validate_phone_number("987654321").unwrap_err(),
            PatientError::ValidationError(_)
        );
        assert_matches!(
            validate_phone_number("98765432100").unwrap_err(),
            PatientError::ValidationError(_)
        );
        assert_matches!(
            validate_phone_number("98765x3210").unwrap_err(),
            PatientError::ValidationError(_)
        );
    }
}
