// libs/appointment-cell/src/services/booking.rs
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{weekday_index, ScheduleError};
use doctor_cell::services::doctor::DoctorService;
use doctor_cell::services::schedule::ScheduleService;
use shared_config::AppConfig;
use shared_database::supabase::{is_conflict, SupabaseClient};
use shared_models::auth::{User, UserRole};

use crate::models::{
    Appointment, AppointmentError, AppointmentQueryParams, AppointmentStatus,
    BookAppointmentRequest,
};
use crate::services::validation::{validate_booking, BookingCandidate};

pub struct BookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    schedule: ScheduleService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            schedule: ScheduleService::new(config),
        }
    }

    /// Book a pending appointment. Validation runs against the doctor's
    /// schedule first; the insert still races against concurrent bookings,
    /// so a storage-level conflict is reported as `SlotJustTaken` rather
    /// than propagated as a fault.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} at {}",
            request.patient_id, request.doctor_id, request.appointment_date, request.appointment_time
        );

        let doctor = self
            .doctors
            .get_doctor(&request.doctor_id.to_string(), auth_token)
            .await
            .map_err(map_schedule_error)?;

        let blocks = self
            .schedule
            .active_blocks_for_weekday(
                &doctor.id.to_string(),
                weekday_index(request.appointment_date),
                auth_token,
            )
            .await
            .map_err(map_schedule_error)?;

        let windows = self
            .schedule
            .windows_for_date(&doctor.id.to_string(), request.appointment_date, auth_token)
            .await
            .map_err(map_schedule_error)?;

        let existing = self
            .day_appointments(&doctor.id.to_string(), request.appointment_date, auth_token)
            .await?;

        let candidate = BookingCandidate {
            doctor_id: request.doctor_id,
            date: request.appointment_date,
            time: request.appointment_time,
            exclude: None,
        };
        validate_booking(&candidate, &blocks, &windows, &existing)?;

        let appointment_data = json!({
            "doctor_id": request.doctor_id,
            "patient_id": request.patient_id,
            "appointment_date": request.appointment_date.format("%Y-%m-%d").to_string(),
            "appointment_time": request.appointment_time.format("%H:%M:%S").to_string(),
            "status": AppointmentStatus::Pending.to_string(),
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| {
                // The partial unique index on non-canceled (doctor, date,
                // time) is the race backstop; losing the race is a normal
                // booking failure.
                if is_conflict(&e) {
                    warn!(
                        "Concurrent booking lost the race for doctor {} at {} {}",
                        request.doctor_id, request.appointment_date, request.appointment_time
                    );
                    AppointmentError::SlotJustTaken
                } else {
                    AppointmentError::DatabaseError(e.to_string())
                }
            })?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Empty insert response".to_string()))?;
        let appointment: Appointment =
            serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// Cancel an appointment. A patient may only cancel their own, and
    /// canceling one already in the past is a no-op (status unchanged).
    /// Staff and admin may cancel at any time.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        let is_owner = appointment.patient_id.to_string() == user.id;
        match user.role {
            Some(UserRole::Staff) | Some(UserRole::Admin) => {}
            Some(UserRole::Patient) if is_owner => {
                if appointment.is_past(Utc::now().naive_utc()) {
                    debug!("Cancel of past appointment {} is a no-op", appointment_id);
                    return Ok(appointment);
                }
            }
            _ => return Err(AppointmentError::Unauthorized),
        }

        if appointment.is_canceled() {
            return Ok(appointment);
        }

        self.set_status(appointment_id, AppointmentStatus::Canceled, auth_token)
            .await
    }

    /// Staff check-in: pending becomes confirmed. Re-checking-in a
    /// confirmed appointment is a no-op; a canceled one cannot be revived.
    pub async fn check_in_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        match appointment.status {
            AppointmentStatus::Pending => {
                self.set_status(appointment_id, AppointmentStatus::Confirmed, auth_token)
                    .await
            }
            AppointmentStatus::Confirmed => Ok(appointment),
            AppointmentStatus::Canceled => {
                Err(AppointmentError::InvalidStatusTransition(appointment.status))
            }
        }
    }

    /// Agenda listings for dashboards, filtered and ordered by date/time.
    pub async fn search_appointments(
        &self,
        params: &AppointmentQueryParams,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = String::from("/rest/v1/appointments?");
        if let Some(doctor_id) = params.doctor_id {
            path.push_str(&format!("doctor_id=eq.{}&", doctor_id));
        }
        if let Some(patient_id) = params.patient_id {
            path.push_str(&format!("patient_id=eq.{}&", patient_id));
        }
        if let Some(date) = params.date {
            path.push_str(&format!("appointment_date=eq.{}&", date));
        }
        if let Some(status) = params.status {
            path.push_str(&format!("status=eq.{}&", status));
        }
        path.push_str("order=appointment_date.asc,appointment_time.asc");

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    /// Non-canceled appointments for (doctor, date), the validator's context.
    async fn day_appointments(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=in.(pending,confirmed)",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Setting appointment {} status to {}", appointment_id, status);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let update = json!({
            "status": status.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}

fn map_schedule_error(e: ScheduleError) -> AppointmentError {
    match e {
        ScheduleError::DoctorNotFound => AppointmentError::DoctorNotFound,
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}
