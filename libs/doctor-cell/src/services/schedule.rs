use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateUnavailabilityRequest, CreateWorkingHoursRequest, ScheduleError, Unavailability,
    WorkingHours,
};

/// CRUD over working-hour blocks and unavailability windows, enforcing
/// the schedule invariants before the database constraints get a say.
pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_working_hours(
        &self,
        doctor_id: &str,
        request: CreateWorkingHoursRequest,
        auth_token: &str,
    ) -> Result<WorkingHours, ScheduleError> {
        debug!("Creating working-hours block for doctor: {}", doctor_id);

        if request.weekday > 6 {
            return Err(ScheduleError::InvalidWeekday);
        }
        if request.start_time >= request.end_time {
            return Err(ScheduleError::InvalidTimeRange);
        }

        // Duplicate (doctor, weekday, start, end) pre-check; the unique
        // constraint in the schema is the backstop.
        let dup_path = format!(
            "/rest/v1/doctor_working_hours?doctor_id=eq.{}&weekday=eq.{}&start_time=eq.{}&end_time=eq.{}",
            doctor_id,
            request.weekday,
            request.start_time.format("%H:%M:%S"),
            request.end_time.format("%H:%M:%S"),
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &dup_path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
        if !existing.is_empty() {
            return Err(ScheduleError::DuplicateBlock);
        }

        let block_data = json!({
            "doctor_id": doctor_id,
            "weekday": request.weekday,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "is_active": request.is_active.unwrap_or(true),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_working_hours",
                Some(auth_token),
                Some(block_data),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::DatabaseError("Empty insert response".to_string()))?;
        serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string()))
    }

    pub async fn list_working_hours(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_working_hours?doctor_id=eq.{}&order=weekday.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string())))
            .collect()
    }

    pub async fn delete_working_hours(
        &self,
        block_id: &str,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting working-hours block: {}", block_id);

        let path = format!("/rest/v1/doctor_working_hours?id=eq.{}", block_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub async fn create_unavailability(
        &self,
        doctor_id: &str,
        request: CreateUnavailabilityRequest,
        auth_token: &str,
    ) -> Result<Unavailability, ScheduleError> {
        debug!("Creating unavailability for doctor {} on {}", doctor_id, request.date);

        match (request.start_time, request.end_time) {
            (None, None) => {}
            (Some(start), Some(end)) => {
                if start >= end {
                    return Err(ScheduleError::InvalidTimeRange);
                }
            }
            _ => return Err(ScheduleError::InvalidWindow),
        }

        let mut dup_path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&date=eq.{}",
            doctor_id, request.date
        );
        match request.start_time {
            Some(start) => dup_path.push_str(&format!("&start_time=eq.{}", start.format("%H:%M:%S"))),
            None => dup_path.push_str("&start_time=is.null"),
        }
        match request.end_time {
            Some(end) => dup_path.push_str(&format!("&end_time=eq.{}", end.format("%H:%M:%S"))),
            None => dup_path.push_str("&end_time=is.null"),
        }
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &dup_path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
        if !existing.is_empty() {
            return Err(ScheduleError::DuplicateWindow);
        }

        let window_data = json!({
            "doctor_id": doctor_id,
            "date": request.date.format("%Y-%m-%d").to_string(),
            "start_time": request.start_time.map(|t| t.format("%H:%M:%S").to_string()),
            "end_time": request.end_time.map(|t| t.format("%H:%M:%S").to_string()),
            "reason": request.reason,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_unavailability",
                Some(auth_token),
                Some(window_data),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::DatabaseError("Empty insert response".to_string()))?;
        serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string()))
    }

    pub async fn list_unavailability(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Unavailability>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&order=date.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string())))
            .collect()
    }

    /// Active blocks for a weekday, ordered by start time. Used by the
    /// slot calculator and the booking validator.
    pub async fn active_blocks_for_weekday(
        &self,
        doctor_id: &str,
        weekday: u8,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_working_hours?doctor_id=eq.{}&weekday=eq.{}&is_active=eq.true&order=start_time.asc",
            doctor_id, weekday
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string())))
            .collect()
    }

    /// Unavailability windows for one date.
    pub async fn windows_for_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Unavailability>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&date=eq.{}",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string())))
            .collect()
    }
}
