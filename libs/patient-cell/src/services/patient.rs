// libs/patient-cell/src/services/patient.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use appointment_cell::models::Appointment;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use visit_cell::models::{Prescription, Visit};

use crate::models::{
    validate_date_of_birth, validate_phone_number, validate_pincode, CreatePatientRequest,
    DashboardResponse, Patient, PatientError, UpdatePatientRequest,
};

const DASHBOARD_APPOINTMENT_LIMIT: usize = 10;
const DASHBOARD_HISTORY_LIMIT: usize = 5;

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Signup completion: the authenticated user creates their profile
    /// row, keyed by their auth id.
    pub async fn create_patient(
        &self,
        user_id: Uuid,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        validate_date_of_birth(request.date_of_birth, Utc::now().date_naive())?;
        if let Some(ref pincode) = request.pincode {
            validate_pincode(pincode)?;
        }
        if let Some(ref phone) = request.phone_number {
            validate_phone_number(phone)?;
        }

        let by_id = format!("/rest/v1/patients?id=eq.{}", user_id);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &by_id, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        if !existing.is_empty() {
            return Err(PatientError::ProfileExists);
        }

        let by_email = format!("/rest/v1/patients?email=eq.{}", request.email);
        let same_email: Vec<Value> = self
            .supabase
            .request(Method::GET, &by_email, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        if !same_email.is_empty() {
            return Err(PatientError::EmailTaken);
        }

        info!("Creating patient profile for user {}", user_id);
        let patient_data = json!({
            "id": user_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "gender": request.gender,
            "date_of_birth": request.date_of_birth.format("%Y-%m-%d").to_string(),
            "blood_group": request.blood_group,
            "address": request.address,
            "city": request.city,
            "state": request.state,
            "country": request.country,
            "pincode": request.pincode,
            "phone_number": request.phone_number,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Empty insert response".to_string()))?;
        serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        if let Some(ref pincode) = request.pincode {
            validate_pincode(pincode)?;
        }
        if let Some(ref phone) = request.phone_number {
            validate_phone_number(phone)?;
        }

        let mut update = Map::new();
        let serialized =
            serde_json::to_value(&request).map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        if let Value::Object(fields) = serialized {
            for (key, value) in fields {
                if !value.is_null() {
                    update.insert(key, value);
                }
            }
        }
        if update.is_empty() {
            return Err(PatientError::ValidationError(
                "At least one field is required".to_string(),
            ));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    /// Aggregate view for the patient's landing page: next bookings from
    /// now, plus recent clinical history.
    pub async fn get_dashboard(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<DashboardResponse, PatientError> {
        let patient = self.get_patient(patient_id, auth_token).await?;

        let now = Utc::now();
        let today = now.date_naive();
        let current_time = now.time();

        // Date-level filter in the query; today's already-passed times
        // are dropped here since PostgREST cannot compare the pair.
        let appointments_path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&appointment_date=gte.{}&status=in.(pending,confirmed)&order=appointment_date.asc,appointment_time.asc",
            patient_id, today
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &appointments_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        let upcoming_appointments: Vec<Appointment> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .into_iter()
            .filter(|a| a.appointment_date > today || a.appointment_time >= current_time)
            .take(DASHBOARD_APPOINTMENT_LIMIT)
            .collect();

        let visits_path = format!(
            "/rest/v1/patient_visits?patient_id=eq.{}&order=created_at.desc&limit={}",
            patient_id, DASHBOARD_HISTORY_LIMIT
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &visits_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        let recent_visits: Vec<Visit> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let prescriptions_path = format!(
            "/rest/v1/prescriptions?patient_id=eq.{}&order=created_at.desc&limit={}",
            patient_id, DASHBOARD_HISTORY_LIMIT
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &prescriptions_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        let recent_prescriptions: Vec<Prescription> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(DashboardResponse {
            patient,
            upcoming_appointments,
            recent_visits,
            recent_prescriptions,
        })
    }
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}
