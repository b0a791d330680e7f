// libs/visit-cell/src/services/visit.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus};
use appointment_cell::services::booking::BookingService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreatePrescriptionRequest, Prescription, RecordSymptomsRequest, RecordVitalsRequest, Visit,
    VisitError,
};

pub struct VisitService {
    supabase: SupabaseClient,
    bookings: BookingService,
}

impl VisitService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            bookings: BookingService::new(config),
        }
    }

    /// Fetch the visit anchored to an appointment, creating it on first
    /// access. Only a confirmed (checked-in) appointment gets a visit.
    pub async fn get_or_create_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(VisitError::AppointmentNotConfirmed);
        }

        let path = format!("/rest/v1/patient_visits?appointment_id=eq.{}", appointment_id);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| VisitError::DatabaseError(e.to_string()))?;

        if let Some(row) = existing.into_iter().next() {
            debug!("Visit already exists for appointment {}", appointment_id);
            return serde_json::from_value(row).map_err(|e| VisitError::DatabaseError(e.to_string()));
        }

        info!("Creating visit for appointment {}", appointment_id);
        let visit_data = json!({
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "appointment_id": appointment.id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patient_visits",
                Some(auth_token),
                Some(visit_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| VisitError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| VisitError::DatabaseError("Empty insert response".to_string()))?;
        serde_json::from_value(row).map_err(|e| VisitError::DatabaseError(e.to_string()))
    }

    pub async fn get_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<Visit, VisitError> {
        let path = format!("/rest/v1/patient_visits?id=eq.{}", visit_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| VisitError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(VisitError::NotFound)?;
        serde_json::from_value(row).map_err(|e| VisitError::DatabaseError(e.to_string()))
    }

    /// Record measurements taken at check-in. Only the fields present in
    /// the request are written; earlier values survive partial updates.
    pub async fn record_vitals(
        &self,
        visit_id: Uuid,
        request: RecordVitalsRequest,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        let mut update = Map::new();
        if let Some(height) = request.height_cm {
            update.insert("height_cm".to_string(), json!(height));
        }
        if let Some(weight) = request.weight_kg {
            update.insert("weight_kg".to_string(), json!(weight));
        }
        if let Some(bp) = request.blood_pressure {
            update.insert("blood_pressure".to_string(), json!(bp));
        }
        if let Some(sugar) = request.sugar_level {
            update.insert("sugar_level".to_string(), json!(sugar));
        }
        if update.is_empty() {
            return Err(VisitError::ValidationError(
                "At least one vital measurement is required".to_string(),
            ));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_visit(visit_id, Value::Object(update), auth_token).await
    }

    /// Doctor's clinical notes for the encounter. The backing appointment
    /// must still be confirmed.
    pub async fn record_symptoms(
        &self,
        visit_id: Uuid,
        request: RecordSymptomsRequest,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        if request.symptoms.trim().is_empty() {
            return Err(VisitError::ValidationError("Symptoms must not be empty".to_string()));
        }

        let visit = self.get_visit(visit_id, auth_token).await?;
        self.ensure_confirmed(&visit, auth_token).await?;

        let mut update = Map::new();
        update.insert("symptoms".to_string(), json!(request.symptoms));
        if let Some(notes) = request.notes {
            update.insert("notes".to_string(), json!(notes));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_visit(visit_id, Value::Object(update), auth_token).await
    }

    pub async fn add_prescription(
        &self,
        visit_id: Uuid,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, VisitError> {
        if request.medicine_name.trim().is_empty() {
            return Err(VisitError::ValidationError(
                "Medicine name must not be empty".to_string(),
            ));
        }
        if let Some(days) = request.duration_days {
            if days <= 0 {
                return Err(VisitError::ValidationError(
                    "Duration must be a positive number of days".to_string(),
                ));
            }
        }

        let visit = self.get_visit(visit_id, auth_token).await?;
        self.ensure_confirmed(&visit, auth_token).await?;

        info!("Adding prescription to visit {}", visit_id);
        let prescription_data = json!({
            "visit_id": visit.id,
            "doctor_id": visit.doctor_id,
            "patient_id": visit.patient_id,
            "medicine_name": request.medicine_name,
            "dosage": request.dosage,
            "frequency": request.frequency,
            "duration_days": request.duration_days,
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/prescriptions",
                Some(auth_token),
                Some(prescription_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| VisitError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| VisitError::DatabaseError("Empty insert response".to_string()))?;
        serde_json::from_value(row).map_err(|e| VisitError::DatabaseError(e.to_string()))
    }

    pub async fn list_prescriptions(
        &self,
        visit_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, VisitError> {
        // Existence check so an unknown visit 404s instead of listing empty.
        self.get_visit(visit_id, auth_token).await?;

        let path = format!(
            "/rest/v1/prescriptions?visit_id=eq.{}&order=created_at.asc",
            visit_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| VisitError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| VisitError::DatabaseError(e.to_string())))
            .collect()
    }

    /// A visit anchored to an appointment only accepts clinical writes
    /// while that appointment is confirmed. Walk-in visits (no
    /// appointment) are not gated.
    async fn ensure_confirmed(&self, visit: &Visit, auth_token: &str) -> Result<(), VisitError> {
        let Some(appointment_id) = visit.appointment_id else {
            return Ok(());
        };
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(VisitError::AppointmentNotConfirmed);
        }
        Ok(())
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, VisitError> {
        self.bookings
            .get_appointment(appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                AppointmentError::NotFound => VisitError::AppointmentNotFound,
                other => VisitError::DatabaseError(other.to_string()),
            })
    }

    async fn patch_visit(
        &self,
        visit_id: Uuid,
        update: Value,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        let path = format!("/rest/v1/patient_visits?id=eq.{}", visit_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| VisitError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(VisitError::NotFound)?;
        serde_json::from_value(row).map_err(|e| VisitError::DatabaseError(e.to_string()))
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }
}
