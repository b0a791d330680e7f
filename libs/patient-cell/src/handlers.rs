// libs/patient-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreatePatientRequest, PatientError, UpdatePatientRequest};
use crate::services::patient::PatientService;

fn map_patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::EmailTaken | PatientError::ProfileExists => AppError::Conflict(e.to_string()),
        PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        PatientError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// A patient may only touch their own profile; staff, doctors and
/// admins may read any. Writes stay with the owner and admins.
fn ensure_profile_owner(user: &User, patient_id: &Uuid) -> Result<(), AppError> {
    let role = require_role(user, &[UserRole::Patient, UserRole::Admin])?;
    if role == UserRole::Patient && patient_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Patients may only manage their own profile".to_string(),
        ));
    }
    Ok(())
}

fn ensure_profile_reader(user: &User, patient_id: &Uuid) -> Result<(), AppError> {
    let role = require_role(
        user,
        &[UserRole::Patient, UserRole::Staff, UserRole::Doctor, UserRole::Admin],
    )?;
    if role == UserRole::Patient && patient_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Patients may only view their own profile".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Patient, UserRole::Admin])?;
    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = PatientService::new(&state);
    let patient = service
        .create_patient(user_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_profile_reader(&user, &patient_id)?;

    let service = PatientService::new(&state);
    let patient = service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_profile_owner(&user, &patient_id)?;

    let service = PatientService::new(&state);
    let patient = service
        .update_patient(patient_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_profile_reader(&user, &patient_id)?;

    let service = PatientService::new(&state);
    let dashboard = service
        .get_dashboard(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(dashboard)))
}
