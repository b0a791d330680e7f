// libs/visit-cell/src/handlers.rs
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

use crate::models::{CreatePrescriptionRequest, RecordSymptomsRequest, RecordVitalsRequest, VisitError};
use crate::services::visit::VisitService;

fn map_visit_error(e: VisitError) -> AppError {
    match e {
        VisitError::NotFound => AppError::NotFound("Visit not found".to_string()),
        VisitError::AppointmentNotFound => AppError::NotFound("Appointment not found".to_string()),
        VisitError::AppointmentNotConfirmed => AppError::BadRequest(e.to_string()),
        VisitError::ValidationError(msg) => AppError::ValidationError(msg),
        VisitError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn get_or_create_visit(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Staff, UserRole::Doctor, UserRole::Admin])?;

    let service = VisitService::new(&state);
    let visit = service
        .get_or_create_for_appointment(appointment_id, auth.token())
        .await
        .map_err(map_visit_error)?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn record_vitals(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RecordVitalsRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Staff, UserRole::Admin])?;

    let service = VisitService::new(&state);
    let visit = service
        .record_vitals(visit_id, request, auth.token())
        .await
        .map_err(map_visit_error)?;

    Ok(Json(json!({
        "success": true,
        "visit": visit
    })))
}

#[axum::debug_handler]
pub async fn record_symptoms(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RecordSymptomsRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor, UserRole::Admin])?;

    let service = VisitService::new(&state);
    let visit = service
        .record_symptoms(visit_id, request, auth.token())
        .await
        .map_err(map_visit_error)?;

    Ok(Json(json!({
        "success": true,
        "visit": visit
    })))
}

#[axum::debug_handler]
pub async fn add_prescription(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor, UserRole::Admin])?;

    let service = VisitService::new(&state);
    let prescription = service
        .add_prescription(visit_id, request, auth.token())
        .await
        .map_err(map_visit_error)?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription
    })))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor, UserRole::Staff, UserRole::Admin])?;

    let service = VisitService::new(&state);
    let prescriptions = service
        .list_prescriptions(visit_id, auth.token())
        .await
        .map_err(map_visit_error)?;

    Ok(Json(json!({ "prescriptions": prescriptions })))
}
