// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
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

use crate::models::{CreateUnavailabilityRequest, CreateWorkingHoursRequest, ScheduleError, SlotQuery};
use crate::services::doctor::DoctorService;
use crate::services::schedule::ScheduleService;
use crate::services::slots::SlotService;

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        ScheduleError::BlockNotFound => AppError::NotFound("Working-hours block not found".to_string()),
        ScheduleError::InvalidTimeRange
        | ScheduleError::InvalidWeekday
        | ScheduleError::InvalidWindow => AppError::ValidationError(e.to_string()),
        ScheduleError::DuplicateBlock | ScheduleError::DuplicateWindow => {
            AppError::Conflict(e.to_string())
        }
        ScheduleError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Only the doctor's own account or an admin may edit a doctor's schedule.
fn ensure_schedule_owner(user: &User, doctor_id: &Uuid) -> Result<(), AppError> {
    let role = require_role(user, &[UserRole::Doctor, UserRole::Admin])?;
    if role == UserRole::Doctor && doctor_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Doctors may only manage their own schedule".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctors = service
        .list_doctors(auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({ "doctors": doctors })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctor = service
        .get_doctor(&doctor_id.to_string(), auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn create_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWorkingHoursRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, &doctor_id)?;

    let service = ScheduleService::new(&state);
    let block = service
        .create_working_hours(&doctor_id.to_string(), request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "working_hours": block
    })))
}

#[axum::debug_handler]
pub async fn list_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let blocks = service
        .list_working_hours(&doctor_id.to_string(), auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "working_hours": blocks })))
}

#[axum::debug_handler]
pub async fn delete_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(block_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor, UserRole::Admin])?;

    let service = ScheduleService::new(&state);
    service
        .delete_working_hours(&block_id.to_string(), auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn create_unavailability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUnavailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, &doctor_id)?;

    let service = ScheduleService::new(&state);
    let window = service
        .create_unavailability(&doctor_id.to_string(), request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "unavailability": window
    })))
}

#[axum::debug_handler]
pub async fn list_unavailability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let windows = service
        .list_unavailability(&doctor_id.to_string(), auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "unavailability": windows })))
}

/// Slot search for the booking form: the day's bookable times, each
/// flagged booked or blocked.
#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&state);
    let day = service
        .compute_slots(&doctor_id.to_string(), query.date, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(day)))
}
