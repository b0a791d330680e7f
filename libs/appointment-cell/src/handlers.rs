// libs/appointment-cell/src/handlers.rs
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

use crate::models::{Appointment, AppointmentError, AppointmentQueryParams, BookAppointmentRequest};
use crate::services::booking::BookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::NotAvailableOnWeekday
        | AppointmentError::OutsideWorkingHours
        | AppointmentError::DoctorUnavailable => AppError::BadRequest(e.to_string()),
        AppointmentError::SlotTaken | AppointmentError::SlotJustTaken => {
            AppError::Conflict(e.to_string())
        }
        AppointmentError::InvalidStatusTransition(_) => AppError::BadRequest(e.to_string()),
        AppointmentError::Unauthorized => AppError::Forbidden(e.to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Who may read a given appointment: the patient it belongs to, the
/// doctor it is with, or any staff/admin account.
fn can_view(user: &User, appointment: &Appointment) -> bool {
    match user.role {
        Some(UserRole::Staff) | Some(UserRole::Admin) => true,
        Some(UserRole::Doctor) => appointment.doctor_id.to_string() == user.id,
        Some(UserRole::Patient) => appointment.patient_id.to_string() == user.id,
        None => false,
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[UserRole::Patient, UserRole::Admin])?;
    if role == UserRole::Patient && request.patient_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Patients may only book appointments for themselves".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointment = service
        .book_appointment(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    if !can_view(&user, &appointment) {
        return Err(AppError::Forbidden(
            "Not authorized for this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .cancel_appointment(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn check_in_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Staff, UserRole::Admin])?;

    let service = BookingService::new(&state);
    let appointment = service
        .check_in_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(mut params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    // Patients see their own bookings only, whatever the query says.
    if user.role == Some(UserRole::Patient) {
        let own_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;
        params.patient_id = Some(own_id);
    }

    let service = BookingService::new(&state);
    let appointments = service
        .search_appointments(&params, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}
