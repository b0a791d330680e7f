// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/working-hours", post(handlers::create_working_hours))
        .route("/{doctor_id}/working-hours", get(handlers::list_working_hours))
        .route("/working-hours/{block_id}", delete(handlers::delete_working_hours))
        .route("/{doctor_id}/unavailability", post(handlers::create_unavailability))
        .route("/{doctor_id}/unavailability", get(handlers::list_unavailability))
        .route("/{doctor_id}/slots", get(handlers::get_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
