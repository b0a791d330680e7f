// libs/visit-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn visit_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/appointment/{appointment_id}", get(handlers::get_or_create_visit))
        .route("/{visit_id}/vitals", patch(handlers::record_vitals))
        .route("/{visit_id}/symptoms", patch(handlers::record_symptoms))
        .route("/{visit_id}/prescriptions", post(handlers::add_prescription))
        .route("/{visit_id}/prescriptions", get(handlers::list_prescriptions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
