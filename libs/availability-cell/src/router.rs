use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required) - calendar reads
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability))
        .route("/{doctor_id}/availability/weekdays-in-use", get(handlers::get_weekdays_in_use))
        .route("/{doctor_id}/exceptions", get(handlers::list_exceptions));

    // Protected routes (authentication required) - schedule management
    let protected_routes = Router::new()
        .route("/{doctor_id}/availability", post(handlers::create_availability))
        .route("/{doctor_id}/availability/{availability_id}", put(handlers::update_availability))
        .route("/{doctor_id}/availability/{availability_id}", delete(handlers::delete_availability))
        .route("/{doctor_id}/exceptions", post(handlers::create_exception))
        .route("/{doctor_id}/exceptions/{exception_id}", delete(handlers::delete_exception))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
