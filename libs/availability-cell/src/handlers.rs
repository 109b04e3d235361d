use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityOutcome, ConflictCheckResult, CreateAvailabilityRequest,
    CreateExceptionRequest, UpdateAvailabilityRequest,
};
use crate::services::{AvailabilityService, ExceptionService};

#[derive(Debug, Deserialize)]
pub struct WeekdaysInUseQuery {
    /// Availability being edited, so it doesn't count against itself.
    pub exclude: Option<Uuid>,
}

fn authorize_doctor_write(user: &User, doctor_id: &str, action: &str) -> Result<(), AppError> {
    let is_admin = user.role.as_deref() == Some("admin");
    let is_doctor_self = user.id == doctor_id;

    if !is_admin && !is_doctor_self {
        return Err(AppError::Auth(format!(
            "Not authorized to {} for this doctor",
            action
        )));
    }
    Ok(())
}

fn conflict_response(result: &ConflictCheckResult) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": "Availability conflicts with a schedule exception",
            "blocking_date": result.blocking_date,
            "blocking_times": result.blocking_times,
            "reason": result.reason,
        })),
    )
        .into_response()
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let availability = availability_service.get_doctor_availability(&doctor_id, None).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn get_weekdays_in_use(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<WeekdaysInUseQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let weekdays = availability_service.weekdays_in_use(&doctor_id, query.exclude, None).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "weekdays_in_use": weekdays
    })))
}

#[axum::debug_handler]
pub async fn list_exceptions(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let exception_service = ExceptionService::new(&state);

    let exceptions = exception_service.list_exceptions(&doctor_id, None).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(exceptions)))
}

// ==============================================================================
// PROTECTED SCHEDULE MANAGEMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Response, AppError> {
    let token = auth.token();
    authorize_doctor_write(&user, &doctor_id, "create availability")?;

    let availability_service = AvailabilityService::new(&state);

    let outcome = availability_service.create_availability(&doctor_id, request, token).await
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    match outcome {
        AvailabilityOutcome::Saved(availability) => {
            Ok((StatusCode::CREATED, Json(json!(availability))).into_response())
        }
        AvailabilityOutcome::Blocked(result) => Ok(conflict_response(&result)),
    }
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, availability_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Response, AppError> {
    let token = auth.token();
    authorize_doctor_write(&user, &doctor_id, "update availability")?;

    let availability_service = AvailabilityService::new(&state);

    let outcome = availability_service.update_availability(&availability_id, request, token).await
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    match outcome {
        AvailabilityOutcome::Saved(availability) => {
            Ok(Json(json!(availability)).into_response())
        }
        AvailabilityOutcome::Blocked(result) => Ok(conflict_response(&result)),
    }
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, availability_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let token = auth.token();
    authorize_doctor_write(&user, &doctor_id, "delete availability")?;

    let availability_service = AvailabilityService::new(&state);

    availability_service.delete_availability(&availability_id, token).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn create_exception(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<Response, AppError> {
    let token = auth.token();
    authorize_doctor_write(&user, &doctor_id, "create schedule exceptions")?;

    let exception_service = ExceptionService::new(&state);

    let exception = exception_service.create_exception(&doctor_id, request, token).await
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(json!(exception))).into_response())
}

#[axum::debug_handler]
pub async fn delete_exception(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, exception_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let token = auth.token();
    authorize_doctor_write(&user, &doctor_id, "delete schedule exceptions")?;

    let exception_service = ExceptionService::new(&state);

    exception_service.delete_exception(&exception_id, token).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}
