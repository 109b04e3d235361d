use std::sync::Arc;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path};

use availability_cell::models::{AppointmentType, CreateAvailabilityRequest, CreateExceptionRequest, ExceptionKind};
use availability_cell::router::availability_routes;
use availability_cell::weekday::weekday_token;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    availability_routes(Arc::new(config))
}

fn mock_config(mock_server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
    }
}

/// A date a couple of weeks out, safely inside the one-year horizon.
fn upcoming_date() -> chrono::NaiveDate {
    Utc::now().date_naive() + Duration::days(14)
}

/// Portuguese name for the weekday of a date, to exercise the bilingual path.
fn portuguese_weekday(date: chrono::NaiveDate) -> &'static str {
    match weekday_token(date.weekday()) {
        "monday" => "segunda",
        "tuesday" => "terça",
        "wednesday" => "quarta",
        "thursday" => "quinta",
        "friday" => "sexta",
        "saturday" => "sábado",
        _ => "domingo",
    }
}

fn availability_body(weekday: &str, start: &str, end: &str) -> CreateAvailabilityRequest {
    CreateAvailabilityRequest {
        weekday: weekday.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        slot_minutes: 30,
        appointment_type: AppointmentType::InPerson,
        active: Some(true),
    }
}

async fn mock_no_existing_availability(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_weekly_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

async fn mock_availability_insert(mock_server: &MockServer, doctor_id: &str) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_weekly_availability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::weekly_availability_row(doctor_id, "monday", "09:00:00", "12:00:00")
        ])))
        .mount(mock_server)
        .await;
}

async fn mock_exceptions(mock_server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_exceptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

fn post_availability_request(doctor_id: &str, token: &str, body: &CreateAvailabilityRequest) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/{}/availability", doctor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_create_availability_success() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([])).await;
    mock_availability_insert(&mock_server, &user.id).await;

    let body = availability_body("segunda", "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_availability_blocked_by_whole_day_exception() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let holiday = upcoming_date();

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([
        MockSupabaseResponses::exception_row(&user.id, &holiday.to_string(), None, None, "block")
    ])).await;

    // Candidate submitted with the Portuguese weekday name for that date.
    let body = availability_body(portuguese_weekday(holiday), "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json_response["blocking_date"], holiday.to_string());
    assert!(json_response["blocking_times"].is_null());
    assert_eq!(json_response["reason"], "Feriado");
}

#[tokio::test]
async fn test_create_availability_blocked_by_partial_overlap() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let blocked_day = upcoming_date();

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([
        MockSupabaseResponses::exception_row(
            &user.id,
            &blocked_day.to_string(),
            Some("10:00:00"),
            Some("10:30:00"),
            "block",
        )
    ])).await;

    let body = availability_body(weekday_token(blocked_day.weekday()), "09:00", "11:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json_response["blocking_times"], "10:00–10:30");
}

#[tokio::test]
async fn test_boundary_adjacent_exception_does_not_block() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let blocked_day = upcoming_date();

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([
        MockSupabaseResponses::exception_row(
            &user.id,
            &blocked_day.to_string(),
            Some("12:00:00"),
            Some("13:00:00"),
            "block",
        )
    ])).await;
    mock_availability_insert(&mock_server, &user.id).await;

    // Ends exactly when the exception starts.
    let body = availability_body(weekday_token(blocked_day.weekday()), "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_release_exception_never_blocks() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let release_day = upcoming_date();

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([
        MockSupabaseResponses::exception_row(&user.id, &release_day.to_string(), None, None, "release")
    ])).await;
    mock_availability_insert(&mock_server, &user.id).await;

    let body = availability_body(weekday_token(release_day.weekday()), "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_far_future_exception_never_blocks() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    // The store-side fetch is horizon-scoped, but even a row that slips
    // through must be ignored by the checker itself.
    let far_future = Utc::now().date_naive() + Duration::days(800);

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([
        MockSupabaseResponses::exception_row(&user.id, &far_future.to_string(), None, None, "block")
    ])).await;
    mock_availability_insert(&mock_server, &user.id).await;

    let body = availability_body(weekday_token(far_future.weekday()), "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_exception_fetch_failure_fails_open() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    mock_no_existing_availability(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_exceptions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("exception store down"))
        .mount(&mock_server)
        .await;
    mock_availability_insert(&mock_server, &user.id).await;

    // An outage in the exception store must not block schedule creation.
    let body = availability_body("quinta", "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_availability_duplicate_weekday_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    // Store already has an active Monday row; "segunda" is the same weekday.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_weekly_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::weekly_availability_row(&user.id, "monday", "09:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    let body = availability_body("segunda", "14:00", "17:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_availability_unknown_weekday_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let body = availability_body("someday", "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&user.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_exception_success() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let date = upcoming_date();

    mock_exceptions(&mock_server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedule_exceptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::exception_row(&user.id, &date.to_string(), None, None, "block")
        ])))
        .mount(&mock_server)
        .await;

    let request_body = CreateExceptionRequest {
        date,
        start_time: None,
        end_time: None,
        kind: ExceptionKind::Block,
        reason: Some("Feriado".to_string()),
    };

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/exceptions", user.id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&request_body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_exception_duplicate_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let date = upcoming_date();

    // Same date, same whole-day window already present.
    mock_exceptions(&mock_server, json!([
        MockSupabaseResponses::exception_row(&user.id, &date.to_string(), None, None, "block")
    ])).await;

    let request_body = CreateExceptionRequest {
        date,
        start_time: None,
        end_time: None,
        kind: ExceptionKind::Block,
        reason: None,
    };

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/exceptions", user.id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&request_body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_availability_for_other_doctor_forbidden() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let body = availability_body("segunda", "09:00", "12:00");
    let response = app
        .oneshot(post_availability_request("someone-else", &token, &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_can_manage_any_doctor_schedule() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let doctor = TestUser::doctor("doctor@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    mock_no_existing_availability(&mock_server).await;
    mock_exceptions(&mock_server, json!([])).await;
    mock_availability_insert(&mock_server, &doctor.id).await;

    let body = availability_body("tuesday", "09:00", "12:00");
    let response = app.oneshot(post_availability_request(&doctor.id, &token, &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_get_weekdays_in_use_public() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone());
    let doctor_id = "doctor-123";

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_weekly_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::weekly_availability_row(doctor_id, "quarta", "09:00:00", "12:00:00"),
            MockSupabaseResponses::weekly_availability_row(doctor_id, "monday", "09:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/availability/weekdays-in-use", doctor_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    // Canonical tokens, Monday first, regardless of input language or order.
    assert_eq!(json_response["weekdays_in_use"], json!(["monday", "wednesday"]));
}

#[tokio::test]
async fn test_public_endpoints_accessible() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let public_endpoints = vec![
        "/doctor-123/availability",
        "/doctor-123/availability/weekdays-in-use",
        "/doctor-123/exceptions",
    ];

    for uri in public_endpoints {
        let app = create_test_app(config.clone());

        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "Public endpoint {} should be accessible", uri);
    }
}

#[tokio::test]
async fn test_protected_endpoints_unauthorized() {
    let config = TestConfig::default().to_app_config();

    let protected_endpoints = vec![
        ("POST", "/doctor-123/availability"),
        ("PUT", "/doctor-123/availability/availability-456"),
        ("DELETE", "/doctor-123/availability/availability-456"),
        ("POST", "/doctor-123/exceptions"),
        ("DELETE", "/doctor-123/exceptions/exception-456"),
    ];

    for (http_method, uri) in protected_endpoints {
        let app = create_test_app(config.clone());

        let request = Request::builder()
            .method(http_method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED,
                  "Failed for {} {}", http_method, uri);
    }
}
