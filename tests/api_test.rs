use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode, header};
use duties::api;
use duties::config::AppConfig;
use duties::db::InMemoryDutyRepository;
use duties::services::DutyService;
use duties::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

fn setup() -> (Arc<InMemoryDutyRepository>, Router) {
    let repo = Arc::new(InMemoryDutyRepository::new());
    let state = AppState::new(DutyService::new(repo.clone()));
    (repo, api::router(state, "/api"))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not json")
    };
    (status, json)
}

fn error_body(status: StatusCode, message: &str) -> Value {
    json!({
        "status": "error",
        "statusCode": status.as_u16(),
        "message": message,
    })
}

#[tokio::test]
async fn test_invalid_ids_never_reach_service() {
    let (repo, app) = setup();

    for (method, body) in [
        (Method::GET, None),
        (Method::PUT, Some(r#"{"name":"Valid name"}"#)),
        (Method::DELETE, None),
    ] {
        for id in ["abc", "12abc", "1.5", "%FF"] {
            let (status, json) = send(&app, method.clone(), &format!("/api/duties/{}", id), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                json,
                error_body(StatusCode::BAD_REQUEST, "Invalid ID format, ID should be an integer")
            );
        }
    }

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_missing_body_is_rejected() {
    let (repo, app) = setup();

    let (status, json) = send(&app, Method::POST, "/api/duties", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, error_body(StatusCode::BAD_REQUEST, "Request body is required"));

    let (status, json) = send(&app, Method::PUT, "/api/duties/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, error_body(StatusCode::BAD_REQUEST, "Request body is required"));

    let (status, json) = send(&app, Method::POST, "/api/duties", Some("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, error_body(StatusCode::BAD_REQUEST, "Malformed request body"));

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_validation_errors() {
    let (repo, app) = setup();

    let cases = [
        (r#"{}"#, "Duty name cannot be empty"),
        (r#"{"name":"   "}"#, "Duty name cannot be empty"),
        (r#"{"name":"Buy milk!"}"#, "Duty name contains invalid characters"),
        (r#"{"name":" Buy milk"}"#, "Duty name cannot have leading or trailing spaces"),
    ];

    for (body, message) in cases {
        let (status, json) = send(&app, Method::POST, "/api/duties", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(json, error_body(StatusCode::BAD_REQUEST, message));
    }

    let long_name = format!(r#"{{"name":"{}"}}"#, "a".repeat(256));
    let (status, json) = send(&app, Method::PUT, "/api/duties/1", Some(long_name.as_str())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Duty name cannot exceed 255 characters");

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_not_found() {
    let (_repo, app) = setup();

    let (status, json) = send(&app, Method::GET, "/api/duties/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, error_body(StatusCode::NOT_FOUND, "Duty with id 5 not found"));

    let (status, _) = send(&app, Method::PUT, "/api/duties/5", Some(r#"{"name":"Anything"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/duties/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Route not found");
}

#[tokio::test]
async fn test_unsupported_method_gets_error_envelope() {
    let (repo, app) = setup();

    let (status, json) = send(&app, Method::PATCH, "/api/duties/1", Some(r#"{"name":"Buy milk"}"#)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json, error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));

    let (status, json) = send(&app, Method::DELETE, "/api/duties", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["statusCode"], 405);

    let (status, json) = send(&app, Method::POST, "/health", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["message"], "Method not allowed");

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_opaque_500() {
    let (repo, app) = setup();
    repo.set_failing(true);

    let (status, json) = send(&app, Method::GET, "/api/duties", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json,
        error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve duties")
    );
    assert!(!json.to_string().contains("pool"));

    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_create_list_and_complete() {
    let (_repo, app) = setup();

    let (status, created) = send(&app, Method::POST, "/api/duties", Some(r#"{"name":"Buy milk"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Buy milk");
    assert_eq!(created["completed"], false);

    let id = created["id"].as_i64().expect("id missing");
    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/duties/{}", id),
        Some(r#"{"name":"Buy milk","completed":true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["completed"], true);

    let (status, list) = send(&app, Method::GET, "/api/duties", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_custom_prefix_and_cors() {
    let repo = Arc::new(InMemoryDutyRepository::new());
    let state = AppState::new(DutyService::new(repo));
    let config = AppConfig {
        api_prefix: "/v1".to_string(),
        cors_origin: "http://localhost:3000".to_string(),
        ..AppConfig::default()
    };
    let app = api::app(state, &config).expect("Failed to build app");

    let request = Request::builder()
        .uri("/v1/duties")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .expect("Failed to build request");
    let response = app.clone().oneshot(request).await.expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("http://localhost:3000"))
    );

    let (status, _) = send(&app, Method::GET, "/api/duties", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
