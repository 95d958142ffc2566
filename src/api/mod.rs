use axum::Json;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::rejection::PathRejection;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::de::DeserializeOwned;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::config::{AppConfig, ConfigError};
use crate::error::{AppError, panic_response};
use crate::models::*;
use crate::state::AppState;

/// Routes without the outer CORS/tracing layers. Duty routes live under
/// `api_prefix`, the health check stays at the root.
pub fn router(state: AppState, api_prefix: &str) -> Router {
    let duties = Router::new()
        .route("/duties", get(list_duties).post(create_duty))
        .route(
            "/duties/{id}",
            get(get_duty).put(update_duty).delete(delete_duty),
        )
        .method_not_allowed_fallback(method_not_allowed);

    let routes = Router::new().route("/health", get(health));
    let routes = match api_prefix.trim_end_matches('/') {
        "" => routes.merge(duties),
        prefix => routes.nest(prefix, duties),
    };

    with_error_handling(routes).with_state(state)
}

/// Unmatched paths, unsupported methods and handler panics all end up in
/// the `AppError` envelope.
fn with_error_handling(routes: Router<AppState>) -> Router<AppState> {
    routes
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(panic_response))
}

/// Full application: [`router`] plus CORS and request tracing.
pub fn app(state: AppState, config: &AppConfig) -> Result<Router, ConfigError> {
    let cors = cors_layer(&config.cors_origin)?;

    Ok(router(state, &config.api_prefix)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidValue {
            key: "CORS_ORIGIN".to_string(),
            message: e.to_string(),
        })?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Path ids must be plain integers; anything else, including a segment
/// that does not even decode, is rejected before the service is involved.
fn path_id(path: Result<Path<String>, PathRejection>) -> Result<i64, AppError> {
    match path {
        Ok(Path(raw)) => parse_id(&raw),
        Err(rejection) => {
            debug!("rejected duty id: {}", rejection);
            Err(AppError::InvalidId)
        }
    }
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>().map_err(|_| {
        debug!("rejected duty id {:?}", raw);
        AppError::InvalidId
    })
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Controller("Request body is required".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("malformed request body: {}", e);
        AppError::Controller("Malformed request body".to_string())
    })
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.duties.health_check().await?;
    Ok(StatusCode::OK)
}

async fn list_duties(State(state): State<AppState>) -> Result<Json<Vec<Duty>>, AppError> {
    let duties = state.duties.get_all_duties().await?;
    Ok(Json(duties))
}

async fn get_duty(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Duty>, AppError> {
    let id = path_id(id)?;
    let duty = state.duties.get_duty_by_id(id).await?;
    Ok(Json(duty))
}

async fn create_duty(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Duty>), AppError> {
    let req: CreateDutyRequest = parse_body(&body)?;
    let duty = state.duties.create_duty(req).await?;
    Ok((StatusCode::CREATED, Json(duty)))
}

async fn update_duty(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Result<Json<Duty>, AppError> {
    let id = path_id(id)?;
    let req: UpdateDutyRequest = parse_body(&body)?;
    let duty = state.duties.update_duty(id, req).await?;
    Ok(Json(duty))
}

async fn delete_duty(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Duty>, AppError> {
    let id = path_id(id)?;
    let duty = state.duties.delete_duty(id).await?;
    Ok(Json(duty))
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
