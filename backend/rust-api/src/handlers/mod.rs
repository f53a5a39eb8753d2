use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{FailureReason, QuizError};
use crate::metrics;
use crate::services::AppState;

pub mod keys;
pub mod quizzes;
pub mod results;
pub mod sse;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let store_health = check_dependency(state.store.backend_name(), state.store.health()).await;
    let store_ok = store_health["status"] == "healthy";
    dependencies.insert("result_store".to_string(), store_health);

    let key_health =
        check_dependency(state.key_store.backend_name(), state.key_store.health()).await;
    let keys_ok = key_health["status"] == "healthy";
    dependencies.insert("key_store".to_string(), key_health);

    let all_healthy = store_ok && keys_ok;
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if all_healthy { "healthy" } else { "degraded" },
            "service": "smartquiz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "active_runs": state.runs.len().await,
            "dependencies": dependencies
        })),
    )
}

async fn check_dependency<F>(backend: &str, probe: F) -> serde_json::Value
where
    F: Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(Duration::from_secs(1), probe).await {
        Ok(Ok(())) => json!({ "status": "healthy", "backend": backend }),
        Ok(Err(e)) => json!({
            "status": "unhealthy",
            "backend": backend,
            "error": e.to_string()
        }),
        Err(_) => json!({
            "status": "unhealthy",
            "backend": backend,
            "error": "timeout after 1s"
        }),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic auth for `/metrics` against `METRICS_AUTH` (`user:password`).
/// Without `METRICS_AUTH` every request is refused.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = std::env::var("METRICS_AUTH").map_err(|_| {
        tracing::warn!("METRICS_AUTH is not set; refusing /metrics");
        StatusCode::UNAUTHORIZED
    })?;

    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    TooManyRequests(String),
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        ApiError::internal("Internal server error")
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        let message = err.to_string();
        match &err {
            QuizError::InvalidSettings(_) | QuizError::InvalidKeyFormat(_) => {
                ApiError::BadRequest(message)
            }
            QuizError::KeyVerificationFailed { reason, .. }
            | QuizError::Transport { reason, .. } => match reason {
                FailureReason::Authentication => ApiError::Unauthorized(message),
                FailureReason::RateLimited | FailureReason::QuotaOrBilling => {
                    ApiError::TooManyRequests(message)
                }
                FailureReason::MalformedRequest => ApiError::BadRequest(message),
                _ => ApiError::BadGateway(message),
            },
            QuizError::NoJsonFound
            | QuizError::MalformedJson(_)
            | QuizError::NotAnArray
            | QuizError::EmptyArray
            | QuizError::NoValidQuestions => ApiError::BadGateway(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::TooManyRequests(message) => (StatusCode::TOO_MANY_REQUESTS, message),
            ApiError::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (
            status,
            Json(json!({ "message": message, "status": status.as_u16() })),
        )
            .into_response()
    }
}
