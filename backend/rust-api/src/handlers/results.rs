use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::models::result::DEFAULT_HISTORY_LIMIT;
use crate::models::{ExportQuery, HistoryQuery};
use crate::services::export_service::{self, ExportFormat};
use crate::services::AppState;

const MAX_HISTORY_LIMIT: usize = 100;

/// GET /api/v1/users/{user_id}/history
pub async fn user_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let history = state.store.user_history(&user_id, limit).await?;
    let stats = state.store.user_stats(&user_id).await.unwrap_or_else(|e| {
        tracing::warn!("Failed to load stats for user {}: {:#}", user_id, e);
        None
    });

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "history": history,
        "stats": stats,
    })))
}

/// GET /api/v1/results/{id}
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(result_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = state
        .store
        .get_result(&result_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Result not found"))?;
    Ok(Json(stored))
}

/// DELETE /api/v1/results/{id}
pub async fn delete_result(
    State(state): State<Arc<AppState>>,
    Path(result_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.delete_result(&result_id).await? {
        return Err(ApiError::not_found("Result not found"));
    }
    tracing::info!("Deleted quiz result {}", result_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/results/{id}/export?format=txt|pdf
pub async fn export_result(
    State(state): State<Arc<AppState>>,
    Path(result_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let stored = state
        .store
        .get_result(&result_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Result not found"))?;

    let format = query.format.unwrap_or(ExportFormat::Txt);
    let result = stored.record.to_quiz_result();
    let body = export_service::render(&result, format);
    let file_name = export_service::file_name(format, stored.record.completed_at.date_naive());

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
