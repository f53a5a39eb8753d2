use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::extractors::ValidatedJson;
use crate::models::api_key::ApiKey;
use crate::models::{StoredKeyResponse, VerifyKeyRequest, VerifyKeyResponse};
use crate::services::AppState;

/// POST /api/v1/keys/verify
pub async fn verify_key(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerifyKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = ApiKey::new(&req.api_key);
    state.generation.verify_key(&key).await?;

    let remembered = if req.remember {
        match state.key_store.put(&req.user_id, &key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to remember key for user {}: {:#}", req.user_id, e);
                false
            }
        }
    } else {
        false
    };

    Ok(Json(VerifyKeyResponse {
        valid: true,
        remembered,
        masked_key: key.masked(),
        fingerprint: key.fingerprint(),
    }))
}

/// GET /api/v1/keys/{user_id}
pub async fn get_key(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state
        .key_store
        .get(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No API key stored for this user"))?;

    Ok(Json(StoredKeyResponse {
        user_id,
        masked_key: key.masked(),
        fingerprint: key.fingerprint(),
    }))
}

/// DELETE /api/v1/keys/{user_id}
pub async fn forget_key(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.key_store.remove(&user_id).await? {
        return Err(ApiError::not_found("No API key stored for this user"));
    }
    tracing::info!("Forgot API key for user {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}
