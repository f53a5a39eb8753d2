use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use super::ApiError;
use crate::errors::QuizError;
use crate::extractors::{AppJson, ValidatedJson};
use crate::models::api_key::ApiKey;
use crate::models::quiz::QuizSettings;
use crate::models::result::{QuizRecord, QuizResult};
use crate::models::{
    CreateQuizRequest, RunSnapshot, SelectAnswerRequest, TransitionResponse, MIN_CONTENT_CHARS,
};
use crate::services::quiz_runner::{AdvanceOutcome, QuizRunner};
use crate::services::run_registry::RunHandle;
use crate::services::AppState;

async fn snapshot(run: &RunHandle) -> RunSnapshot {
    let result_id = run.result_id.lock().await.clone();
    let runner = run.runner.lock().await;
    RunSnapshot::capture(&run.id, &run.user_id, &runner, result_id)
}

async fn find_run(state: &AppState, quiz_id: &str) -> Result<Arc<RunHandle>, ApiError> {
    state
        .runs
        .get(quiz_id)
        .await
        .ok_or_else(|| ApiError::not_found("Quiz not found"))
}

/// Request key first, then the key remembered for the user.
async fn resolve_key(state: &AppState, req: &CreateQuizRequest) -> Result<ApiKey, ApiError> {
    if let Some(raw) = req.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return Ok(ApiKey::new(raw));
    }
    state
        .key_store
        .get(&req.user_id)
        .await?
        .ok_or_else(|| {
            QuizError::InvalidKeyFormat(
                "API key is required. Please enter your generation API key.".into(),
            )
            .into()
        })
}

/// POST /api/v1/quizzes
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().chars().count() < MIN_CONTENT_CHARS {
        return Err(ApiError::bad_request(format!(
            "Please provide at least {} characters of content for better question generation.",
            MIN_CONTENT_CHARS
        )));
    }
    let seconds_per_question = req.time_per_question.resolve(req.custom_time)?;

    if let Some(key) = req.idempotency_key.as_deref() {
        if let Some(existing) = state.runs.find_by_idempotency(&req.user_id, key).await {
            tracing::info!(
                "Duplicate quiz submission for user {}, returning quiz {}",
                req.user_id,
                existing.id
            );
            return Ok((StatusCode::OK, Json(snapshot(&existing).await)));
        }
    }

    let api_key = resolve_key(&state, &req).await?;
    let settings = QuizSettings::new(
        req.content.as_str(),
        api_key,
        req.question_count,
        seconds_per_question,
        req.show_explanations,
    )?;

    let questions = state.generation.generate_questions(&settings).await?;
    let runner = QuizRunner::new(questions, &settings)?;

    let (run, created) = state
        .runs
        .start(&req.user_id, runner, req.idempotency_key.as_deref())
        .await;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(snapshot(&run).await)))
}

/// GET /api/v1/quizzes/{id}
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run = find_run(&state, &quiz_id).await?;
    Ok(Json(snapshot(&run).await))
}

/// POST /api/v1/quizzes/{id}/select
pub async fn select_answer(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<SelectAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let run = find_run(&state, &quiz_id).await?;
    let applied = run.runner.lock().await.select_answer(req.answer_index);
    Ok(Json(TransitionResponse {
        applied,
        snapshot: snapshot(&run).await,
    }))
}

/// POST /api/v1/quizzes/{id}/submit
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run = find_run(&state, &quiz_id).await?;
    let applied = run.runner.lock().await.submit_answer();
    Ok(Json(TransitionResponse {
        applied,
        snapshot: snapshot(&run).await,
    }))
}

/// POST /api/v1/quizzes/{id}/advance
///
/// Completing the last question saves the result and bumps the user's
/// stats. A failed save is logged and the completed run is still returned.
pub async fn advance(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run = find_run(&state, &quiz_id).await?;

    let (outcome, completed) = {
        let mut runner = run.runner.lock().await;
        let outcome = runner.advance();
        let completed = match outcome {
            AdvanceOutcome::Completed => runner.result().cloned(),
            _ => None,
        };
        (outcome, completed)
    };

    if let Some(result) = completed {
        let result_id = persist_completed(&state, &run, &result).await;
        *run.result_id.lock().await = result_id;
        run.finish();
    }

    Ok(Json(TransitionResponse {
        applied: outcome != AdvanceOutcome::NotApplied,
        snapshot: snapshot(&run).await,
    }))
}

async fn persist_completed(
    state: &AppState,
    run: &RunHandle,
    result: &QuizResult,
) -> Option<String> {
    let record = QuizRecord::from_result(&run.user_id, result, run.started_at, Utc::now());

    let result_id = match state.store.save_result(record).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::error!("Failed to save quiz result for quiz {}: {:#}", run.id, e);
            None
        }
    };

    if let Err(e) = state
        .store
        .update_user_stats(&run.user_id, result.score)
        .await
    {
        tracing::warn!("Failed to update stats for user {}: {:#}", run.user_id, e);
    }

    tracing::info!(
        "Quiz completed: quiz={}, user={}, score={}/{}",
        run.id,
        run.user_id,
        result.score,
        result.total_questions
    );
    result_id
}

/// DELETE /api/v1/quizzes/{id}
pub async fn abandon_quiz(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.runs.remove(&quiz_id).await {
        return Err(ApiError::not_found("Quiz not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
