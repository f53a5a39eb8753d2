#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use smartquiz_api::{
    config::{Config, KeyStoreConfig, QuizRuntimeConfig, StorageConfig},
    create_router,
    services::{
        generation_client::{GenerationClient, VERIFICATION_PROMPT},
        generation_provider::{GenerationProvider, GenerationRequest, ProviderError, ProviderInfo},
        key_store::FileKeyStore,
        local_quiz_store::LocalQuizStore,
        AppState,
    },
};

pub const VALID_KEY: &str = "test-key-0123456789";
/// Keys with this prefix are rejected upstream as invalid.
pub const REJECTED_KEY: &str = "bad-key-0123456789";

pub const STUDY_TEXT: &str = "Photosynthesis converts light energy into chemical energy. \
    Chlorophyll in the chloroplasts absorbs mostly red and blue light, and the Calvin cycle \
    fixes carbon dioxide into sugars using ATP and NADPH produced by the light reactions.";

const CANNED_QUIZ: &str = r#"```json
[
  {"question": "Where does photosynthesis happen?", "options": ["Chloroplast", "Nucleus", "Ribosome", "Vacuole"], "correctAnswer": 0, "explanation": "Chloroplasts hold chlorophyll."},
  {"question": "Which pigment absorbs light?", "options": ["Keratin", "Chlorophyll", "Melanin", "Hemoglobin"], "correctAnswer": 1, "explanation": "Chlorophyll absorbs red and blue light."},
  {"question": "What does the Calvin cycle fix?", "options": ["Oxygen", "Nitrogen", "Carbon dioxide", "Water"], "correctAnswer": 2, "explanation": "It fixes CO2 into sugars."}
]
```"#;

/// Stands in for the hosted model: answers the key check and returns a
/// fixed three-question quiz for anything else.
pub struct FakeProvider;

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        if request.api_key.expose().starts_with("bad-") {
            return Err(ProviderError::Http {
                status: 400,
                message: "API key not valid. Please pass a valid API key.".into(),
            });
        }
        if request.prompt == VERIFICATION_PROMPT {
            return Ok("API key is working correctly".into());
        }
        Ok(CANNED_QUIZ.into())
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "fake".into(),
            model: "fake-model".into(),
        }
    }
}

pub fn test_config() -> Config {
    let dir = std::env::temp_dir().join(format!("smartquiz-tests-{}", Uuid::new_v4()));
    Config {
        bind_addr: "127.0.0.1:0".into(),
        storage: StorageConfig {
            local_path: dir.join("results.json").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        },
        key_store: KeyStoreConfig {
            local_path: dir.join("keys.json").to_string_lossy().into_owned(),
            ..KeyStoreConfig::default()
        },
        // Timer ticks stay out of the way of request-driven tests.
        quiz: QuizRuntimeConfig {
            tick_interval_ms: 60_000,
            run_ttl_secs: 3600,
        },
        ..Config::default()
    }
}

pub fn create_test_app() -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = test_config();
    let store = Arc::new(LocalQuizStore::new(&config.storage.local_path));
    let key_store = Arc::new(FileKeyStore::new(&config.key_store.local_path));
    let generation = GenerationClient::new(Arc::new(FakeProvider), config.generation.clone());

    let state = AppState::from_parts(config, store, key_store, generation);
    create_router(Arc::new(state))
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!(
                "non-JSON body ({}) with status {}: {}",
                e,
                status,
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, json)
}

/// Creates a quiz for `user_id` and returns its id.
pub async fn start_quiz(app: &Router, user_id: &str, show_explanations: bool) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/v1/quizzes",
        Some(serde_json::json!({
            "user_id": user_id,
            "content": STUDY_TEXT,
            "api_key": VALID_KEY,
            "question_count": 3,
            "time_per_question": "30",
            "show_explanations": show_explanations,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create quiz failed: {}", body);
    body["quiz_id"].as_str().unwrap().to_string()
}

/// Answers every question with `answer_for(index)` and returns the final snapshot.
pub async fn play_quiz(
    app: &Router,
    quiz_id: &str,
    answer_for: impl Fn(usize) -> Option<usize>,
) -> serde_json::Value {
    let mut last = serde_json::Value::Null;
    for index in 0..3 {
        if let Some(answer) = answer_for(index) {
            let (status, _) = send_json(
                app,
                "POST",
                &format!("/api/v1/quizzes/{}/select", quiz_id),
                Some(serde_json::json!({ "answer_index": answer })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = send_json(
            app,
            "POST",
            &format!("/api/v1/quizzes/{}/submit", quiz_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            app,
            "POST",
            &format!("/api/v1/quizzes/{}/advance", quiz_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        last = body;
    }
    last
}
