use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{send, send_json, STUDY_TEXT, VALID_KEY};

#[tokio::test]
async fn test_verify_and_remember_key() {
    let app = common::create_test_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-1", "api_key": VALID_KEY })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["remembered"], true);
    assert_eq!(body["masked_key"], "test-...56789");
    assert_eq!(body["fingerprint"].as_str().unwrap().len(), 8);

    let (status, stored) = send_json(&app, "GET", "/api/v1/keys/key-user-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["masked_key"], "test-...56789");
    assert_eq!(stored["fingerprint"], body["fingerprint"]);
}

#[tokio::test]
async fn test_key_never_echoed_in_full() {
    let app = common::create_test_app();
    send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-2", "api_key": VALID_KEY })),
    )
    .await;

    let (_, bytes) = send(&app, "GET", "/api/v1/keys/key-user-2", None).await;
    assert!(!String::from_utf8_lossy(&bytes).contains(VALID_KEY));
}

#[tokio::test]
async fn test_verify_without_remember_stores_nothing() {
    let app = common::create_test_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-3", "api_key": VALID_KEY, "remember": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remembered"], false);

    let (status, _) = send_json(&app, "GET", "/api/v1/keys/key-user-3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_key_rejected_without_network() {
    let app = common::create_test_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-4", "api_key": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_rejected_key_is_unauthorized_and_not_stored() {
    let app = common::create_test_app();
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-5", "api_key": common::REJECTED_KEY })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&app, "GET", "/api/v1/keys/key-user-5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forget_key() {
    let app = common::create_test_app();
    send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-6", "api_key": VALID_KEY })),
    )
    .await;

    let (status, _) = send_json(&app, "DELETE", "/api/v1/keys/key-user-6", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "DELETE", "/api/v1/keys/key-user-6", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remembered_key_used_for_quiz_creation() {
    let app = common::create_test_app();
    send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-7", "api_key": VALID_KEY })),
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/quizzes",
        Some(json!({
            "user_id": "key-user-7",
            "content": STUDY_TEXT,
            "question_count": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    // Three generated, two requested.
    assert_eq!(body["total_questions"], 2);
}

#[tokio::test]
async fn test_malformed_body_returns_json_error() {
    let app = common::create_test_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/keys/verify",
        Some(json!({ "user_id": "key-user-8" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}
