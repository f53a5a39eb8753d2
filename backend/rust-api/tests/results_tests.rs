use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

mod common;
use common::{play_quiz, send, send_json, start_quiz};

async fn completed_result(app: &Router, user_id: &str) -> String {
    let quiz_id = start_quiz(app, user_id, true).await;
    let finished = play_quiz(app, &quiz_id, |i| if i == 2 { None } else { Some(0) }).await;
    finished["result"]["result_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_export_text_report() {
    let app = common::create_test_app();
    let result_id = completed_result(&app, "export-user-1").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/results/{}/export?format=txt", result_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"quiz-results-"));
    assert!(disposition.ends_with(".txt\""));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("QUIZ RESULTS"));
    assert!(text.contains("Score: 1/3 (33%)"));
    assert!(text.contains("Where does photosynthesis happen?"));
    assert!(text.contains("No answer"));
    assert!(text.contains("Chloroplasts hold chlorophyll."));
}

#[tokio::test]
async fn test_export_pdf_report() {
    let app = common::create_test_app();
    let result_id = completed_result(&app, "export-user-2").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/results/{}/export?format=pdf", result_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_export_defaults_to_text() {
    let app = common::create_test_app();
    let result_id = completed_result(&app, "export-user-3").await;

    let (status, bytes) = send(
        &app,
        "GET",
        &format!("/api/v1/results/{}/export", result_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&bytes).starts_with("QUIZ RESULTS"));
}

#[tokio::test]
async fn test_unknown_export_format_rejected() {
    let app = common::create_test_app();
    let result_id = completed_result(&app, "export-user-4").await;

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/results/{}/export?format=docx", result_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_result_removes_it_from_history() {
    let app = common::create_test_app();
    let result_id = completed_result(&app, "export-user-5").await;
    let uri = format!("/api/v1/results/{}", result_id);

    let (status, _) = send_json(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = send_json(&app, "GET", "/api/v1/users/export-user-5/history", None).await;
    assert!(history["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_respects_limit() {
    let app = common::create_test_app();
    for _ in 0..3 {
        completed_result(&app, "export-user-6").await;
    }

    let (status, history) = send_json(
        &app,
        "GET",
        "/api/v1/users/export-user-6/history?limit=2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["history"].as_array().unwrap().len(), 2);
    assert_eq!(history["stats"]["quiz_count"], 3);
}

#[tokio::test]
async fn test_missing_result_is_not_found() {
    let app = common::create_test_app();
    let (status, body) = send_json(&app, "GET", "/api/v1/results/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_metrics_require_credentials() {
    let app = common::create_test_app();
    let (status, _) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
