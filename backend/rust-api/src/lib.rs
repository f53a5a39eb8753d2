use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/keys", keys_routes())
        .merge(quizzes_routes())
        .nest("/api/v1/results", results_routes())
        .route(
            "/api/v1/users/{user_id}/history",
            get(handlers::results::user_history),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn keys_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/verify", post(handlers::keys::verify_key))
        .route(
            "/{user_id}",
            get(handlers::keys::get_key).delete(handlers::keys::forget_key),
        )
}

fn quizzes_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/quizzes", post(handlers::quizzes::create_quiz))
        .route(
            "/api/v1/quizzes/{id}",
            get(handlers::quizzes::get_quiz).delete(handlers::quizzes::abandon_quiz),
        )
        .route(
            "/api/v1/quizzes/{id}/select",
            post(handlers::quizzes::select_answer),
        )
        .route(
            "/api/v1/quizzes/{id}/submit",
            post(handlers::quizzes::submit_answer),
        )
        .route("/api/v1/quizzes/{id}/advance", post(handlers::quizzes::advance))
        .route("/api/v1/quizzes/{id}/stream", get(handlers::sse::quiz_stream))
}

fn results_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::results::get_result).delete(handlers::results::delete_result),
        )
        .route("/{id}/export", get(handlers::results::export_result))
}
