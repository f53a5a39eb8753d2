use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::ApiError;
use crate::metrics::SSE_CONNECTIONS_ACTIVE;
use crate::models::timer::TimerEvent;
use crate::services::AppState;

/// SSE endpoint for timer events
/// GET /api/v1/quizzes/{id}/stream
pub async fn quiz_stream(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run = state
        .runs
        .get(&quiz_id)
        .await
        .ok_or_else(|| ApiError::not_found("Quiz not found"))?;

    tracing::info!("Client connected to SSE stream: quiz={}", quiz_id);
    let stream = timer_stream(run.subscribe(), ConnectionGuard::new(quiz_id));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Keeps the active-connection gauge honest when the client goes away.
struct ConnectionGuard {
    quiz_id: String,
}

impl ConnectionGuard {
    fn new(quiz_id: String) -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self { quiz_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
        tracing::info!("SSE stream closed: quiz={}", self.quiz_id);
    }
}

/// Relays the run's timer events until the run is dropped.
fn timer_stream(
    receiver: broadcast::Receiver<TimerEvent>,
    guard: ConnectionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        loop {
            match receiver.recv().await {
                Ok(timer_event) => {
                    let event = Event::default()
                        .event(timer_event.event_name())
                        .data(timer_event.to_sse_data());
                    return Some((Ok(event), (receiver, guard)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        "SSE client lagging on quiz {}, skipped {} events",
                        guard.quiz_id,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
