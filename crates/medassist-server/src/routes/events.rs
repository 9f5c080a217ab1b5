//! Server-Sent Events stream of a session's progress events.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/sessions/{id}/events", get(session_events))
}

/// GET /api/sessions/{id}/events
///
/// Ends when the session is deleted; a dropped connection drops the receiver.
async fn session_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<KeepAliveStream<SseStream>>, ApiError> {
    let mut receiver = state.subscribe(&id)?;

    let stream: SseStream = Box::pin(async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok::<_, Infallible>(Event::default().event(event.stage()).data(data));
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event subscriber for session {} missed {} events", id, missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
