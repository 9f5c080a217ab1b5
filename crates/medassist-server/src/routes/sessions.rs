//! Session lifecycle routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use medassist_runtime::Session;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/back", post(back_to_extracted))
        .route("/sessions/{id}/reset", post(reset_session))
}

/// POST /api/sessions
async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.create_session();
    info!("Created session {}", session.id);
    (StatusCode::CREATED, Json(session))
}

/// GET /api/sessions/{id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.session(&id)?))
}

/// DELETE /api/sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.remove_session(&id)?;
    info!("Deleted session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/{id}/back: drop the chunks, keep the extracted text.
async fn back_to_extracted(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state.with_session(&id, |s| {
        s.back_to_extracted()?;
        Ok(s.clone())
    })?;
    Ok(Json(session))
}

/// POST /api/sessions/{id}/reset: start over with a new document.
async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state.with_session(&id, |s| {
        s.reset();
        Ok(s.clone())
    })?;
    Ok(Json(session))
}
