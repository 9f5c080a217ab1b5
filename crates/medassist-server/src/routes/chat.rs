//! Question answering over an indexed session.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use medassist_runtime::Answer;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/sessions/{id}/chat", post(chat))
}

#[derive(Debug, Clone, Deserialize)]
struct ChatRequest {
    question: String,
    #[serde(rename = "topK", alias = "top_k")]
    top_k: Option<usize>,
}

/// POST /api/sessions/{id}/chat
async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Answer>, ApiError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".into()));
    }
    let top_k = req.top_k.unwrap_or(state.config.top_k);
    if top_k == 0 {
        return Err(ApiError::BadRequest("topK must be at least 1".into()));
    }

    let index_name = state.with_session(&id, |s| s.index_name().map(str::to_string))?;
    let answer = state.orchestrator.answer(question, &index_name, top_k).await;
    info!(
        "Session {} answered from {} passages ({:?})",
        id,
        answer.contexts.len(),
        answer.source
    );

    state.with_session(&id, |s| s.record_turn(question, &answer))?;
    Ok(Json(answer))
}
