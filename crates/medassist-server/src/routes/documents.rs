//! Document routes: upload + extraction, chunking, indexing.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use medassist_core::Error;
use medassist_ingest::{ChunkingConfig, Document, ExtractedDocument};
use medassist_runtime::{IndexReport, IndexTicket, Session, Stage};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions/{id}/document",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/sessions/{id}/chunks", post(chunk_document))
        .route("/sessions/{id}/index", post(index_document))
}

#[derive(Debug, Default, Deserialize)]
struct IndexRequest {
    #[serde(rename = "indexName", alias = "index_name")]
    index_name: Option<String>,
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// POST /api/sessions/{id}/document: multipart field `file` (PDF or DOCX).
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    state.session(&id)?.expect_stage(Stage::Upload, "extract")?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("document").to_string();
        let mime = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some((filename, mime, bytes.to_vec()));
        break;
    }
    let (filename, mime, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".into()))?;

    let document = Document::detect(filename, bytes, mime.as_deref())?;
    let extracted = extract_blocking(&state, &id, document).await?;

    let text = extracted.text.as_str().to_string();
    let session = state.with_session(&id, |s| {
        s.extract(extracted)?;
        Ok(s.clone())
    })?;

    Ok(Json(json!({
        "stage": session.stage(),
        "document": session.document(),
        "text": text,
    })))
}

/// Extraction is CPU-bound; run it on the blocking pool under the HTTP timeout.
async fn extract_blocking(
    state: &Arc<AppState>,
    id: &str,
    document: Document,
) -> Result<ExtractedDocument, ApiError> {
    let ingester = state.ingester.clone();
    let events = state.events(id)?;
    let timeout = state.config.http.retry_policy().timeout;

    let task = tokio::task::spawn_blocking(move || ingester.extract(&document, &events));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(e)) => Err(Error::Internal(format!("extraction task failed: {}", e)).into()),
        Err(_) => Err(Error::Timeout(format!("document extraction exceeded {:?}", timeout)).into()),
    }
}

/// POST /api/sessions/{id}/chunks: optional body `{"chunkSize", "overlap"}`.
async fn chunk_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let config = if is_blank(&body) {
        *state.ingester.chunking_config()
    } else {
        serde_json::from_slice::<ChunkingConfig>(&body)
            .map_err(|e| Error::InvalidChunkingConfig(e.to_string()))?
    };

    let text = state.with_session(&id, |s| {
        s.expect_stage(Stage::Extracted, "chunk")?;
        s.document()
            .map(|d| d.text.clone())
            .ok_or_else(|| Error::Internal("extracted session has no document".into()))
    })?;

    let events = state.events(&id)?;
    let chunks = state.ingester.chunk_with_config(&text, config, &events);

    let session = state.with_session(&id, |s| {
        s.chunk(chunks, config)?;
        Ok(s.clone())
    })?;
    info!("Session {} segmented into {} chunks", id, session.chunks().len());

    Ok(Json(json!({
        "stage": session.stage(),
        "chunkingConfig": config,
        "chunkCount": session.chunks().len(),
        "chunks": session.chunks(),
    })))
}

/// Releases the session's indexing claim unless the run finished.
///
/// Covers failed runs and requests dropped mid-flight.
struct IndexingRun<'a> {
    state: &'a AppState,
    id: &'a str,
    ticket: Option<IndexTicket>,
}

impl IndexingRun<'_> {
    fn finish(&mut self, report: IndexReport) -> Result<Session, ApiError> {
        let ticket = self
            .ticket
            .take()
            .ok_or_else(|| Error::Internal("indexing run already finished".into()))?;
        Ok(self.state.with_session(self.id, |s| {
            s.mark_indexed(ticket, report)?;
            Ok(s.clone())
        })?)
    }
}

impl Drop for IndexingRun<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let released = self.state.with_session(self.id, |s| {
                s.abort_indexing(ticket);
                Ok(())
            });
            if released.is_ok() {
                warn!("Session {} indexing run did not complete", self.id);
            }
        }
    }
}

/// POST /api/sessions/{id}/index: optional body `{"indexName"}`.
async fn index_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: IndexRequest = if is_blank(&body) {
        IndexRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let name = request
        .index_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| state.config.index_name.clone());

    let (chunks, ticket) = state.with_session(&id, |s| {
        let ticket = s.begin_indexing()?;
        Ok((s.chunks().to_vec(), ticket))
    })?;
    let mut run = IndexingRun {
        state: &state,
        id: &id,
        ticket: Some(ticket),
    };

    let events = state.events(&id)?;
    state.orchestrator.ensure_index(&name).await?;
    let report = state.orchestrator.index_chunks(&name, &chunks, &events).await?;

    let session = run.finish(report)?;

    Ok(Json(json!({
        "stage": session.stage(),
        "report": session.index(),
    })))
}
