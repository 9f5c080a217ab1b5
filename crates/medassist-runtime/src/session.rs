//! Per-document session: upload → extracted → chunked → indexed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Answer, IndexReport};
use medassist_chat::ChatMessage;
use medassist_core::{Error, Result};
use medassist_ingest::{Chunk, ChunkingConfig, ExtractedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Extracted,
    Chunked,
    Indexed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Upload => write!(f, "upload"),
            Stage::Extracted => write!(f, "extracted"),
            Stage::Chunked => write!(f, "chunked"),
            Stage::Indexed => write!(f, "indexed"),
        }
    }
}

/// Handle on a session's in-flight indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTicket(u64);

/// One user's walk through a single document.
///
/// Every transition checks the current stage and fails with
/// `Error::InvalidTransition` instead of silently doing nothing.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    stage: Stage,
    document: Option<ExtractedDocument>,
    #[serde(rename = "chunkingConfig")]
    chunking_config: Option<ChunkingConfig>,
    chunks: Vec<Chunk>,
    index: Option<IndexReport>,
    history: Vec<ChatMessage>,
    #[serde(skip)]
    indexing: Option<IndexTicket>,
    #[serde(skip)]
    runs: u64,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            stage: Stage::Upload,
            document: None,
            chunking_config: None,
            chunks: Vec::new(),
            index: None,
            history: Vec::new(),
            indexing: None,
            runs: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn document(&self) -> Option<&ExtractedDocument> {
        self.document.as_ref()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> Option<&IndexReport> {
        self.index.as_ref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.is_some()
    }

    /// Fails with `InvalidTransition` unless the session is at `expected`.
    pub fn expect_stage(&self, expected: Stage, action: &str) -> Result<()> {
        if self.stage != expected {
            return Err(Error::InvalidTransition {
                stage: self.stage.to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    fn busy(&self, action: &str) -> Error {
        Error::InvalidTransition {
            stage: format!("{} (indexing)", self.stage),
            action: action.to_string(),
        }
    }

    fn touch(&mut self, stage: Stage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    /// Upload → Extracted.
    pub fn extract(&mut self, document: ExtractedDocument) -> Result<()> {
        self.expect_stage(Stage::Upload, "extract")?;
        self.document = Some(document);
        self.touch(Stage::Extracted);
        Ok(())
    }

    /// Extracted → Chunked.
    pub fn chunk(&mut self, chunks: Vec<Chunk>, config: ChunkingConfig) -> Result<()> {
        self.expect_stage(Stage::Extracted, "chunk")?;
        self.chunks = chunks;
        self.chunking_config = Some(config);
        self.touch(Stage::Chunked);
        Ok(())
    }

    /// Chunked → Extracted; the chunks are dropped, the text is kept.
    pub fn back_to_extracted(&mut self) -> Result<()> {
        self.expect_stage(Stage::Chunked, "go back to extraction")?;
        if self.indexing.is_some() {
            return Err(self.busy("go back to extraction"));
        }
        self.chunks.clear();
        self.chunking_config = None;
        self.touch(Stage::Extracted);
        Ok(())
    }

    /// Claim the chunks for indexing. Only one run may be in flight.
    pub fn begin_indexing(&mut self) -> Result<IndexTicket> {
        self.expect_stage(Stage::Chunked, "index")?;
        if self.indexing.is_some() {
            return Err(self.busy("index"));
        }
        self.runs += 1;
        let ticket = IndexTicket(self.runs);
        self.indexing = Some(ticket);
        self.updated_at = Utc::now();
        Ok(ticket)
    }

    /// Release a run that will not complete. Stale tickets are ignored.
    pub fn abort_indexing(&mut self, ticket: IndexTicket) {
        if self.indexing == Some(ticket) {
            self.indexing = None;
        }
    }

    /// Chunked → Indexed, finishing the run `ticket` started.
    pub fn mark_indexed(&mut self, ticket: IndexTicket, report: IndexReport) -> Result<()> {
        self.expect_stage(Stage::Chunked, "index")?;
        if self.indexing != Some(ticket) {
            return Err(Error::InvalidTransition {
                stage: self.stage.to_string(),
                action: "finish a superseded indexing run".into(),
            });
        }
        self.indexing = None;
        self.index = Some(report);
        self.touch(Stage::Indexed);
        Ok(())
    }

    /// Any stage → Upload, discarding everything.
    pub fn reset(&mut self) {
        self.document = None;
        self.chunking_config = None;
        self.chunks.clear();
        self.index = None;
        self.history.clear();
        self.indexing = None;
        self.touch(Stage::Upload);
    }

    /// Name of the index questions should be asked against.
    pub fn index_name(&self) -> Result<&str> {
        self.expect_stage(Stage::Indexed, "ask a question")?;
        self.index
            .as_ref()
            .map(|r| r.index_name.as_str())
            .ok_or_else(|| Error::Internal("indexed session has no index report".into()))
    }

    /// Append a question/answer pair. Indexed only.
    pub fn record_turn(&mut self, question: &str, answer: &Answer) -> Result<()> {
        self.expect_stage(Stage::Indexed, "ask a question")?;
        self.history.push(ChatMessage::user(question));
        self.history.push(ChatMessage::assistant(answer.answer.as_str()));
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
