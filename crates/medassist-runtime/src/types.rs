//! Runtime result types.

use serde::Serialize;

/// Outcome of indexing one document's chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    #[serde(rename = "indexName")]
    pub index_name: String,
    /// Chunks accepted by the index.
    pub indexed: usize,
    /// Ordinals of chunks whose embedding failed.
    pub skipped: Vec<usize>,
    pub total: usize,
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Generated,
    /// Retrieval found nothing; generation was not attempted.
    NoContext,
    /// Generation failed; a fixed apology was returned.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub contexts: Vec<String>,
    pub source: AnswerSource,
}
