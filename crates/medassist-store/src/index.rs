//! Vector index trait.

use async_trait::async_trait;

use crate::types::IndexDocument;
use medassist_core::Result;

/// A named collection of `(id, content, embedding)` records searchable by vector.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create the index if it does not exist. Returns `true` when it was created.
    async fn ensure_index(&self, name: &str) -> Result<bool>;

    /// Insert or replace documents by id. Returns how many were accepted.
    async fn upsert(&self, name: &str, documents: &[IndexDocument]) -> Result<usize>;

    /// Contents of the `top_k` nearest documents, most similar first.
    async fn vector_search(&self, name: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<String>>;
}
