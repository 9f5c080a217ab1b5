//! Embedding backend trait.

use async_trait::async_trait;

use medassist_core::Result;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Embed one text. Fails with `Error::EmbeddingService` or `Error::Timeout`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this backend returns.
    fn dimension(&self) -> usize;
}
