//! MedAssist Infer: embedding backends.
//!
//! `EmbedderBackend` abstracts the external embedding service. `AzureEmbedder`
//! calls an Azure OpenAI embeddings deployment; `CachedEmbedder` wraps any
//! backend with a TTL cache so repeated questions skip the network.

pub mod azure;
pub mod cache;
pub mod embedder;

pub use azure::AzureEmbedder;
pub use cache::CachedEmbedder;
pub use embedder::EmbedderBackend;
