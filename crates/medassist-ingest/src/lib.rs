//! MedAssist Ingest: text normalization, chunking, document extraction.

pub mod chunking;
pub mod file;
pub mod ingest;
pub mod normalize;

pub use chunking::{chunk_text, Chunk, Chunker, ChunkingConfig};
pub use file::{DefaultExtractor, Document, MediaType, TextExtractor};
pub use ingest::{ExtractedDocument, Ingester, ProcessedDocument};
pub use normalize::{normalize, ExtractedText};
