//! Document ingestion pipeline: bytes → text → normalized text → chunks.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::chunking::{Chunk, Chunker, ChunkingConfig};
use crate::file::{DefaultExtractor, Document, MediaType, TextExtractor};
use crate::normalize::ExtractedText;
use medassist_core::{NoopObserver, ProgressEvent, ProgressObserver, Result};

/// Extraction output for one uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDocument {
    pub filename: String,
    #[serde(rename = "mediaType")]
    pub media_type: MediaType,
    #[serde(skip)]
    pub text: ExtractedText,
    /// Character count before whitespace normalization.
    #[serde(rename = "rawChars")]
    pub raw_chars: usize,
    #[serde(rename = "contentHash")]
    pub content_hash: String,
}

impl ExtractedDocument {
    pub fn chars(&self) -> usize {
        self.text.char_len()
    }
}

/// A document that went through extraction and chunking.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document: ExtractedDocument,
    pub chunks: Vec<Chunk>,
}

/// Handles document ingestion: text extraction and chunking.
#[derive(Clone)]
pub struct Ingester {
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
}

impl Default for Ingester {
    fn default() -> Self {
        Self::new(Arc::new(DefaultExtractor), ChunkingConfig::default())
    }
}

impl Ingester {
    pub fn new(extractor: Arc<dyn TextExtractor>, config: ChunkingConfig) -> Self {
        Self {
            extractor,
            chunker: Chunker::new(config),
        }
    }

    pub fn chunking_config(&self) -> &ChunkingConfig {
        self.chunker.config()
    }

    /// Extract and normalize a document's text.
    pub fn extract(
        &self,
        document: &Document,
        observer: &dyn ProgressObserver,
    ) -> Result<ExtractedDocument> {
        observer.on_event(&ProgressEvent::ExtractionStarted {
            media_type: document.media_type.to_string(),
        });

        let raw = self.extractor.extract(&document.bytes, document.media_type)?;
        let text = ExtractedText::new(&raw);
        let extracted = ExtractedDocument {
            filename: document.filename.clone(),
            media_type: document.media_type,
            raw_chars: raw.chars().count(),
            content_hash: content_hash(text.as_str()),
            text,
        };

        info!(
            "Extracted {} chars from {} ({})",
            extracted.chars(),
            extracted.filename,
            extracted.media_type
        );
        observer.on_event(&ProgressEvent::ExtractionFinished {
            chars: extracted.chars(),
        });
        Ok(extracted)
    }

    /// Chunk with this ingester's default config.
    pub fn chunk(&self, text: &ExtractedText, observer: &dyn ProgressObserver) -> Vec<Chunk> {
        self.chunker.chunk_with(text, observer)
    }

    /// Chunk with an explicit config.
    pub fn chunk_with_config(
        &self,
        text: &ExtractedText,
        config: ChunkingConfig,
        observer: &dyn ProgressObserver,
    ) -> Vec<Chunk> {
        Chunker::new(config).chunk_with(text, observer)
    }

    /// Extract and chunk in one call.
    pub fn process(&self, document: &Document) -> Result<ProcessedDocument> {
        self.process_with(document, &NoopObserver)
    }

    pub fn process_with(
        &self,
        document: &Document,
        observer: &dyn ProgressObserver,
    ) -> Result<ProcessedDocument> {
        let extracted = self.extract(document, observer)?;
        let chunks = self.chunk(&extracted.text, observer);
        info!("Segmented {} into {} chunks", extracted.filename, chunks.len());
        Ok(ProcessedDocument {
            document: extracted,
            chunks,
        })
    }
}

/// Compute SHA-256 content hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medassist_core::Error;
    use std::sync::Mutex;

    struct CannedExtractor(&'static str);

    impl TextExtractor for CannedExtractor {
        fn extract(&self, _bytes: &[u8], _media_type: MediaType) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract(&self, _bytes: &[u8], _media_type: MediaType) -> Result<String> {
            Err(Error::CorruptDocument("bad xref".into()))
        }
    }

    fn pdf() -> Document {
        Document::new("cr.pdf", b"%PDF".to_vec(), MediaType::Pdf)
    }

    #[test]
    fn test_process_normalizes_and_chunks() {
        let ingester = Ingester::new(
            Arc::new(CannedExtractor("Patient  admis.\n\nBilan   normal. ")),
            ChunkingConfig::new(10, 2).unwrap(),
        );
        let processed = ingester.process(&pdf()).unwrap();

        assert_eq!(processed.document.text.as_str(), "Patient admis. Bilan normal.");
        assert_eq!(processed.document.raw_chars, 33);
        assert_eq!(processed.document.content_hash.len(), 64);
        assert!(processed.chunks.len() > 1);
    }

    #[test]
    fn test_events_emitted_in_order() {
        let ingester = Ingester::new(Arc::new(CannedExtractor("abc")), ChunkingConfig::default());
        let stages = Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| stages.lock().unwrap().push(e.clone());

        ingester.process_with(&pdf(), &observer).unwrap();

        let stages = stages.into_inner().unwrap();
        assert_eq!(
            stages,
            vec![
                ProgressEvent::ExtractionStarted { media_type: "pdf".into() },
                ProgressEvent::ExtractionFinished { chars: 3 },
                ProgressEvent::ChunkingStarted { chars: 3 },
                ProgressEvent::ChunkingFinished { chunks: 1 },
            ]
        );
    }

    #[test]
    fn test_extraction_error_propagates() {
        let ingester = Ingester::new(Arc::new(FailingExtractor), ChunkingConfig::default());
        assert!(matches!(ingester.process(&pdf()), Err(Error::CorruptDocument(_))));
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(
            content_hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
