//! Orchestrator: embeds chunks into an index and answers questions over it.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::types::{Answer, AnswerSource, IndexReport};
use medassist_chat::{fallback_answer, AnswerGenerator, NO_CONTEXT_ANSWER};
use medassist_core::{ProgressEvent, ProgressObserver, Result};
use medassist_infer::EmbedderBackend;
use medassist_ingest::Chunk;
use medassist_store::{IndexDocument, SearchIndex};

/// Default number of embedding requests in flight while indexing.
pub const DEFAULT_CONCURRENCY: usize = 4;

pub struct Orchestrator {
    embedder: Arc<dyn EmbedderBackend>,
    index: Arc<dyn SearchIndex>,
    generator: Arc<dyn AnswerGenerator>,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        embedder: Arc<dyn EmbedderBackend>,
        index: Arc<dyn SearchIndex>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Create the index if missing. Returns `true` when it was created.
    pub async fn ensure_index(&self, name: &str) -> Result<bool> {
        self.index.ensure_index(name).await
    }

    /// Embed every chunk and upsert the ones that embedded successfully.
    ///
    /// A chunk whose embedding fails is skipped, not fatal. A failed upsert
    /// fails the whole batch.
    pub async fn index_chunks(
        &self,
        name: &str,
        chunks: &[Chunk],
        observer: &dyn ProgressObserver,
    ) -> Result<IndexReport> {
        observer.on_event(&ProgressEvent::IndexingStarted {
            index: name.to_string(),
            chunks: chunks.len(),
        });

        let embedder = &self.embedder;
        let mut embedded = stream::iter(chunks.iter())
            .map(|chunk| async move {
                if chunk.text.is_empty() {
                    return (chunk, None);
                }
                (chunk, Some(embedder.embed(&chunk.text).await))
            })
            .buffered(self.concurrency)
            .boxed();

        let mut documents = Vec::with_capacity(chunks.len());
        let mut skipped = Vec::new();
        while let Some((chunk, outcome)) = embedded.next().await {
            let reason = match outcome {
                Some(Ok(vector)) => {
                    observer.on_event(&ProgressEvent::ChunkEmbedded {
                        ordinal: chunk.index,
                    });
                    documents.push(IndexDocument::for_chunk(chunk.index, chunk.text.clone(), vector));
                    continue;
                }
                Some(Err(e)) => e.to_string(),
                None => "empty chunk".to_string(),
            };
            warn!("Skipping chunk {}: {}", chunk.index, reason);
            observer.on_event(&ProgressEvent::ChunkSkipped {
                ordinal: chunk.index,
                reason,
            });
            skipped.push(chunk.index);
        }

        let indexed = if documents.is_empty() {
            0
        } else {
            self.index.upsert(name, &documents).await?
        };

        info!(
            "Indexed {}/{} chunks into {} ({} skipped)",
            indexed,
            chunks.len(),
            name,
            skipped.len()
        );
        observer.on_event(&ProgressEvent::IndexingFinished {
            indexed,
            skipped: skipped.len(),
        });

        Ok(IndexReport {
            index_name: name.to_string(),
            indexed,
            skipped,
            total: chunks.len(),
        })
    }

    /// Up to `top_k` passages most similar to `query`. Failures yield no passages.
    pub async fn retrieve(&self, query: &str, name: &str, top_k: usize) -> Vec<String> {
        let top_k = top_k.max(1);
        let vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Query embedding failed, no passages retrieved: {}", e);
                return Vec::new();
            }
        };
        match self.index.vector_search(name, &vector, top_k).await {
            Ok(mut passages) => {
                passages.truncate(top_k);
                passages
            }
            Err(e) => {
                warn!("Search on {} failed, no passages retrieved: {}", name, e);
                Vec::new()
            }
        }
    }

    /// Retrieve, then generate a grounded answer.
    pub async fn answer(&self, query: &str, name: &str, top_k: usize) -> Answer {
        let contexts = self.retrieve(query, name, top_k).await;
        if contexts.is_empty() {
            return Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                contexts,
                source: AnswerSource::NoContext,
            };
        }

        match self.generator.generate(query, &contexts).await {
            Ok(answer) => Answer {
                answer,
                contexts,
                source: AnswerSource::Generated,
            },
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                Answer {
                    answer: fallback_answer(&e).to_string(),
                    contexts,
                    source: AnswerSource::Fallback,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medassist_chat::{ERROR_ANSWER, FALLBACK_ANSWER};
    use medassist_core::{Error, NoopObserver, ServiceFailure};
    use medassist_store::InMemoryIndex;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Embeds text as a 3-dim bag of keywords; fails for text containing "#fail".
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbedderBackend for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("#fail") {
                return Err(Error::EmbeddingService(ServiceFailure::http(400, "rejected")));
            }
            let count = |w: &str| text.matches(w).count() as f32;
            Ok(vec![count("coeur"), count("rein"), count("foie") + 0.01])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    struct UnreachableEmbedder;

    #[async_trait]
    impl EmbedderBackend for UnreachableEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::Timeout("embedding request exceeded 30s".into()))
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        called: AtomicBool,
        fail_with: Option<ServiceFailure>,
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn generate(&self, question: &str, contexts: &[String]) -> Result<String> {
            self.called.store(true, Ordering::SeqCst);
            match &self.fail_with {
                Some(f) => Err(Error::GenerationService(f.clone())),
                None => Ok(format!("{} ({} passages)", question, contexts.len())),
            }
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            start_char: 0,
            end_char: text.chars().count(),
        }
    }

    async fn orchestrator(
        embedder: Arc<dyn EmbedderBackend>,
        generator: Arc<RecordingGenerator>,
    ) -> (Orchestrator, Arc<InMemoryIndex>) {
        let index = Arc::new(InMemoryIndex::new(3));
        index.ensure_index("cr").await.unwrap();
        let orch = Orchestrator::new(embedder, index.clone(), generator).with_concurrency(3);
        (orch, index)
    }

    #[tokio::test]
    async fn test_failed_chunk_skipped_others_indexed() {
        let (orch, index) = orchestrator(Arc::new(KeywordEmbedder), Arc::default()).await;
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| {
                if i == 4 {
                    chunk(i, "#fail")
                } else {
                    chunk(i, &format!("coeur {}", i))
                }
            })
            .collect();

        let report = orch.index_chunks("cr", &chunks, &NoopObserver).await.unwrap();
        assert_eq!(report.indexed, 9);
        assert_eq!(report.skipped, vec![4]);
        assert_eq!(report.total, 10);
        assert_eq!(index.len("cr"), Some(9));
    }

    #[tokio::test]
    async fn test_progress_events_in_chunk_order() {
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), Arc::default()).await;
        let chunks = vec![chunk(0, "coeur"), chunk(1, "#fail"), chunk(2, "rein")];
        let events = Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| events.lock().push(e.clone());

        orch.index_chunks("cr", &chunks, &observer).await.unwrap();

        let events = events.into_inner();
        assert_eq!(
            events.first(),
            Some(&ProgressEvent::IndexingStarted { index: "cr".into(), chunks: 3 })
        );
        assert_eq!(events[1], ProgressEvent::ChunkEmbedded { ordinal: 0 });
        assert!(matches!(events[2], ProgressEvent::ChunkSkipped { ordinal: 1, .. }));
        assert_eq!(events[3], ProgressEvent::ChunkEmbedded { ordinal: 2 });
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::IndexingFinished { indexed: 2, skipped: 1 })
        );
    }

    #[tokio::test]
    async fn test_all_chunks_failing_skips_upsert() {
        let (orch, index) = orchestrator(Arc::new(UnreachableEmbedder), Arc::default()).await;
        let report = orch
            .index_chunks("cr", &[chunk(0, "coeur"), chunk(1, "rein")], &NoopObserver)
            .await
            .unwrap();
        assert_eq!(report.indexed, 0);
        assert_eq!(report.skipped, vec![0, 1]);
        assert_eq!(index.len("cr"), Some(0));
    }

    #[tokio::test]
    async fn test_upsert_failure_is_fatal() {
        let index = Arc::new(InMemoryIndex::new(3));
        let orch = Orchestrator::new(Arc::new(KeywordEmbedder), index, Arc::new(RecordingGenerator::default()));
        let err = orch
            .index_chunks("never-created", &[chunk(0, "coeur")], &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexService(_)));
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_limits() {
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), Arc::default()).await;
        let chunks = vec![
            chunk(0, "rein rein"),
            chunk(1, "coeur coeur coeur"),
            chunk(2, "foie"),
            chunk(3, "coeur et rein"),
        ];
        orch.index_chunks("cr", &chunks, &NoopObserver).await.unwrap();

        let passages = orch.retrieve("le coeur", "cr", 2).await;
        assert_eq!(passages, vec!["coeur coeur coeur".to_string(), "coeur et rein".to_string()]);
        assert_eq!(orch.retrieve("le coeur", "cr", 0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_index_is_empty() {
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), Arc::default()).await;
        assert!(orch.retrieve("coeur", "absent", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_no_passages_skips_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        let (orch, _) = orchestrator(Arc::new(UnreachableEmbedder), generator.clone()).await;

        let answer = orch.answer("coeur ?", "cr", 3).await;
        assert_eq!(answer.source, AnswerSource::NoContext);
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.contexts.is_empty());
        assert!(!generator.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_index_skips_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), generator.clone()).await;

        let answer = orch.answer("coeur ?", "absent", 3).await;
        assert_eq!(answer.source, AnswerSource::NoContext);
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.contexts.is_empty());
        assert!(!generator.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_passages() {
        let generator = Arc::new(RecordingGenerator::default());
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), generator.clone()).await;
        orch.index_chunks("cr", &[chunk(0, "coeur"), chunk(1, "rein")], &NoopObserver)
            .await
            .unwrap();

        let answer = orch.answer("coeur ?", "cr", 3).await;
        assert_eq!(answer.source, AnswerSource::Generated);
        assert_eq!(answer.answer, "coeur ? (2 passages)");
        assert_eq!(answer.contexts[0], "coeur");
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back() {
        let status = Arc::new(RecordingGenerator {
            fail_with: Some(ServiceFailure::http(500, "down")),
            ..Default::default()
        });
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), status).await;
        orch.index_chunks("cr", &[chunk(0, "coeur")], &NoopObserver)
            .await
            .unwrap();
        let answer = orch.answer("coeur ?", "cr", 1).await;
        assert_eq!(answer.source, AnswerSource::Fallback);
        assert_eq!(answer.answer, FALLBACK_ANSWER);

        let transport = Arc::new(RecordingGenerator {
            fail_with: Some(ServiceFailure::transport("reset")),
            ..Default::default()
        });
        let (orch, _) = orchestrator(Arc::new(KeywordEmbedder), transport).await;
        orch.index_chunks("cr", &[chunk(0, "coeur")], &NoopObserver)
            .await
            .unwrap();
        assert_eq!(orch.answer("coeur ?", "cr", 1).await.answer, ERROR_ANSWER);
    }
}
