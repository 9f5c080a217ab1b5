//! Structured progress events for long-running document stages.
//!
//! Observers are optional: every stage produces the same output whether or
//! not anyone is listening.

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

/// A stage transition or per-item step inside a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    ExtractionStarted { media_type: String },
    ExtractionFinished { chars: usize },
    ChunkingStarted { chars: usize },
    ChunkingFinished { chunks: usize },
    IndexingStarted { index: String, chunks: usize },
    ChunkEmbedded { ordinal: usize },
    ChunkSkipped { ordinal: usize, reason: String },
    IndexingFinished { indexed: usize, skipped: usize },
}

impl ProgressEvent {
    /// Stage this event belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::ExtractionStarted { .. } | Self::ExtractionFinished { .. } => "extraction",
            Self::ChunkingStarted { .. } | Self::ChunkingFinished { .. } => "chunking",
            Self::IndexingStarted { .. }
            | Self::ChunkEmbedded { .. }
            | Self::ChunkSkipped { .. }
            | Self::IndexingFinished { .. } => "indexing",
        }
    }
}

/// Receives progress events.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that drops everything.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

// A closed receiver just means nobody is subscribed any more.
impl ProgressObserver for mpsc::UnboundedSender<ProgressEvent> {
    fn on_event(&self, event: &ProgressEvent) {
        let _ = self.send(event.clone());
    }
}

impl ProgressObserver for broadcast::Sender<ProgressEvent> {
    fn on_event(&self, event: &ProgressEvent) {
        let _ = self.send(event.clone());
    }
}
