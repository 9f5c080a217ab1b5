//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use medassist_chat::{AzureChatGenerator, GenerationSettings};
use medassist_core::{Error, MedAssistConfig, ProgressEvent, Result};
use medassist_infer::{AzureEmbedder, CachedEmbedder};
use medassist_ingest::{ChunkingConfig, DefaultExtractor, Ingester};
use medassist_runtime::{Orchestrator, Session};
use medassist_store::AzureSearchIndex;

/// Buffered progress events per session before slow subscribers lag.
const EVENT_BUFFER: usize = 256;

struct SessionEntry {
    session: Session,
    events: broadcast::Sender<ProgressEvent>,
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: MedAssistConfig,
    pub ingester: Ingester,
    pub orchestrator: Orchestrator,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl AppState {
    pub fn new(config: MedAssistConfig, ingester: Ingester, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            ingester,
            orchestrator,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Wire the Azure-backed services described by `config`.
    pub fn from_config(config: MedAssistConfig) -> Result<Self> {
        let retry = config.http.retry_policy();

        let embedder = CachedEmbedder::with_defaults(AzureEmbedder::new(
            config.embedding.clone(),
            config.embedding_dim,
            retry,
        )?);
        let index = AzureSearchIndex::new(config.search.clone(), config.embedding_dim, retry)?;
        let generator = AzureChatGenerator::new(
            config.chat.clone(),
            GenerationSettings {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            retry,
        )?;

        let orchestrator = Orchestrator::new(Arc::new(embedder), Arc::new(index), Arc::new(generator))
            .with_concurrency(config.indexing_concurrency);
        let ingester = Ingester::new(
            Arc::new(DefaultExtractor),
            ChunkingConfig::new(config.chunk_size, config.chunk_overlap)?,
        );

        Ok(Self::new(config, ingester, orchestrator))
    }

    pub fn create_session(&self) -> Session {
        let session = Session::new();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        self.sessions.write().insert(
            session.id.clone(),
            SessionEntry {
                session: session.clone(),
                events,
            },
        );
        session
    }

    pub fn session(&self, id: &str) -> Result<Session> {
        self.sessions
            .read()
            .get(id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Run `f` against the session under the write lock.
    ///
    /// `f` is synchronous so the lock is never held across an await.
    pub fn with_session<T>(&self, id: &str, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        f(&mut entry.session)
    }

    pub fn remove_session(&self, id: &str) -> Result<()> {
        self.sessions
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Sender used as the progress observer for work on this session.
    pub fn events(&self, id: &str) -> Result<broadcast::Sender<ProgressEvent>> {
        self.sessions
            .read()
            .get(id)
            .map(|entry| entry.events.clone())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    pub fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<ProgressEvent>> {
        self.events(id).map(|sender| sender.subscribe())
    }
}
