//! Embedding cache decorator.
//!
//! Physicians often re-ask the same question; caching its vector saves one
//! embedding round-trip per repeat. Default: 256 entries, 30-minute TTL.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::embedder::EmbedderBackend;
use medassist_core::Result;

struct Entry {
    vector: Vec<f32>,
    stored_at: Instant,
}

struct Slots {
    entries: HashMap<String, Entry>,
    /// Least recently used at the front.
    recency: VecDeque<String>,
}

impl Slots {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn forget(&mut self, key: &str) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

/// Wraps an [`EmbedderBackend`] with a bounded LRU + TTL cache.
///
/// Failed embeddings are never cached.
pub struct CachedEmbedder<E> {
    inner: E,
    slots: Mutex<Slots>,
    capacity: usize,
    ttl: Duration,
}

impl<E: EmbedderBackend> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            slots: Mutex::new(Slots {
                entries: HashMap::with_capacity(capacity),
                recency: VecDeque::with_capacity(capacity),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn with_defaults(inner: E) -> Self {
        Self::new(inner, 256, Duration::from_secs(1800))
    }

    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        let mut slots = self.slots.lock();
        let fresh = slots.entries.get(key).map(|e| e.stored_at.elapsed() < self.ttl)?;
        if !fresh {
            slots.forget(key);
            return None;
        }
        let vector = slots.entries.get(key).map(|e| e.vector.clone());
        slots.touch(key);
        vector
    }

    fn store(&self, key: &str, vector: Vec<f32>) {
        let mut slots = self.slots.lock();
        slots.forget(key);
        while slots.entries.len() >= self.capacity {
            match slots.recency.pop_front() {
                Some(oldest) => {
                    slots.entries.remove(&oldest);
                }
                None => break,
            }
        }
        slots.recency.push_back(key.to_string());
        slots.entries.insert(
            key.to_string(),
            Entry {
                vector,
                stored_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl<E: EmbedderBackend> EmbedderBackend for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.lookup(text) {
            debug!("Embedding cache hit ({} chars)", text.len());
            return Ok(vector);
        }
        let vector = self.inner.embed(text).await?;
        self.store(text, vector.clone());
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
