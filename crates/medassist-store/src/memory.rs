//! In-process vector index for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use parking_lot::RwLock;
use tracing::debug;

use crate::index::SearchIndex;
use crate::types::IndexDocument;
use medassist_core::{Error, Result, ServiceFailure};

/// Rows are unit-normalized so cosine similarity is a dot product.
struct Collection {
    matrix: Array2<f32>,
    ids: Vec<String>,
    contents: Vec<String>,
}

impl Collection {
    fn new(dimensions: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dimensions)),
            ids: Vec::new(),
            contents: Vec::new(),
        }
    }

    fn upsert(&mut self, doc: &IndexDocument) -> bool {
        let Some(row) = unit(ArrayView1::from(doc.embedding.as_slice())) else {
            return false;
        };
        match self.ids.iter().position(|id| *id == doc.id) {
            Some(pos) => {
                self.matrix.row_mut(pos).assign(&row);
                self.contents[pos] = doc.content.clone();
                true
            }
            None => {
                if self.matrix.push(Axis(0), row.view()).is_err() {
                    return false;
                }
                self.ids.push(doc.id.clone());
                self.contents.push(doc.content.clone());
                true
            }
        }
    }
}

fn unit(v: ArrayView1<f32>) -> Option<Array1<f32>> {
    let norm = v.dot(&v).sqrt();
    if norm < 1e-9 {
        return None;
    }
    Some(&v / norm)
}

fn not_found(name: &str) -> Error {
    Error::IndexService(ServiceFailure::http(404, format!("index {} not found", name)))
}

/// Cosine-similarity index held in memory.
pub struct InMemoryIndex {
    dimensions: usize,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents in `name`, if the index exists.
    pub fn len(&self, name: &str) -> Option<usize> {
        self.collections.read().get(name).map(|c| c.ids.len())
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn ensure_index(&self, name: &str) -> Result<bool> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(name.to_string(), Collection::new(self.dimensions));
        debug!("Created in-memory index {}", name);
        Ok(true)
    }

    async fn upsert(&self, name: &str, documents: &[IndexDocument]) -> Result<usize> {
        let mut collections = self.collections.write();
        let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
        let accepted = documents
            .iter()
            .filter(|doc| doc.embedding.len() == self.dimensions)
            .filter(|doc| collection.upsert(doc))
            .count();
        Ok(accepted)
    }

    async fn vector_search(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<String>> {
        let collections = self.collections.read();
        let collection = collections.get(name).ok_or_else(|| not_found(name))?;
        if collection.ids.is_empty() || vector.len() != self.dimensions {
            return Ok(Vec::new());
        }
        let Some(query) = unit(ArrayView1::from(vector)) else {
            return Ok(Vec::new());
        };

        let similarities = collection.matrix.dot(&query);
        let mut ranked: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);

        Ok(ranked
            .into_iter()
            .map(|(row, _)| collection.contents[row].clone())
            .collect())
    }
}
