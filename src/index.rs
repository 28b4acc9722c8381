//! Vector index boundary.
//!
//! The similarity index is an external collaborator; the pipeline only
//! depends on the [`VectorIndex`] trait. Scores are provider-defined but
//! must be monotonic, higher meaning more similar. [`InMemoryIndex`] is the
//! reference implementation: exact cosine similarity with stable tie order,
//! suitable as a test double and for small libraries.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::types::LoreError;

/// Equality predicates over metadata keys; a record matches when every entry
/// is equal to the corresponding metadata field.
pub type MetadataFilter = serde_json::Map<String, Value>;

/// A vector plus its metadata, keyed by id, as stored in the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Value,
}

/// One ranked result of a similarity query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Value,
}

/// Upsert/query/delete access to a similarity-search backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts records, replacing any existing record with the same id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), LoreError>;

    /// Returns up to `top_k` records ranked by descending similarity to
    /// `vector`, optionally restricted by metadata equality `filter`.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>, LoreError>;

    /// Removes records by id, returning how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize, LoreError>;
}

/// Exact cosine-similarity index held in memory.
///
/// Records keep insertion order, and ranking uses a stable sort, so equal
/// scores preserve that order.
#[derive(Clone, Default)]
pub struct InMemoryIndex {
    records: Arc<RwLock<Vec<VectorRecord>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), LoreError> {
        let mut guard = self.records.write();
        for record in records {
            match guard.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => guard.push(record),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>, LoreError> {
        let guard = self.records.read();
        let mut matches: Vec<VectorMatch> = guard
            .iter()
            .filter(|record| filter.is_none_or(|f| matches_filter(&record.metadata, f)))
            .filter_map(|record| {
                cosine_similarity(vector, &record.vector).map(|score| VectorMatch {
                    id: record.id.clone(),
                    score,
                    metadata: record.metadata.clone(),
                })
            })
            .collect();
        // Stable sort: ties keep insertion order.
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, LoreError> {
        let mut guard = self.records.write();
        let before = guard.len();
        guard.retain(|record| !ids.contains(&record.id));
        Ok(before - guard.len())
    }
}

fn matches_filter(metadata: &Value, filter: &MetadataFilter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

/// Cosine similarity in [-1, 1]. `None` when dimensions differ or either
/// vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
