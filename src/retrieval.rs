//! Ranked evidence retrieval with per-document deduplication.
//!
//! [`RetrievalEngine`] composes the embedding provider, the vector index, and
//! the metadata store. Query-side failures never propagate: an unreachable
//! provider and an empty library are observably identical to the caller, both
//! yielding an empty evidence list (the specific error kind is logged).

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LibraryConfig;
use crate::document::DocumentStore;
use crate::embeddings::EmbeddingProvider;
use crate::index::{MetadataFilter, VectorIndex, VectorMatch};
use crate::types::LoreError;

/// A ranked segment returned by a similarity query, annotated with its
/// source document. Missing provider metadata defaults to empty strings
/// rather than failing the whole query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub document_id: String,
    pub document_title: String,
    pub document_url: String,
    pub text: String,
    pub score: f32,
    pub metadata: Value,
}

impl EvidenceItem {
    fn from_match(m: VectorMatch) -> Self {
        let field = |key: &str| {
            m.metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            document_id: field("document_id"),
            document_title: field("document_title"),
            document_url: field("document_url"),
            text: field("text"),
            score: m.score,
            metadata: m.metadata,
        }
    }
}

/// Turns a query into ranked, deduplicated evidence.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    documents: Arc<dyn DocumentStore>,
    config: LibraryConfig,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        documents: Arc<dyn DocumentStore>,
        config: LibraryConfig,
    ) -> Result<Self, LoreError> {
        config.validate()?;
        Ok(Self {
            embedder,
            index,
            documents,
            config,
        })
    }

    /// Retrieves up to `top_k` evidence items for `query`, ordered by
    /// descending score. `top_k` defaults to the configured value.
    ///
    /// Provider or index failures degrade to an empty result; "no results"
    /// is a valid outcome of a sparsely populated library and the caller
    /// cannot usefully distinguish the two.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        filter: Option<&MetadataFilter>,
    ) -> Vec<EvidenceItem> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        match self.try_search(query, top_k, filter).await {
            Ok(items) => {
                debug!(query, results = items.len(), "similarity search complete");
                items
            }
            Err(err) => {
                warn!(query, error = %err, "search degraded to empty result");
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<EvidenceItem>, LoreError> {
        let vector = self.embedder.embed(query).await?;
        let matches = self.index.query(&vector, top_k, filter).await?;

        let mut items: Vec<EvidenceItem> =
            matches.into_iter().map(EvidenceItem::from_match).collect();
        // Backends promise descending order; enforce it anyway with a stable
        // sort so ties keep provider order.
        items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(top_k);
        Ok(items)
    }

    /// Finds documents related to `document_id` via a synthetic query built
    /// from its title and summary.
    ///
    /// Overfetches `2 × top_k` candidates to absorb filtering, discards the
    /// source document itself, and keeps the highest-scoring item per
    /// document. On sparse indices this can return fewer than `top_k` items;
    /// that is a valid result, not an error.
    pub async fn find_related(&self, document_id: Uuid, top_k: usize) -> Vec<EvidenceItem> {
        let document = match self.documents.get(document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!(%document_id, "find_related: unknown document");
                return Vec::new();
            }
            Err(err) => {
                warn!(%document_id, error = %err, "find_related degraded to empty result");
                return Vec::new();
            }
        };

        let query = match &document.summary {
            Some(summary) => format!("{} {}", document.title, summary),
            None => document.title.clone(),
        };
        let candidates = self.search(&query, Some(top_k * 2), None).await;

        let own_id = document_id.to_string();
        let mut seen: HashSet<String> = HashSet::new();
        let mut related = Vec::with_capacity(top_k);
        // Candidates are already ranked, so the first item seen for a
        // document is its best one.
        for item in candidates {
            if item.document_id == own_id {
                continue;
            }
            if seen.insert(item.document_id.clone()) {
                related.push(item);
                if related.len() >= top_k {
                    break;
                }
            }
        }
        related
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }
}
