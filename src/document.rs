//! Document identity and the metadata-store boundary.
//!
//! Documents are owned by an external metadata store; the pipeline only reads
//! them. [`DocumentStore`] is the lookup seam that `find_related` needs to
//! build its synthetic query, and [`InMemoryDocumentStore`] is the reference
//! implementation used in tests and small libraries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::types::LoreError;

/// An ingested document with its source metadata.
///
/// The raw `text` is what the chunker consumes; `summary` feeds the synthetic
/// query used by related-document lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub url: Url,
    pub title: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    pub text: String,
    pub summary: Option<String>,
    pub word_count: usize,
}

impl Document {
    /// Creates a document with a fresh id and the current ingestion time.
    pub fn new(url: Url, title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            url,
            title: title.into(),
            author: None,
            published_at: None,
            ingested_at: Utc::now(),
            word_count: text.split_whitespace().count(),
            text,
            summary: None,
        }
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Read-only lookup into the externally owned metadata store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document by id. `Ok(None)` means the document does not
    /// exist; `Err` means the store itself failed.
    async fn get(&self, id: Uuid) -> Result<Option<Document>, LoreError>;
}

/// In-memory reference store for tests and small libraries.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Uuid, Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document, returning its id.
    pub fn insert(&self, document: Document) -> Uuid {
        let id = document.id;
        self.documents.write().insert(id, document);
        id
    }

    /// Removes a document. Returns `true` if it was present.
    pub fn remove(&self, id: Uuid) -> bool {
        self.documents.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Document>, LoreError> {
        Ok(self.documents.read().get(&id).cloned())
    }
}
