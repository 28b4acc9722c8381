//! Chunk-and-embed ingestion.
//!
//! Turns a document into vector records: chunk the text, embed every segment
//! in one batch, and upsert the vectors with enough source metadata for
//! retrieval to reconstruct evidence without a second lookup. Independent
//! documents may be ingested in parallel; segment order within one document
//! is preserved by construction.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunker::{Chunker, Segment};
use crate::document::Document;
use crate::embeddings::EmbeddingProvider;
use crate::index::{VectorIndex, VectorRecord};
use crate::types::LoreError;

/// Outcome of ingesting one document.
///
/// `segment_ids` is ordered by segment index; the metadata-store owner is
/// expected to persist the mapping so deletes can cascade through
/// [`Ingestor::remove_segments`].
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub document_id: Uuid,
    pub segment_ids: Vec<String>,
    pub oversize_segments: usize,
}

/// Composes the chunker, embedding provider, and vector index into the
/// ingestion path of the pipeline.
pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Ingestor {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// Chunks, embeds, and indexes one document.
    ///
    /// Unlike the query-side operations, ingestion surfaces provider and
    /// index failures to the caller: a partially indexed document is worse
    /// than a retried one.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport, LoreError> {
        let segments = self.chunker.chunk(document.id, &document.text);
        if segments.is_empty() {
            debug!(document_id = %document.id, "document produced no segments");
            return Ok(IngestReport {
                document_id: document.id,
                segment_ids: Vec::new(),
                oversize_segments: 0,
            });
        }

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != segments.len() {
            return Err(LoreError::EmbeddingUnavailable(format!(
                "provider returned {} vectors for {} segments",
                vectors.len(),
                segments.len()
            )));
        }

        let oversize_segments = segments.iter().filter(|s| s.oversize).count();
        let mut segment_ids = Vec::with_capacity(segments.len());
        let mut records = Vec::with_capacity(segments.len());
        for (segment, vector) in segments.iter().zip(vectors) {
            let id = segment_id(document.id, segment.index);
            segment_ids.push(id.clone());
            records.push(VectorRecord {
                id,
                vector,
                metadata: segment_metadata(document, segment),
            });
        }

        self.index.upsert(records).await?;
        info!(
            document_id = %document.id,
            segments = segment_ids.len(),
            oversize = oversize_segments,
            "document ingested"
        );

        Ok(IngestReport {
            document_id: document.id,
            segment_ids,
            oversize_segments,
        })
    }

    /// Cascade hook for document deletion: removes the given segment vectors
    /// from the index, returning how many were present.
    pub async fn remove_segments(&self, segment_ids: &[String]) -> Result<usize, LoreError> {
        self.index.delete(segment_ids).await
    }
}

/// Deterministic vector id for a segment: `"{document_id}:{index}"`.
fn segment_id(document_id: Uuid, index: usize) -> String {
    format!("{document_id}:{index}")
}

fn segment_metadata(document: &Document, segment: &Segment) -> serde_json::Value {
    json!({
        "document_id": document.id.to_string(),
        "document_title": document.title,
        "document_url": document.url.to_string(),
        "document_author": document.author.clone().unwrap_or_default(),
        "published_at": document
            .published_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default(),
        "segment_index": segment.index,
        "token_count": segment.token_count,
        "text": segment.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::TokenCounter;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::index::InMemoryIndex;
    use url::Url;

    struct WordTokens;

    impl TokenCounter for WordTokens {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn ingestor(index: Arc<InMemoryIndex>) -> Ingestor {
        let chunker = Chunker::new(8, 2, Arc::new(WordTokens)).unwrap();
        Ingestor::new(chunker, Arc::new(MockEmbeddingProvider::new()), index)
    }

    fn document(text: &str) -> Document {
        Document::new(
            Url::parse("https://example.com/a").unwrap(),
            "Sample",
            text,
        )
    }

    #[tokio::test]
    async fn ingest_indexes_one_record_per_segment() {
        let index = Arc::new(InMemoryIndex::new());
        let ingestor = ingestor(index.clone());
        let doc = document(
            "First sentence has five words. Second sentence has five words. \
             Third sentence has five words.",
        );

        let report = ingestor.ingest(&doc).await.unwrap();
        assert!(report.segment_ids.len() > 1);
        assert_eq!(index.len(), report.segment_ids.len());
        assert_eq!(report.oversize_segments, 0);
        assert_eq!(report.segment_ids[0], format!("{}:0", doc.id));
    }

    #[tokio::test]
    async fn empty_document_is_a_no_op() {
        let index = Arc::new(InMemoryIndex::new());
        let ingestor = ingestor(index.clone());
        let report = ingestor.ingest(&document("")).await.unwrap();
        assert!(report.segment_ids.is_empty());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn remove_segments_cascades_deletes() {
        let index = Arc::new(InMemoryIndex::new());
        let ingestor = ingestor(index.clone());
        let doc = document(
            "First sentence has five words. Second sentence has five words. \
             Third sentence has five words.",
        );
        let report = ingestor.ingest(&doc).await.unwrap();
        let removed = ingestor.remove_segments(&report.segment_ids).await.unwrap();
        assert_eq!(removed, report.segment_ids.len());
        assert!(index.is_empty());
    }
}
