//! Document chunking and retrieval-augmented synthesis.
//!
//! `lorebook` is the core pipeline of a personal research library: it splits
//! arbitrary-length documents into overlapping, sentence-bounded segments,
//! turns queries into ranked evidence, and feeds that evidence into grounded,
//! cited answers or multi-document syntheses.
//!
//! ```text
//! Document text ──► chunker::Chunker ──► Segments
//!                                          │
//!                    embeddings::EmbeddingProvider (batch)
//!                                          │
//!                         ingest::Ingestor ──► index::VectorIndex.upsert
//!
//! Query ──► retrieval::RetrievalEngine ──► ranked EvidenceItems
//!              │        (embed ► query ► dedup per document)
//!              ▼
//!         synthesis::SynthesisEngine ──► Answer with citations
//!              │        (bounded context ► one completion call)
//!              └──────────────────────► topic synthesis text
//! ```
//!
//! The embedding model, the similarity index, the completion model, and the
//! document metadata store are external collaborators behind traits
//! ([`EmbeddingProvider`], [`VectorIndex`], [`CompletionProvider`],
//! [`DocumentStore`]); deterministic in-memory implementations of each are
//! exported for tests and small libraries, and `reqwest`-based adapters for
//! hosted providers live in [`providers`].
//!
//! Query-side operations degrade on provider failure (empty evidence,
//! failure-text answers) instead of raising; only invalid configuration is a
//! hard error. See [`types::LoreError`].

pub mod chunker;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod providers;
pub mod retrieval;
pub mod synthesis;
pub mod types;

pub use chunker::{CharEstimate, Chunker, Segment, TokenCounter};
pub use config::LibraryConfig;
pub use document::{Document, DocumentStore, InMemoryDocumentStore};
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider};
pub use index::{InMemoryIndex, MetadataFilter, VectorIndex, VectorMatch, VectorRecord};
pub use ingest::{IngestReport, Ingestor};
pub use retrieval::{EvidenceItem, RetrievalEngine};
pub use synthesis::{Answer, CompletionProvider, MockCompletionProvider, SynthesisEngine};
pub use types::LoreError;
