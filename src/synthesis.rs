//! Grounded answer generation and multi-document synthesis.
//!
//! [`SynthesisEngine`] composes the retrieval engine with a completion
//! provider. Both operations are single-pass and stateless: retrieve,
//! assemble a bounded context, make exactly one provider call, format. They
//! are terminal, user-facing operations, so provider failures come back as
//! degraded text rather than errors; only configuration problems raise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunker::TokenCounter;
use crate::config::LibraryConfig;
use crate::retrieval::{EvidenceItem, RetrievalEngine};
use crate::types::LoreError;

/// Fixed terminal answer when retrieval yields nothing. A designed outcome,
/// not a failure.
const NO_EVIDENCE_ANSWER: &str = "I couldn't find any relevant information in your library to \
     answer this question. Try adding more documents on this topic.";

/// Maps a prompt to generated text. Single-turn, no streaming, no retry.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, LoreError>;
}

/// A grounded answer with its cited evidence.
///
/// `sources` is deduplicated by document and ordered to match the citation
/// numbering used in the answer context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<EvidenceItem>,
    pub query: String,
    pub generated_at: DateTime<Utc>,
}

impl Answer {
    fn degraded(text: String, query: &str) -> Self {
        Self {
            text,
            sources: Vec::new(),
            query: query.to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Composes retrieval and completion into cited answers and topic syntheses.
pub struct SynthesisEngine {
    retrieval: Arc<RetrievalEngine>,
    completions: Arc<dyn CompletionProvider>,
    counter: Arc<dyn TokenCounter>,
    config: LibraryConfig,
}

impl SynthesisEngine {
    pub fn new(
        retrieval: Arc<RetrievalEngine>,
        completions: Arc<dyn CompletionProvider>,
        counter: Arc<dyn TokenCounter>,
        config: LibraryConfig,
    ) -> Result<Self, LoreError> {
        config.validate()?;
        Ok(Self {
            retrieval,
            completions,
            counter,
            config,
        })
    }

    /// Answers a question from retrieved evidence, citing source documents.
    ///
    /// No evidence yields the fixed insufficient-information answer with
    /// empty sources. A completion failure yields an answer whose text
    /// communicates the failure, also with empty sources.
    pub async fn answer(&self, question: &str) -> Answer {
        let evidence = self.retrieval.search(question, None, None).await;
        if evidence.is_empty() {
            debug!(question, "no evidence retrieved; returning terminal answer");
            return Answer::degraded(NO_EVIDENCE_ANSWER.to_string(), question);
        }

        let (context, sources) = self.assemble_context(&evidence);
        let prompt = answer_prompt(question, &context);

        match self
            .completions
            .complete(&prompt, self.config.answer_max_tokens)
            .await
        {
            Ok(text) => Answer {
                text: text.trim().to_string(),
                sources,
                query: question.to_string(),
                generated_at: Utc::now(),
            },
            Err(err) => {
                warn!(question, error = %err, "answer degraded: completion failed");
                Answer::degraded(
                    format!("I wasn't able to generate an answer: {err}"),
                    question,
                )
            }
        }
    }

    /// Synthesizes a cross-document summary for a topic.
    ///
    /// Evidence is grouped per document in first-seen order, one labeled
    /// block per document. Failures return a descriptive string; this
    /// operation is presentation-facing and intentionally does not raise.
    pub async fn synthesize(&self, topic: &str, max_documents: Option<usize>) -> String {
        let limit = max_documents.unwrap_or(self.config.synthesis_max_documents);
        let evidence = self.retrieval.search(topic, Some(limit), None).await;
        if evidence.is_empty() {
            return "No documents found on this topic.".to_string();
        }

        // Group evidence by document, preserving first-seen (ranked) order.
        let mut groups: Vec<(String, String, Vec<String>)> = Vec::new();
        for item in evidence {
            match groups.iter_mut().find(|(id, _, _)| *id == item.document_id) {
                Some((_, _, texts)) => texts.push(item.text),
                None => groups.push((item.document_id, item.document_title, vec![item.text])),
            }
        }

        let context = groups
            .iter()
            .map(|(_, title, texts)| format!("From: {title}\n{}\n", texts.join(" ")))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = synthesis_prompt(topic, &context);

        match self
            .completions
            .complete(&prompt, self.config.synthesis_max_tokens)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!(topic, error = %err, "synthesis degraded: completion failed");
                format!("Error generating synthesis: {err}")
            }
        }
    }

    /// Builds the numbered context block and the matching deduplicated
    /// source list.
    ///
    /// Items are taken in ranked order; source numbers are assigned per
    /// document at first appearance. When the token budget runs out the
    /// remaining (lowest-ranked) items are dropped whole. The top-ranked
    /// item is always included, even if it alone exceeds the budget, since
    /// an answer without context is useless.
    fn assemble_context(&self, evidence: &[EvidenceItem]) -> (String, Vec<EvidenceItem>) {
        let mut numbers: HashMap<&str, usize> = HashMap::new();
        let mut blocks: Vec<String> = Vec::new();
        let mut sources: Vec<EvidenceItem> = Vec::new();
        let mut used_tokens = 0usize;

        for item in evidence {
            let first_appearance = !numbers.contains_key(item.document_id.as_str());
            let number = if first_appearance {
                numbers.len() + 1
            } else {
                numbers[item.document_id.as_str()]
            };
            let block = format!("[Source {number}: {}]\n{}\n", item.document_title, item.text);
            let block_tokens = self.counter.count(&block);
            if used_tokens + block_tokens > self.config.context_token_budget && !blocks.is_empty() {
                break;
            }
            used_tokens += block_tokens;
            if first_appearance {
                numbers.insert(item.document_id.as_str(), number);
                sources.push(item.clone());
            }
            blocks.push(block);
        }

        (blocks.join("\n"), sources)
    }
}

fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a research assistant answering from a user's saved documents.\n\
         Answer the question using only the information in the context below.\n\
         If the context does not contain enough information for a full answer, say so.\n\
         Cite sources by their titles, using the numbering from the context.\n\
         If sources disagree, present both perspectives.\n\
         Be concise but thorough.\n\n\
         Context from saved documents:\n{context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

fn synthesis_prompt(topic: &str, context: &str) -> String {
    format!(
        "Based on the following documents from the user's library, provide a \
         comprehensive synthesis about: {topic}\n\
         - Identify common themes and key points across documents\n\
         - Note any disagreements or differing perspectives\n\
         - Organize the information coherently\n\
         - Attribute each point to the documents that support it\n\n\
         Documents:\n{context}\n\n\
         Synthesis:"
    )
}

/// Prompt-recording test double for the completion boundary.
#[derive(Clone)]
pub struct MockCompletionProvider {
    reply: String,
    fail: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockCompletionProvider {
    /// Provider that always succeeds with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail: false,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider that always fails with `CompletionUnavailable`.
    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            fail: true,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, prompt: &str, _max_tokens: usize) -> Result<String, LoreError> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail {
            return Err(LoreError::CompletionUnavailable("scripted failure".into()));
        }
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InMemoryDocumentStore;
    use crate::embeddings::EmbeddingProvider;
    use crate::index::{InMemoryIndex, VectorIndex, VectorRecord};
    use serde_json::json;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LoreError> {
            Ok(self.0.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
            Ok(vec![self.0.clone(); texts.len()])
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    struct WordTokens;

    impl TokenCounter for WordTokens {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn record(id: &str, vector: Vec<f32>, doc_id: &str, title: &str, text: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            metadata: json!({
                "document_id": doc_id,
                "document_title": title,
                "document_url": format!("https://example.com/{doc_id}"),
                "text": text,
            }),
        }
    }

    async fn engine_with(
        records: Vec<VectorRecord>,
        completions: MockCompletionProvider,
        config: LibraryConfig,
    ) -> SynthesisEngine {
        let index = Arc::new(InMemoryIndex::new());
        index.upsert(records).await.unwrap();
        let retrieval = Arc::new(
            RetrievalEngine::new(
                Arc::new(FixedEmbedder(vec![1.0, 0.0])),
                index,
                Arc::new(InMemoryDocumentStore::new()),
                config.clone(),
            )
            .unwrap(),
        );
        SynthesisEngine::new(retrieval, Arc::new(completions), Arc::new(WordTokens), config)
            .unwrap()
    }

    fn two_document_records() -> Vec<VectorRecord> {
        vec![
            record("s1", vec![1.0, 0.0], "doc-a", "Alpha", "Carbon pricing works."),
            record("s2", vec![0.9, 0.1], "doc-b", "Beta", "Carbon pricing is contested."),
            record("s3", vec![0.8, 0.2], "doc-a", "Alpha", "Emissions fell after the tax."),
        ]
    }

    #[tokio::test]
    async fn answer_with_no_evidence_is_a_terminal_state() {
        let completions = MockCompletionProvider::new("unused");
        let engine = engine_with(vec![], completions.clone(), LibraryConfig::default()).await;

        let answer = engine.answer("what is carbon pricing?").await;
        assert!(answer.sources.is_empty());
        assert!(!answer.text.is_empty());
        assert_eq!(answer.query, "what is carbon pricing?");
        assert_eq!(completions.call_count(), 0, "no provider call without evidence");
    }

    #[tokio::test]
    async fn answer_cites_sources_in_first_appearance_order() {
        let completions = MockCompletionProvider::new("Grounded answer.");
        let engine = engine_with(
            two_document_records(),
            completions.clone(),
            LibraryConfig::default(),
        )
        .await;

        let answer = engine.answer("does carbon pricing work?").await;
        assert_eq!(answer.text, "Grounded answer.");
        // Three evidence items collapse into two cited documents.
        let titles: Vec<&str> = answer
            .sources
            .iter()
            .map(|s| s.document_title.as_str())
            .collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);

        let prompts = completions.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[Source 1: Alpha]"));
        assert!(prompts[0].contains("[Source 2: Beta]"));
        // The third item reuses the first document's number.
        assert!(prompts[0].contains("Emissions fell after the tax."));
        assert!(!prompts[0].contains("[Source 3:"));
    }

    #[tokio::test]
    async fn answer_degrades_on_completion_failure() {
        let completions = MockCompletionProvider::failing();
        let engine =
            engine_with(two_document_records(), completions, LibraryConfig::default()).await;

        let answer = engine.answer("does carbon pricing work?").await;
        assert!(answer.sources.is_empty());
        assert!(answer.text.contains("completion provider unavailable"));
    }

    #[tokio::test]
    async fn context_budget_drops_lowest_ranked_items_whole() {
        let completions = MockCompletionProvider::new("short");
        // Each block is ~8 words; a 10-token budget fits only the first.
        let config = LibraryConfig {
            context_token_budget: 10,
            ..Default::default()
        };
        let engine = engine_with(two_document_records(), completions.clone(), config).await;

        let answer = engine.answer("q").await;
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].document_title, "Alpha");

        let prompts = completions.prompts();
        assert!(prompts[0].contains("Carbon pricing works."));
        assert!(!prompts[0].contains("contested"));
    }

    #[tokio::test]
    async fn synthesize_builds_one_labeled_block_per_document() {
        let completions = MockCompletionProvider::new("Synthesis text.");
        let engine = engine_with(
            two_document_records(),
            completions.clone(),
            LibraryConfig::default(),
        )
        .await;

        let synthesis = engine.synthesize("climate policy", Some(2)).await;
        assert_eq!(synthesis, "Synthesis text.");
        assert_eq!(completions.call_count(), 1);

        // top_k = 2 documents' worth of evidence, grouped into two blocks.
        let prompt = completions.prompts().remove(0);
        assert!(prompt.contains("From: Alpha"));
        assert!(prompt.contains("From: Beta"));
        assert!(prompt.contains("climate policy"));
    }

    #[tokio::test]
    async fn synthesize_with_no_evidence_returns_fixed_message() {
        let completions = MockCompletionProvider::new("unused");
        let engine = engine_with(vec![], completions.clone(), LibraryConfig::default()).await;
        let synthesis = engine.synthesize("anything", None).await;
        assert_eq!(synthesis, "No documents found on this topic.");
        assert_eq!(completions.call_count(), 0);
    }

    #[tokio::test]
    async fn synthesize_degrades_to_error_string() {
        let completions = MockCompletionProvider::failing();
        let engine =
            engine_with(two_document_records(), completions, LibraryConfig::default()).await;
        let synthesis = engine.synthesize("climate policy", None).await;
        assert!(synthesis.starts_with("Error generating synthesis:"));
    }
}
