//! Sentence-preserving token windowing with suffix overlap.
//!
//! A document is split into sentences on punctuation boundaries, then
//! consecutive sentences are accumulated greedily while the running token
//! count stays within the configured limit. When a segment closes, the next
//! one is seeded with whole trailing sentences worth up to `overlap_tokens`
//! so adjacent segments share context across the boundary. Sentences that
//! alone exceed the limit are re-windowed at word granularity by the same
//! routine; a single word that still exceeds the limit becomes a forced
//! oversize segment of exactly that word.
//!
//! Chunking is pure CPU work: distinct documents may be chunked on any number
//! of workers, but segments within one document are produced sequentially
//! because each overlap seed depends on the previous segment's tail.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LibraryConfig;
use crate::types::LoreError;

/// Pluggable token counting.
///
/// A chunker uses exactly one counter for an entire document so that segment
/// boundaries are reproducible; counters are never mixed mid-call.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Deterministic fallback estimate: one token per four characters.
///
/// Stands in when no model-accurate tokenizer is wired up. The estimate is
/// intentionally floor-biased, matching the common `len / 4` heuristic.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharEstimate;

impl TokenCounter for CharEstimate {
    fn count(&self, text: &str) -> usize {
        text.chars().count() / 4
    }
}

/// A bounded slice of one document's text, sized for embedding.
///
/// Indices are contiguous and 0-based within the owning document; `embedding`
/// stays `None` until the embedding pass runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub document_id: Uuid,
    pub index: usize,
    pub text: String,
    pub token_count: usize,
    /// Set when a single atomic unit exceeded the chunk size and was emitted
    /// as-is rather than split further.
    pub oversize: bool,
    pub embedding: Option<Vec<f32>>,
}

/// A sentence ends at `.`, `!`, or `?` followed by whitespace. Best effort,
/// not grammatically exact.
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("sentence boundary pattern"));

/// Splits a document into overlapping, semantically bounded segments.
pub struct Chunker {
    max_tokens: usize,
    overlap_tokens: usize,
    counter: Arc<dyn TokenCounter>,
}

/// One unit of the windowing pass: a sentence in the outer pass, a word in
/// the oversize re-split.
struct Unit<'a> {
    text: &'a str,
    tokens: usize,
}

struct Piece {
    text: String,
    token_count: usize,
    oversize: bool,
}

impl Chunker {
    /// Creates a chunker, validating the window parameters up front so a
    /// chunking run never emits a partially windowed sequence.
    pub fn new(
        max_tokens: usize,
        overlap_tokens: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self, LoreError> {
        if max_tokens == 0 {
            return Err(LoreError::InvalidConfiguration(
                "max_tokens must be greater than zero".into(),
            ));
        }
        if overlap_tokens >= max_tokens {
            return Err(LoreError::InvalidConfiguration(format!(
                "overlap_tokens ({overlap_tokens}) must be less than max_tokens ({max_tokens})"
            )));
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
            counter,
        })
    }

    /// Creates a chunker from library configuration.
    pub fn from_config(
        config: &LibraryConfig,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self, LoreError> {
        config.validate()?;
        Self::new(config.chunk_size, config.chunk_overlap, counter)
    }

    /// Splits `text` into ordered segments for `document_id`.
    ///
    /// Empty input yields an empty sequence; text within the token limit
    /// yields exactly one segment. Identical input and parameters always
    /// yield identical segments.
    pub fn chunk(&self, document_id: Uuid, text: &str) -> Vec<Segment> {
        let sentences: Vec<Unit<'_>> = split_sentences(text)
            .into_iter()
            .map(|sentence| Unit {
                text: sentence,
                tokens: self.counter.count(sentence),
            })
            .collect();

        let mut pieces = Vec::new();
        self.window(&sentences, true, &mut pieces);

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| Segment {
                document_id,
                index,
                text: piece.text,
                token_count: piece.token_count,
                oversize: piece.oversize,
                embedding: None,
            })
            .collect()
    }

    /// Greedy window-with-overlap over an ordered unit sequence. The same
    /// routine serves the sentence pass (`split_oversize = true`, recursing
    /// into words for units over the limit) and the word pass
    /// (`split_oversize = false`, emitting forced oversize pieces).
    fn window<'a>(&self, units: &[Unit<'a>], split_oversize: bool, out: &mut Vec<Piece>) {
        let mut current: Vec<&Unit<'a>> = Vec::new();
        let mut current_tokens = 0usize;

        for unit in units {
            if unit.tokens > self.max_tokens {
                if !current.is_empty() {
                    out.push(join_piece(&current, current_tokens));
                    current.clear();
                    current_tokens = 0;
                }
                if split_oversize {
                    let words: Vec<Unit<'_>> = unit
                        .text
                        .split_whitespace()
                        .map(|word| Unit {
                            text: word,
                            tokens: self.counter.count(word),
                        })
                        .collect();
                    self.window(&words, false, out);
                } else {
                    out.push(Piece {
                        text: unit.text.to_string(),
                        token_count: unit.tokens,
                        oversize: true,
                    });
                }
                continue;
            }

            if current_tokens + unit.tokens > self.max_tokens && !current.is_empty() {
                out.push(join_piece(&current, current_tokens));
                let start = self.overlap_start(&current);
                current.drain(..start);
                current_tokens = current.iter().map(|u| u.tokens).sum();
                // The overlap budget is a ceiling, not a guarantee: the seed
                // must still leave room for the unit that closed the window,
                // so shed leading seed units until it fits.
                while !current.is_empty() && current_tokens + unit.tokens > self.max_tokens {
                    current_tokens -= current[0].tokens;
                    current.remove(0);
                }
            }

            current.push(unit);
            current_tokens += unit.tokens;
        }

        if !current.is_empty() {
            out.push(join_piece(&current, current_tokens));
        }
    }

    /// Index of the first unit of the just-closed window that still fits in
    /// the overlap budget, walking backward and keeping whole units only.
    fn overlap_start(&self, units: &[&Unit<'_>]) -> usize {
        if self.overlap_tokens == 0 {
            return units.len();
        }
        let mut total = 0usize;
        let mut start = units.len();
        for (idx, unit) in units.iter().enumerate().rev() {
            if total + unit.tokens > self.overlap_tokens {
                break;
            }
            total += unit.tokens;
            start = idx;
        }
        start
    }
}

fn join_piece(units: &[&Unit<'_>], token_count: usize) -> Piece {
    Piece {
        text: units
            .iter()
            .map(|unit| unit.text)
            .collect::<Vec<_>>()
            .join(" "),
        token_count,
        oversize: false,
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        let punct_len = boundary.as_str().trim_end().len();
        let end = boundary.start() + punct_len;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
