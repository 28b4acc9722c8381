//! Pipeline configuration with environment overrides.
//!
//! Defaults mirror a mid-sized personal document library: 600-token segments
//! with 100 tokens of overlap, five evidence items per query. Every value can
//! be overridden through `LOREBOOK_*` environment variables (a `.env` file is
//! honored via [`dotenvy`]).

use serde::{Deserialize, Serialize};

use crate::types::LoreError;

/// Tunable parameters recognized by the chunking and synthesis pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Maximum tokens per segment.
    pub chunk_size: usize,
    /// Tokens of trailing context shared between consecutive segments.
    /// Must be strictly less than `chunk_size`.
    pub chunk_overlap: usize,
    /// Default number of evidence items returned per query.
    pub top_k: usize,
    /// Default document cap for topic synthesis.
    pub synthesis_max_documents: usize,
    /// Token budget for the assembled answer context. Evidence that does not
    /// fit is dropped lowest-ranked first, never split.
    pub context_token_budget: usize,
    /// Completion budget for answer generation.
    pub answer_max_tokens: usize,
    /// Completion budget for topic synthesis.
    pub synthesis_max_tokens: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
            top_k: 5,
            synthesis_max_documents: 10,
            context_token_budget: 3000,
            answer_max_tokens: 1000,
            synthesis_max_tokens: 1500,
        }
    }
}

impl LibraryConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for unset variables. Reads a `.env` file when one is present.
    pub fn from_env() -> Result<Self, LoreError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        let config = Self {
            chunk_size: env_usize("LOREBOOK_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_usize("LOREBOOK_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: env_usize("LOREBOOK_TOP_K", defaults.top_k)?,
            synthesis_max_documents: env_usize(
                "LOREBOOK_SYNTHESIS_MAX_DOCS",
                defaults.synthesis_max_documents,
            )?,
            context_token_budget: env_usize(
                "LOREBOOK_CONTEXT_BUDGET",
                defaults.context_token_budget,
            )?,
            answer_max_tokens: env_usize("LOREBOOK_ANSWER_MAX_TOKENS", defaults.answer_max_tokens)?,
            synthesis_max_tokens: env_usize(
                "LOREBOOK_SYNTHESIS_MAX_TOKENS",
                defaults.synthesis_max_tokens,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the chunking and retrieval invariants.
    pub fn validate(&self) -> Result<(), LoreError> {
        if self.chunk_size == 0 {
            return Err(LoreError::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(LoreError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(LoreError::InvalidConfiguration(
                "top_k must be greater than zero".into(),
            ));
        }
        if self.synthesis_max_documents == 0 {
            return Err(LoreError::InvalidConfiguration(
                "synthesis_max_documents must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, LoreError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<usize>().map_err(|err| {
            LoreError::InvalidConfiguration(format!("{key} is not a valid number: {err}"))
        }),
        Err(_) => Ok(default),
    }
}
