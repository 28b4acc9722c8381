//! Embedding provider boundary.
//!
//! The pipeline never talks to an embedding model directly; it goes through
//! [`EmbeddingProvider`], which real backends implement over HTTP (see
//! [`crate::providers`]) and tests implement with the deterministic
//! [`MockEmbeddingProvider`]. Provider failures surface as
//! [`LoreError::EmbeddingUnavailable`] and are never retried here.

use async_trait::async_trait;

use crate::types::LoreError;

/// Maps text to fixed-length vectors.
///
/// Implementations must return batch results in input order and be
/// deterministic for identical input within a session.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LoreError>;

    /// Embeds a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError>;

    /// Dimensionality of the vectors this provider produces.
    fn dimension(&self) -> usize;
}

/// Deterministic provider for tests and offline runs.
///
/// Vectors are derived from a hash of the input text, so identical text
/// always maps to the identical vector and distinct texts almost surely
/// differ. No semantic similarity is implied.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimension: 32 }
    }

    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a seed, then a splitmix-style stream per component.
        let mut seed = 0xcbf2_9ce4_8422_2325u64;
        for byte in text.as_bytes() {
            seed ^= u64::from(*byte);
            seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut vector = Vec::with_capacity(self.dimension);
        let mut state = seed;
        for _ in 0..self.dimension {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^= z >> 31;
            vector.push(((z % 2000) as f32 / 1000.0) - 1.0);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LoreError> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
