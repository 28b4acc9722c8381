//! Embedding adapter for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingProvider;
use crate::types::LoreError;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_DIMENSION: usize = 1536;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedding provider.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddings {
    /// Creates a provider for the given key and model with default endpoint,
    /// dimensionality (1536), and timeout (30s).
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LoreError> {
        Self::with_options(api_key, model, None, None, DEFAULT_TIMEOUT)
    }

    /// Creates a provider with explicit endpoint, dimensionality, and
    /// request timeout. `endpoint` should be the API base, e.g.
    /// `https://api.openai.com/v1`.
    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: Option<String>,
        dimension: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, LoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                LoreError::EmbeddingUnavailable(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key: api_key.into(),
            model: model.into(),
            dimension: dimension.unwrap_or(DEFAULT_DIMENSION),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LoreError> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch.into_iter().next().ok_or_else(|| {
            LoreError::EmbeddingUnavailable("provider returned an empty response".into())
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
        let url = format!("{}/embeddings", self.endpoint);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| LoreError::EmbeddingUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoreError::EmbeddingUnavailable(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| LoreError::EmbeddingUnavailable(err.to_string()))?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
