//! Completion adapter for the Anthropic messages API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::synthesis::CompletionProvider;
use crate::types::LoreError;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Anthropic messages-API completion provider. Single-turn, no streaming.
pub struct AnthropicCompletions {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl AnthropicCompletions {
    /// Creates a provider with the default endpoint and a 60s timeout.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LoreError> {
        Self::with_options(api_key, model, None, DEFAULT_TIMEOUT)
    }

    /// Creates a provider with an explicit endpoint base and request
    /// timeout.
    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                LoreError::CompletionUnavailable(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicCompletions {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, LoreError> {
        let url = format!("{}/v1/messages", self.endpoint);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.trim())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|err| LoreError::CompletionUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoreError::CompletionUnavailable(format!(
                "messages API returned {status}: {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| LoreError::CompletionUnavailable(err.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(LoreError::CompletionUnavailable(
                "response contained no text content".into(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn provider_for(server: &MockServer) -> AnthropicCompletions {
        AnthropicCompletions::with_options(
            "test-key",
            "claude-sonnet",
            Some(server.base_url()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn complete_extracts_text_blocks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "test-key")
                    .header("anthropic-version", API_VERSION)
                    .json_body_partial(r#"{"model": "claude-sonnet", "max_tokens": 256}"#);
                then.status(200).json_body(json!({
                    "content": [
                        {"type": "text", "text": "First part."},
                        {"type": "tool_use", "id": "x", "name": "t", "input": {}},
                        {"type": "text", "text": "Second part."}
                    ]
                }));
            })
            .await;

        let provider = provider_for(&server);
        let text = provider.complete("say something", 256).await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "First part.\nSecond part.");
    }

    #[tokio::test]
    async fn non_success_status_maps_to_completion_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(500).body("overloaded");
            })
            .await;

        let provider = provider_for(&server);
        let err = provider.complete("prompt", 64).await.unwrap_err();
        assert!(matches!(err, LoreError::CompletionUnavailable(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn empty_content_is_a_provider_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({"content": []}));
            })
            .await;

        let provider = provider_for(&server);
        let err = provider.complete("prompt", 64).await.unwrap_err();
        assert!(matches!(err, LoreError::CompletionUnavailable(_)));
    }
}
