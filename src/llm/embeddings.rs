//! Azure OpenAI embeddings client.

use super::EmbeddingModel;
use super::client::error_from_body;
use crate::config::AzureConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Replace newlines with spaces before embedding.
pub fn normalize_for_embedding(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ")
}

/// Embedding client bound to one Azure OpenAI deployment.
#[derive(Clone)]
pub struct AzureEmbeddingClient {
    client: Client,
    config: AzureConfig,
}

impl AzureEmbeddingClient {
    pub fn new(config: AzureConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.embedding_endpoint().trim_end_matches('/');
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            base, self.config.embedding_deployment, self.config.api_version
        )
    }
}

#[async_trait]
impl EmbeddingModel for AzureEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(
            deployment = %self.config.embedding_deployment,
            text_len = text.len(),
            "embedding request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("api-key", self.config.api_key.trim())
            .json(&EmbeddingRequest { input: [text] })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EvalError::LlmParse("No embedding in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_embedding() {
        assert_eq!(
            normalize_for_embedding("line one\nline two\r\nline three"),
            "line one line two line three"
        );
    }

    #[test]
    fn test_endpoint_falls_back_to_chat_endpoint() {
        let config = AzureConfig {
            chat_endpoint: "https://res.openai.azure.com".to_string(),
            embedding_deployment: "text-embedding-3-large".to_string(),
            api_version: "2024-06-01".to_string(),
            ..Default::default()
        };
        let client = AzureEmbeddingClient::new(config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://res.openai.azure.com/openai/deployments/text-embedding-3-large/embeddings?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"data": [{"embedding": [0.1, -0.2, 0.3], "index": 0}], "model": "x"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, -0.2, 0.3]);
    }
}
