//! Azure OpenAI chat-completions client.

use super::{ChatModel, LlmResponse, Message, TokenUsage};
use crate::config::AzureConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    // Null when the content filter stops generation.
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub(crate) error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub(crate) message: String,
}

/// Turn a non-success response body into the matching error class.
pub(crate) fn error_from_body(status: reqwest::StatusCode, body: &str) -> EvalError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    EvalError::from_status(status.as_u16(), message)
}

/// Chat client bound to one Azure OpenAI deployment.
#[derive(Clone)]
pub struct AzureChatClient {
    client: Client,
    config: AzureConfig,
}

impl AzureChatClient {
    /// Create a new chat client with the given configuration.
    pub fn new(config: AzureConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Deployment name requests are sent to.
    pub fn deployment(&self) -> &str {
        &self.config.chat_deployment
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.chat_endpoint.trim_end_matches('/');
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            base, self.config.chat_deployment, self.config.api_version
        )
    }
}

#[async_trait]
impl ChatModel for AzureChatClient {
    fn name(&self) -> &str {
        &self.config.chat_deployment
    }

    async fn chat(&self, messages: &[Message]) -> Result<LlmResponse> {
        let request = ChatCompletionRequest {
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        };

        debug!(deployment = %self.config.chat_deployment, messages = messages.len(), "chat request");

        let response = self
            .client
            .post(self.endpoint())
            .header("api-key", self.config.api_key.trim())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::LlmParse("No choices in response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: completion.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        let config = AzureConfig {
            chat_endpoint: "https://res.openai.azure.com/".to_string(),
            chat_deployment: "gpt-4o".to_string(),
            api_version: "2024-06-01".to_string(),
            ..Default::default()
        };
        let client = AzureChatClient::new(config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_error_from_body() {
        let body = r#"{"error": {"message": "messages must not be empty", "type": "invalid_request_error"}}"#;
        let err = error_from_body(reqwest::StatusCode::BAD_REQUEST, body);
        match err {
            EvalError::BadRequest { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "messages must not be empty");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = error_from_body(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_null_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("content_filter"));
    }
}
