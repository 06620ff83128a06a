//! LLM integration module.
//!
//! Provides the chat and embedding clients used by the harness, the
//! prompts, and the `ChatModel` / `EmbeddingModel` traits the pipeline is
//! written against.

mod client;
mod embeddings;
mod gemini;
mod prompts;

pub use client::AzureChatClient;
pub use embeddings::{AzureEmbeddingClient, normalize_for_embedding};
pub use gemini::GeminiClient;
pub use prompts::Prompts;

use crate::error::{EvalError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Response from an LLM call including metadata.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage (if available).
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// A normally-terminated response (useful for testing).
    pub fn stop(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some("stop".to_string()),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reject completions that stopped for anything but `stop`, `length` or no reason.
pub fn ensure_expected_finish(response: &LlmResponse) -> Result<()> {
    match response.finish_reason.as_deref() {
        None | Some("") | Some("stop") | Some("length") => Ok(()),
        Some(reason) => {
            warn!(reason, content = %response.content, "Unexpected stop reason");
            warn!("Consider increasing max tokens and retrying.");
            Err(EvalError::UnexpectedCompletion(reason.to_string()))
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model or deployment name, for logging.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, messages: &[Message]) -> Result<LlmResponse>;

    /// Single user message with optional system prompt.
    ///
    /// Fails with [`EvalError::UnexpectedCompletion`] on an abnormal finish reason.
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(Message::system(sys));
        }
        messages.push(Message::user(user));

        let response = self.chat(&messages).await?;
        if let Some(usage) = response.usage {
            debug!(
                model = self.name(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }
        ensure_expected_finish(&response)?;
        Ok(response.content)
    }
}

/// A text-embedding backend.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
