//! Configuration for the evaluation harness.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Azure OpenAI settings shared by the chat and embedding clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// API key (whitespace is trimmed on load).
    pub api_key: String,

    /// Resource endpoint for chat completions (e.g., "https://my-res.openai.azure.com")
    pub chat_endpoint: String,

    /// Resource endpoint for embeddings. Falls back to `chat_endpoint` when empty.
    pub embedding_endpoint: String,

    /// REST API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Deployment name of the chat model.
    pub chat_deployment: String,

    /// Deployment name of the embedding model.
    pub embedding_deployment: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum tokens for chat responses.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for chat responses.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_api_version() -> String {
    "2024-06-01".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            chat_endpoint: String::new(),
            embedding_endpoint: String::new(),
            api_version: default_api_version(),
            chat_deployment: String::new(),
            embedding_deployment: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl AzureConfig {
    /// Endpoint used for embedding requests.
    pub fn embedding_endpoint(&self) -> &str {
        if self.embedding_endpoint.is_empty() {
            &self.chat_endpoint
        } else {
            &self.embedding_endpoint
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Gemini judge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base")]
    pub api_base: String,
}

fn default_gemini_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            api_base: default_gemini_base(),
        }
    }
}

/// Backoff bounds for outbound calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 5,
            max_delay_secs: 15,
            max_attempts: 15,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            min_delay: Duration::from_secs(self.min_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs.max(self.min_delay_secs)),
            max_attempts: self.max_attempts.max(1),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Azure OpenAI settings
    pub azure: AzureConfig,
    /// Gemini settings (only needed for the Gemini judge)
    pub gemini: GeminiConfig,
    /// Retry settings
    pub retry: RetryConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    azure: Option<AzureFileSection>,
    gemini: Option<GeminiFileSection>,
    retry: Option<RetryFileSection>,
}

#[derive(Debug, Deserialize)]
struct AzureFileSection {
    api_key: Option<String>,
    chat_endpoint: Option<String>,
    embedding_endpoint: Option<String>,
    api_version: Option<String>,
    chat_deployment: Option<String>,
    embedding_deployment: Option<String>,
    request_timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiFileSection {
    api_key: Option<String>,
    model: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetryFileSection {
    min_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
    max_attempts: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (AZURE_OPENAI_API_KEY, AZURE_OPENAI_CHAT_ENDPOINT, ...)
    /// 2. Config file (~/.config/persona-hit-eval/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        config.azure.api_key = config.azure.api_key.trim().to_string();

        Ok(config)
    }

    fn apply_env(&mut self) {
        let azure = &mut self.azure;
        if let Ok(v) = env::var("AZURE_OPENAI_API_KEY") {
            azure.api_key = v;
        }
        if let Ok(v) = env::var("AZURE_OPENAI_CHAT_ENDPOINT") {
            azure.chat_endpoint = v;
        }
        if let Ok(v) = env::var("AZURE_OPENAI_EMBED_ENDPOINT") {
            azure.embedding_endpoint = v;
        }
        if let Ok(v) = env::var("AZURE_OPENAI_API_VERSION") {
            azure.api_version = v;
        }
        if let Ok(v) = env::var("AZURE_OPENAI_CHAT_DEPLOYMENT") {
            azure.chat_deployment = v;
        }
        if let Ok(v) = env::var("AZURE_OPENAI_EMBED_DEPLOYMENT") {
            azure.embedding_deployment = v;
        }
        if let Ok(v) = env::var("OPENAI_REQUEST_TIMEOUT") {
            if let Ok(secs) = v.parse() {
                azure.request_timeout_secs = secs;
            }
        }
        if let Ok(v) = env::var("OPENAI_MAX_TOKENS") {
            if let Ok(tokens) = v.parse() {
                azure.max_tokens = tokens;
            }
        }

        if let Ok(v) = env::var("GEMINI_API_KEY") {
            self.gemini.api_key = v;
        }
        if let Ok(v) = env::var("GEMINI_MODEL") {
            self.gemini.model = v;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, filling gaps with defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(azure) = file_config.azure {
            let target = &mut config.azure;
            if let Some(v) = azure.api_key {
                target.api_key = v;
            }
            if let Some(v) = azure.chat_endpoint {
                target.chat_endpoint = v;
            }
            if let Some(v) = azure.embedding_endpoint {
                target.embedding_endpoint = v;
            }
            if let Some(v) = azure.api_version {
                target.api_version = v;
            }
            if let Some(v) = azure.chat_deployment {
                target.chat_deployment = v;
            }
            if let Some(v) = azure.embedding_deployment {
                target.embedding_deployment = v;
            }
            if let Some(v) = azure.request_timeout_secs {
                target.request_timeout_secs = v;
            }
            if let Some(v) = azure.max_tokens {
                target.max_tokens = v;
            }
            if let Some(v) = azure.temperature {
                target.temperature = v;
            }
        }

        if let Some(gemini) = file_config.gemini {
            if let Some(v) = gemini.api_key {
                config.gemini.api_key = v;
            }
            if let Some(v) = gemini.model {
                config.gemini.model = v;
            }
            if let Some(v) = gemini.api_base {
                config.gemini.api_base = v;
            }
        }

        if let Some(retry) = file_config.retry {
            if let Some(v) = retry.min_delay_secs {
                config.retry.min_delay_secs = v;
            }
            if let Some(v) = retry.max_delay_secs {
                config.retry.max_delay_secs = v;
            }
            if let Some(v) = retry.max_attempts {
                config.retry.max_attempts = v;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "persona-hit-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.azure.api_key.trim().is_empty() {
            return Err(EvalError::Config(
                "API key is required. Set AZURE_OPENAI_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.azure.embedding_deployment.is_empty() {
            return Err(EvalError::Config(
                "Embedding deployment name is required. Set AZURE_OPENAI_EMBED_DEPLOYMENT environment variable or add to config file.".to_string()
            ));
        }

        if self.azure.chat_endpoint.is_empty() {
            return Err(EvalError::Config(
                "Chat endpoint is required. Set AZURE_OPENAI_CHAT_ENDPOINT environment variable or add to config file.".to_string()
            ));
        }

        if self.azure.chat_deployment.is_empty() {
            return Err(EvalError::Config(
                "Chat deployment name is required. Set AZURE_OPENAI_CHAT_DEPLOYMENT environment variable or add to config file.".to_string()
            ));
        }

        Ok(())
    }

    /// Validate the settings the Gemini judge needs.
    pub fn validate_gemini(&self) -> Result<()> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(EvalError::Config(
                "Gemini API key is required for the Gemini judge. Set GEMINI_API_KEY environment variable or add to config file.".to_string()
            ));
        }
        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        chat_deployment: impl Into<String>,
        embedding_deployment: impl Into<String>,
    ) -> Self {
        Self {
            azure: AzureConfig {
                api_key: api_key.into(),
                chat_endpoint: endpoint.into(),
                chat_deployment: chat_deployment.into(),
                embedding_deployment: embedding_deployment.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.azure.api_key.is_empty());
        assert_eq!(config.azure.max_tokens, 4096);
        assert_eq!(config.retry.min_delay_secs, 5);
        assert_eq!(config.retry.max_delay_secs, 15);
        assert_eq!(config.retry.max_attempts, 15);
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_validate_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_embedding_deployment() {
        let config = Config::with_azure("https://res.example.com", "key", "gpt-4o", "");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Embedding deployment"));
    }

    #[test]
    fn test_with_azure_validates() {
        let config = Config::with_azure(
            "https://res.example.com",
            "test-key",
            "gpt-4o",
            "text-embedding-3-large",
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.azure.embedding_endpoint(), "https://res.example.com");
        assert!(config.validate_gemini().is_err());
    }

    #[test]
    fn test_from_yaml_overlays_defaults() {
        let yaml = r#"
azure:
  api_key: abc
  chat_endpoint: https://chat.example.com
  embedding_endpoint: https://embed.example.com
  chat_deployment: gpt-4o
  embedding_deployment: text-embedding-3-large
retry:
  max_attempts: 3
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.azure.embedding_endpoint(), "https://embed.example.com");
        assert_eq!(config.azure.api_version, "2024-06-01");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.min_delay_secs, 5);

        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.min_delay, Duration::from_secs(5));
    }
}
