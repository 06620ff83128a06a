//! Error types for the evaluation harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while running an evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading input files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization of local data.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus path '{0}' does not exist or is not a directory")]
    InvalidCorpusPath(PathBuf),

    /// A user-supplied question file could not be parsed.
    #[error("Invalid question file '{path}': {message}")]
    QuestionFile { path: PathBuf, message: String },

    /// The question source produced nothing to test.
    #[error("No questions to process")]
    NoQuestions,

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider rejected the request as malformed. Never retried.
    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// Provider-side failure (rate limit, server error, ...).
    #[error("LLM API error ({status}): {message}")]
    LlmApi { status: u16, message: String },

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP transport error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Completion stopped for a reason other than `stop` or `length`.
    #[error("Unexpected finish reason in API response: {0}")]
    UnexpectedCompletion(String),

    /// Every allowed attempt failed; carries the last error.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<EvalError>,
    },

    /// Vectors of different dimensionality.
    #[error("Input vectors must have the same shape ({left} vs {right})")]
    ShapeMismatch { left: usize, right: usize },

    /// Cosine similarity is undefined for a zero vector.
    #[error("Input vectors must not be zero vectors")]
    ZeroVector,

    /// Results could not be written.
    #[error("Failed to persist results to '{path}': {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a persistence error with path context.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Map a non-success HTTP status and body to the right error class.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 401 | 403 | 404 | 422 => Self::BadRequest { status, message },
            _ => Self::LlmApi { status, message },
        }
    }

    /// Whether an outbound call failing with this error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::LlmApi { .. } | Self::LlmParse(_) => true,
            Self::UnexpectedCompletion(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::LlmParse(err.to_string())
    }
}
