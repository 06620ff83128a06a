//! Persona Hit Eval - semantic-match testing for an AI learning assistant.
//!
//! Questions are generated in a persona's voice, enriched into a short
//! article summary by a chat model, embedded, and matched against a corpus of
//! pre-embedded content chunks. A hit is any chunk whose cosine similarity
//! with the enriched question exceeds the threshold (0.8). Hits get a
//! follow-up question and an on-topic judgment; every answer is scored by an
//! LLM judge. One result file is written per run.
//!
//! # Quick Start
//!
//! ```no_run
//! use persona_hit_eval::{
//!     config::Config,
//!     corpus::Corpus,
//!     evaluator::EvaluatorKind,
//!     llm::{AzureChatClient, AzureEmbeddingClient},
//!     orchestrator::{QuestionSource, TestOrchestrator},
//!     persistence::{OutputFormat, ResultWriter},
//!     persona::Persona,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let chat = AzureChatClient::new(config.azure.clone())?;
//!     let embedder = AzureEmbeddingClient::new(config.azure.clone())?;
//!     let judge = EvaluatorKind::Gpt.build(&config)?;
//!     let corpus = Corpus::load_dir(Path::new("embeddings"))?;
//!
//!     let orchestrator = TestOrchestrator::new(&chat, &embedder, &judge, config.retry.policy());
//!     let source = QuestionSource::Persona {
//!         persona: Persona::Developer,
//!         count: 10,
//!     };
//!     let results = orchestrator.run(&source, &corpus.chunks).await?;
//!
//!     let writer = ResultWriter::new("results", "v5", OutputFormat::Csv);
//!     let path = writer.write(&results, source.mode_name())?;
//!     println!("wrote {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Corpus**: pre-embedded chunks loaded from a directory of JSON files
//! - **HitMatcher**: best-match search with a hit threshold
//! - **Persona**: question generation in a developer/tester/analyst voice
//! - **Evaluator**: GPT or Gemini judge behind one trait
//! - **TestOrchestrator**: the per-question pipeline
//! - **ResultWriter**: timestamped CSV/JSON output

pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluator;
pub mod llm;
pub mod matcher;
pub mod orchestrator;
pub mod persistence;
pub mod persona;
pub mod result;
pub mod retry;
pub mod similarity;

// Re-export commonly used types
pub use config::Config;
pub use corpus::{Chunk, Corpus};
pub use error::{EvalError, Result};
pub use evaluator::{Evaluator, EvaluatorKind, LlmJudge};
pub use matcher::{HitMatcher, MatchOutcome, SIMILARITY_THRESHOLD};
pub use orchestrator::{QuestionSource, TestOrchestrator};
pub use persistence::{OutputFormat, ResultWriter};
pub use persona::Persona;
pub use result::{RunSummary, TestResult};
pub use retry::{RetryPolicy, retry};
pub use similarity::cosine_similarity;
