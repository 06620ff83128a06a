//! LLM-as-judge scoring of enriched answers.

use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::llm::{AzureChatClient, ChatModel, GeminiClient, Prompts};
use crate::retry::{RetryPolicy, retry};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Scores an answer against the question it was written for.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Judge name, for logging.
    fn name(&self) -> &str;

    /// Evaluate `enriched_summary` as an answer to `question`.
    async fn evaluate(&self, question: &str, enriched_summary: &str) -> Result<String>;
}

/// Which judge a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluatorKind {
    #[default]
    Gpt,
    Gemini,
}

impl EvaluatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            EvaluatorKind::Gpt => "gpt4o",
            EvaluatorKind::Gemini => "gemini",
        }
    }

    /// Build the judge for this kind from run configuration.
    pub fn build(&self, config: &Config) -> Result<LlmJudge> {
        let policy = config.retry.policy();
        let model: Box<dyn ChatModel> = match self {
            EvaluatorKind::Gpt => Box::new(AzureChatClient::new(config.azure.clone())?),
            EvaluatorKind::Gemini => {
                config.validate_gemini()?;
                Box::new(GeminiClient::new(
                    config.gemini.clone(),
                    config.azure.request_timeout(),
                    config.azure.max_tokens,
                )?)
            }
        };
        Ok(LlmJudge::new(*self, model, policy))
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvaluatorKind {
    type Err = EvalError;

    /// Accepts names as well as the numeric choices `1` (GPT) and `2` (Gemini).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "gpt" | "gpt4o" | "gpt-4o" => Ok(EvaluatorKind::Gpt),
            "2" | "gemini" => Ok(EvaluatorKind::Gemini),
            other => Err(EvalError::Config(format!("Unknown evaluator '{}'", other))),
        }
    }
}

/// Judge backed by a chat model.
pub struct LlmJudge {
    kind: EvaluatorKind,
    model: Box<dyn ChatModel>,
    policy: RetryPolicy,
}

impl LlmJudge {
    pub fn new(kind: EvaluatorKind, model: Box<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self {
            kind,
            model,
            policy,
        }
    }
}

#[async_trait]
impl Evaluator for LlmJudge {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn evaluate(&self, question: &str, enriched_summary: &str) -> Result<String> {
        let prompt = fill_judge_prompt(question, enriched_summary);

        let model = self.model.as_ref();
        let response = retry(&self.policy, "evaluate", || {
            model.complete(Some(Prompts::judge_system()), &prompt)
        })
        .await?;

        debug!(judge = self.name(), response = %response, "evaluation received");
        Ok(response.trim().to_string())
    }
}

/// Substitute both placeholders of the judge template in a single pass, so
/// placeholder text inside either value is left alone.
fn fill_judge_prompt(question: &str, answer: &str) -> String {
    Prompts::judge()
        .split("{question}")
        .map(|part| part.replace("{answer}", answer))
        .collect::<Vec<_>>()
        .join(question)
}

/// Pull the `Score: N` value out of a judge reply.
pub fn parse_score(evaluation: &str) -> Option<u8> {
    evaluation.lines().find_map(|line| {
        let (label, value) = line.split_once(':')?;
        if !label.trim().eq_ignore_ascii_case("score") {
            return None;
        }
        let digits: String = value
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u8>().ok().map(|n| n.clamp(1, 10))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, Message};
    use std::sync::{Arc, Mutex};

    struct RecordingChat {
        prompts: Arc<Mutex<Vec<String>>>,
        reply: LlmResponse,
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        fn name(&self) -> &str {
            "recording"
        }

        async fn chat(&self, messages: &[Message]) -> Result<LlmResponse> {
            let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(user);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("1".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Gpt);
        assert_eq!("gpt".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Gpt);
        assert_eq!("2".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Gemini);
        assert_eq!("Gemini".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Gemini);
        assert!("3".parse::<EvaluatorKind>().is_err());
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = Config::with_azure("https://res.example.com", "k", "gpt-4o", "embed");
        assert!(EvaluatorKind::Gemini.build(&config).is_err());
        assert!(EvaluatorKind::Gpt.build(&config).is_ok());
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("Score: 8\nReason: good"), Some(8));
        assert_eq!(parse_score("score : 7/10"), Some(7));
        assert_eq!(parse_score("Reason: none\nScore: 12"), Some(10));
        assert_eq!(parse_score("I think it's fine"), None);
    }

    #[tokio::test]
    async fn test_evaluate_fills_prompt_and_trims() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let chat = RecordingChat {
            prompts: Arc::clone(&prompts),
            reply: LlmResponse::stop("  Score: 9\nReason: on point  \n"),
        };
        let judge = LlmJudge::new(EvaluatorKind::Gemini, Box::new(chat), RetryPolicy::immediate(1));

        let evaluation = judge
            .evaluate("What is RAG?", "An article on retrieval.")
            .await
            .unwrap();

        assert_eq!(evaluation, "Score: 9\nReason: on point");
        assert_eq!(judge.name(), "gemini");

        let prompts = prompts.lock().unwrap();
        assert!(prompts[0].contains("Question: What is RAG?"));
        assert!(prompts[0].contains("Answer: An article on retrieval."));
    }

    #[test]
    fn test_placeholders_in_values_are_not_expanded() {
        let prompt = fill_judge_prompt("What does {answer} mean?", "It names the {question} slot.");
        assert!(prompt.contains("Question: What does {answer} mean?"));
        assert!(prompt.contains("Answer: It names the {question} slot."));
        assert_eq!(prompt.matches("It names").count(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_unexpected_finish() {
        let chat = RecordingChat {
            prompts: Arc::new(Mutex::new(Vec::new())),
            reply: LlmResponse {
                content: String::new(),
                finish_reason: Some("content_filter".into()),
                usage: None,
            },
        };
        let judge = LlmJudge::new(EvaluatorKind::Gpt, Box::new(chat), RetryPolicy::immediate(2));

        let result = judge.evaluate("q", "a").await;
        assert!(matches!(result, Err(EvalError::RetriesExhausted { attempts: 2, .. })));
    }
}
