//! Test orchestration: drives every question through the pipeline.
//!
//! Per question the stages run in a fixed order:
//! enrich → embed → match → follow-up → follow-up judge → evaluate.
//!
//! An enrich or embed failure ends that question early. The record keeps
//! only the fields finished before the failure and the run moves on.
//! Follow-up and evaluation failures leave their own fields empty.
//! Failing to obtain the question set aborts the run.

use crate::corpus::Chunk;
use crate::error::{EvalError, Result};
use crate::evaluator::Evaluator;
use crate::llm::{ChatModel, EmbeddingModel, Prompts, normalize_for_embedding};
use crate::matcher::HitMatcher;
use crate::persona::Persona;
use crate::result::{Stage, TestResult};
use crate::retry::{RetryPolicy, retry};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Where the questions for a run come from.
#[derive(Debug, Clone)]
pub enum QuestionSource {
    /// Generate `count` questions in a persona's voice.
    Persona { persona: Persona, count: usize },
    /// A fixed, user-supplied list.
    Fixed(Vec<String>),
}

impl QuestionSource {
    /// Test-mode tag used in output file names.
    pub fn mode_name(&self) -> &'static str {
        match self {
            QuestionSource::Persona { persona, .. } => persona.mode_name(),
            QuestionSource::Fixed(_) => "custom",
        }
    }

    /// Read questions from a file: a JSON array of strings, or one per line.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        let questions = if content.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<String>>(&content).map_err(|e| EvalError::QuestionFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            content.lines().map(str::to_string).collect()
        };

        let questions: Vec<String> = questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        Ok(QuestionSource::Fixed(questions))
    }
}

/// Map a free-form on-topic reply onto `yes` / `no` where possible.
pub fn normalize_on_topic(reply: &str) -> String {
    let cleaned = reply.trim().to_lowercase();
    let first_word = cleaned
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| !word.is_empty())
        .unwrap_or("");
    match first_word {
        "yes" => "yes".to_string(),
        "no" => "no".to_string(),
        _ => cleaned
            .trim_matches(|c: char| c == '\'' || c == '"' || c == '.' || c == '!')
            .to_string(),
    }
}

/// Runs the test pipeline over a question set.
pub struct TestOrchestrator<'a> {
    chat: &'a dyn ChatModel,
    question_model: &'a dyn ChatModel,
    embedder: &'a dyn EmbeddingModel,
    evaluator: &'a dyn Evaluator,
    matcher: HitMatcher,
    policy: RetryPolicy,
}

impl<'a> TestOrchestrator<'a> {
    pub fn new(
        chat: &'a dyn ChatModel,
        embedder: &'a dyn EmbeddingModel,
        evaluator: &'a dyn Evaluator,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            chat,
            question_model: chat,
            embedder,
            evaluator,
            matcher: HitMatcher::default(),
            policy,
        }
    }

    /// Use a different model for persona question generation.
    pub fn with_question_model(mut self, model: &'a dyn ChatModel) -> Self {
        self.question_model = model;
        self
    }

    pub fn with_matcher(mut self, matcher: HitMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Obtain the questions and process every one of them, in order.
    pub async fn run(&self, source: &QuestionSource, corpus: &[Chunk]) -> Result<Vec<TestResult>> {
        let questions = match source {
            QuestionSource::Persona { persona, count } => persona
                .generate_questions(self.question_model, &self.policy, *count)
                .await
                .inspect_err(|e| error!(persona = %persona, error = %e, "question generation failed"))?,
            QuestionSource::Fixed(questions) => questions.clone(),
        };

        if questions.is_empty() {
            error!("Generated questions are empty. Exiting the test.");
            return Err(EvalError::NoQuestions);
        }

        info!(
            questions = questions.len(),
            chunks = corpus.len(),
            threshold = self.matcher.threshold(),
            evaluator = self.evaluator.name(),
            "processing questions"
        );
        Ok(self.process_questions(&questions, corpus).await)
    }

    /// Process questions strictly sequentially; output order equals input order.
    pub async fn process_questions(&self, questions: &[String], corpus: &[Chunk]) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            info!(index = index + 1, total = questions.len(), "processing question");
            results.push(self.process_question(question, corpus).await);
        }
        debug!(processed = results.len(), "Total tests processed");
        results
    }

    /// Run one question through every stage.
    pub async fn process_question(&self, question: &str, corpus: &[Chunk]) -> TestResult {
        let mut result = TestResult::new(question);

        match self.enrich(question).await {
            Ok(enriched) => result.enriched_question_summary = enriched,
            Err(e) => {
                error!(question, stage = %Stage::Enrich, error = %e, "question abandoned");
                result.record_failure(Stage::Enrich, e.to_string());
                return result;
            }
        }

        let embedding = match self.embed(&result.enriched_question_summary).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(question, stage = %Stage::Embed, error = %e, "question abandoned");
                result.record_failure(Stage::Embed, e.to_string());
                return result;
            }
        };

        let outcome = self.matcher.find_best_match(&embedding, corpus);
        debug!(
            hit = outcome.is_hit,
            relevance = outcome.best_similarity,
            skipped = outcome.skipped,
            "match complete"
        );
        result.apply_match(outcome);

        // Follow-up only for a hit with a usable summary.
        if result.hit {
            if let Some(summary) = result.matched_summary().map(str::to_string) {
                self.follow_up_stages(&summary, &mut result).await;
            }
        }

        match self
            .evaluator
            .evaluate(question, &result.enriched_question_summary)
            .await
        {
            Ok(evaluation) => result.evaluation = evaluation,
            Err(e) => {
                warn!(question, judge = self.evaluator.name(), error = %e, "evaluation failed");
                result.record_failure(Stage::Evaluate, e.to_string());
            }
        }

        result
    }

    async fn follow_up_stages(&self, summary: &str, result: &mut TestResult) {
        let follow_up = match self.follow_up(summary).await {
            Ok(follow_up) => follow_up,
            Err(e) => {
                warn!(error = %e, "follow-up generation failed");
                result.record_failure(Stage::FollowUp, e.to_string());
                return;
            }
        };
        result.follow_up = follow_up;

        match self.judge_follow_up(&result.follow_up).await {
            Ok(on_topic) => result.follow_up_on_topic = on_topic,
            Err(e) => {
                warn!(error = %e, "follow-up judgment failed");
                result.record_failure(Stage::FollowUpJudge, e.to_string());
            }
        }
    }

    async fn enrich(&self, question: &str) -> Result<String> {
        let user = format!("{}Question: {}", Prompts::enrichment(), question);
        debug!(payload = %user, "enrichment request");
        let chat = self.chat;
        let response = retry(&self.policy, "enrich", || {
            chat.complete(Some(Prompts::assistant_persona()), &user)
        })
        .await?;
        debug!(response = %response, "enrichment received");
        Ok(response)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = normalize_for_embedding(text);
        let embedder = self.embedder;
        retry(&self.policy, "embed", || embedder.embed(&text)).await
    }

    async fn follow_up(&self, summary: &str) -> Result<String> {
        let chat = self.chat;
        let response = retry(&self.policy, "follow_up", || {
            chat.complete(Some(Prompts::follow_up()), summary)
        })
        .await?;
        Ok(response.trim().to_string())
    }

    async fn judge_follow_up(&self, follow_up: &str) -> Result<String> {
        let chat = self.chat;
        let response = retry(&self.policy, "follow_up_on_topic", || {
            chat.complete(Some(Prompts::follow_up_on_topic()), follow_up)
        })
        .await?;
        Ok(normalize_on_topic(&response))
    }
}
