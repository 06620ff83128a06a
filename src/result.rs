//! Per-question test results and run-level summary.

use crate::evaluator::parse_score;
use crate::matcher::MatchOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enrich,
    Embed,
    FollowUp,
    FollowUpJudge,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Enrich => "enrich",
            Stage::Embed => "embed",
            Stage::FollowUp => "follow_up",
            Stage::FollowUpJudge => "follow_up_judge",
            Stage::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// A stage that failed for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Outcome of testing one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestResult {
    /// Original question.
    pub question: String,
    /// Model-written article summary answering the question.
    pub enriched_question_summary: String,
    /// Whether any chunk beat the similarity threshold.
    pub hit: bool,
    /// Best similarity seen across the corpus.
    pub hit_relevance: f32,
    /// Summary of the best-matching chunk.
    pub hit_summary: Option<String>,
    /// Follow-up question to the matched summary.
    pub follow_up: String,
    /// `yes` / `no` judgment of the follow-up.
    pub follow_up_on_topic: String,
    /// Judge output.
    pub evaluation: String,
    /// Stages that failed, in order. Not persisted.
    pub failures: Vec<StageFailure>,
}

impl TestResult {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn apply_match(&mut self, outcome: MatchOutcome) {
        self.hit = outcome.is_hit;
        self.hit_relevance = outcome.best_similarity;
        self.hit_summary = outcome.best_summary;
    }

    /// Matched summary, if it is non-blank.
    pub fn matched_summary(&self) -> Option<&str> {
        self.hit_summary
            .as_deref()
            .filter(|summary| !summary.trim().is_empty())
    }

    pub fn record_failure(&mut self, stage: Stage, message: impl Into<String>) {
        self.failures.push(StageFailure {
            stage,
            message: message.into(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Aggregate numbers over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub hits: usize,
    pub failed: usize,
    pub follow_ups_on_topic: usize,
    pub mean_relevance: f64,
    pub mean_score: Option<f64>,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..Default::default()
        };
        if results.is_empty() {
            return summary;
        }

        let mut relevance_sum = 0.0f64;
        let mut scores = Vec::new();
        for result in results {
            if result.hit {
                summary.hits += 1;
            }
            if !result.is_complete() {
                summary.failed += 1;
            }
            if result.follow_up_on_topic == "yes" {
                summary.follow_ups_on_topic += 1;
            }
            relevance_sum += f64::from(result.hit_relevance);
            if let Some(score) = parse_score(&result.evaluation) {
                scores.push(f64::from(score));
            }
        }

        summary.mean_relevance = relevance_sum / results.len() as f64;
        if !scores.is_empty() {
            summary.mean_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
        }
        summary
    }

    pub fn hit_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}
