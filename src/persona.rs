//! Persona-driven question generation.

use crate::error::{EvalError, Result};
use crate::llm::{ChatModel, Prompts};
use crate::retry::{RetryPolicy, retry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// The voice questions are generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Developer,
    Tester,
    BusinessAnalyst,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Developer, Persona::Tester, Persona::BusinessAnalyst];

    /// System prompt establishing the persona.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Developer => Prompts::developer_persona(),
            Persona::Tester => Prompts::tester_persona(),
            Persona::BusinessAnalyst => Prompts::business_analyst_persona(),
        }
    }

    /// Tag used in output file names.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Persona::Developer => "developer",
            Persona::Tester => "tester",
            Persona::BusinessAnalyst => "businessanalyst",
        }
    }

    /// Ask the model for `count` questions in this persona's voice.
    ///
    /// Fewer questions than requested are accepted as-is; extra lines are
    /// dropped.
    pub async fn generate_questions(
        &self,
        chat: &dyn ChatModel,
        policy: &RetryPolicy,
        count: usize,
    ) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let prompt = Prompts::generate_questions().replace("{count}", &count.to_string());
        info!(persona = self.mode_name(), count, model = chat.name(), "generating questions");

        let response = retry(policy, "generate_questions", || {
            chat.complete(Some(self.system_prompt()), &prompt)
        })
        .await?;

        let questions = parse_question_list(&response, count);
        if questions.len() < count {
            warn!(
                requested = count,
                received = questions.len(),
                "model returned fewer questions than requested"
            );
        }
        Ok(questions)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_name())
    }
}

impl FromStr for Persona {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "developer" | "dev" => Ok(Persona::Developer),
            "tester" | "test" => Ok(Persona::Tester),
            "businessanalyst" | "ba" => Ok(Persona::BusinessAnalyst),
            other => Err(EvalError::Config(format!("Unknown persona '{}'", other))),
        }
    }
}

/// Split a model reply into questions, stripping list markers.
pub fn parse_question_list(response: &str, limit: usize) -> Vec<String> {
    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);

    // "12. question" or "12) question"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest.trim();
            }
        }
    }
    line.trim()
}
