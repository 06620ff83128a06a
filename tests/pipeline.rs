//! End-to-end run over stub models: corpus on disk, questions through the
//! orchestrator, results written to a CSV file.

use async_trait::async_trait;
use persona_hit_eval::llm::{ChatModel, EmbeddingModel, LlmResponse, Message, Prompts};
use persona_hit_eval::result::Stage;
use persona_hit_eval::{
    Corpus, EvalError, Evaluator, OutputFormat, QuestionSource, ResultWriter, RetryPolicy,
    RunSummary, TestOrchestrator,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Echoes the question back as the enriched summary.
struct EchoChat {
    /// Fail enrichment this many times before answering.
    flaky_enrich: AtomicUsize,
}

#[async_trait]
impl ChatModel for EchoChat {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(&self, messages: &[Message]) -> persona_hit_eval::Result<LlmResponse> {
        let system = messages[0].content.as_str();
        let user = messages[1].content.as_str();

        if system == Prompts::assistant_persona() {
            let question = user.rsplit("Question: ").next().unwrap_or_default();
            if question.contains("reject") {
                return Err(EvalError::from_status(400, "content policy"));
            }
            if self
                .flaky_enrich
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(EvalError::from_status(503, "busy"));
            }
            return Ok(LlmResponse::stop(format!("summary: {}", question)));
        }
        if system == Prompts::follow_up() {
            return Ok(LlmResponse::stop("What comes next?"));
        }
        if system == Prompts::follow_up_on_topic() {
            return Ok(LlmResponse::stop("no"));
        }
        Ok(LlmResponse::stop("unused"))
    }
}

/// "embeddings" texts point along x, "tokens" along y, everything else along z.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingModel for KeywordEmbedder {
    async fn embed(&self, text: &str) -> persona_hit_eval::Result<Vec<f32>> {
        let v = if text.contains("embeddings") {
            vec![1.0, 0.0, 0.0]
        } else if text.contains("tokens") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        };
        Ok(v)
    }
}

struct FixedJudge;

#[async_trait]
impl Evaluator for FixedJudge {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn evaluate(&self, question: &str, _enriched: &str) -> persona_hit_eval::Result<String> {
        if question.contains("tokens") {
            return Err(EvalError::from_status(401, "bad key"));
        }
        Ok("Score: 6\nReason: fine".to_string())
    }
}

fn write_corpus(dir: &std::path::Path) {
    // Split across two files; both contribute.
    fs::write(
        dir.join("a_part.json"),
        r#"[{"embedding": [0.99, 0.1, 0.0], "summary": "Embeddings explained", "source": "intro.md"},
            {"embedding": [0.0], "summary": "wrong shape"}]"#,
    )
    .unwrap();
    fs::write(
        dir.join("b_part.json"),
        r#"[{"embedding": [0.5, 0.5, 0.5], "summary": "General overview"},
            {"summary": "no embedding"}]"#,
    )
    .unwrap();
}

#[tokio::test]
async fn test_full_run_writes_ordered_results() {
    let tmp = TempDir::new().unwrap();
    let corpus_dir = tmp.path().join("corpus");
    fs::create_dir(&corpus_dir).unwrap();
    write_corpus(&corpus_dir);

    let corpus = Corpus::load_dir(&corpus_dir).unwrap();
    assert_eq!(corpus.stats.files, 2);
    assert_eq!(corpus.len(), 3);
    assert_eq!(corpus.stats.skipped, 1);

    let chat = EchoChat {
        flaky_enrich: AtomicUsize::new(1),
    };
    let orchestrator =
        TestOrchestrator::new(&chat, &KeywordEmbedder, &FixedJudge, RetryPolicy::immediate(3));

    let source = QuestionSource::Fixed(vec![
        "How do embeddings work?".to_string(),
        "Please reject this".to_string(),
        "What are tokens?".to_string(),
    ]);
    let results = orchestrator.run(&source, &corpus.chunks).await.unwrap();

    assert_eq!(results.len(), 3);
    let questions: Vec<&str> = results.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(
        questions,
        ["How do embeddings work?", "Please reject this", "What are tokens?"]
    );

    // Transient enrichment failure retried, then a full hit.
    let hit = &results[0];
    assert!(hit.hit);
    assert_eq!(hit.hit_summary.as_deref(), Some("Embeddings explained"));
    assert_eq!(hit.follow_up, "What comes next?");
    assert_eq!(hit.follow_up_on_topic, "no");
    assert_eq!(hit.evaluation, "Score: 6\nReason: fine");
    assert!(hit.is_complete());

    // Permanent enrichment failure: partial record, run continues.
    let rejected = &results[1];
    assert!(rejected.enriched_question_summary.is_empty());
    assert!(!rejected.hit);
    assert_eq!(rejected.failures.len(), 1);
    assert_eq!(rejected.failures[0].stage, Stage::Enrich);

    // Below threshold: best chunk recorded, no follow-up, judge failure leaves evaluation empty.
    let tokens = &results[2];
    assert!(!tokens.hit);
    assert_eq!(tokens.hit_summary.as_deref(), Some("General overview"));
    assert!(tokens.follow_up.is_empty());
    assert!(tokens.follow_up_on_topic.is_empty());
    assert_eq!(tokens.failures.len(), 1);
    assert!(tokens.evaluation.is_empty());
    assert_eq!(tokens.failures.last().unwrap().stage, Stage::Evaluate);

    let summary = RunSummary::from_results(&results);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.hits, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.mean_score, Some(6.0));

    let out_dir = tmp.path().join("out");
    let writer = ResultWriter::new(&out_dir, "v5", OutputFormat::Csv);
    let path = writer.write(&results, source.mode_name()).unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("test_output_v5_custom_"));
    assert!(name.ends_with(".csv"));

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], "How do embeddings work?");
    assert_eq!(&rows[0][2], "true");
    assert_eq!(&rows[1][1], "");
    assert_eq!(&rows[2][7], "");
}

#[tokio::test]
async fn test_empty_question_file_aborts_run() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("questions.txt");
    fs::write(&file, "\n   \n").unwrap();

    let chat = EchoChat {
        flaky_enrich: AtomicUsize::new(0),
    };
    let orchestrator =
        TestOrchestrator::new(&chat, &KeywordEmbedder, &FixedJudge, RetryPolicy::immediate(1));

    let source = QuestionSource::from_file(&file).unwrap();
    let result = orchestrator.run(&source, &[]).await;
    assert!(matches!(result, Err(EvalError::NoQuestions)));
}
