//! Persona Hit Eval CLI
//!
//! Runs persona-driven semantic-match tests against a pre-embedded corpus.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use persona_hit_eval::{
    config::Config,
    corpus::Corpus,
    evaluator::EvaluatorKind,
    llm::{AzureChatClient, AzureEmbeddingClient, ChatModel, EmbeddingModel, GeminiClient},
    matcher::{HitMatcher, SIMILARITY_THRESHOLD},
    orchestrator::{QuestionSource, TestOrchestrator},
    persistence::{DEFAULT_VERSION_TAG, OutputFormat, ResultWriter},
    persona::Persona,
    result::RunSummary,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Persona Hit Eval - semantic-match testing for an AI learning assistant
#[derive(Parser)]
#[command(name = "persona-hit-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or load) questions and run them through the test pipeline
    Run(RunArgs),

    /// Send one chat and one embedding request to verify configuration
    Check,
}

#[derive(Args)]
struct RunArgs {
    /// Persona to generate questions as (developer, tester, business-analyst)
    #[arg(short, long, required_unless_present = "questions")]
    persona: Option<Persona>,

    /// Number of questions to generate
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,

    /// Judge model: gpt (1) or gemini (2)
    #[arg(short, long, default_value = "gpt")]
    evaluator: EvaluatorKind,

    /// Directory of pre-embedded corpus JSON files
    #[arg(short, long)]
    corpus: PathBuf,

    /// Directory results are written to
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Output format: csv or json
    #[arg(short, long, default_value = "csv")]
    format: OutputFormat,

    /// Read questions from a file instead of generating them
    #[arg(short, long, conflicts_with = "persona")]
    questions: Option<PathBuf>,

    /// Similarity a chunk must exceed to count as a hit
    #[arg(long, default_value_t = SIMILARITY_THRESHOLD)]
    threshold: f32,

    /// Version tag written into the output file name
    #[arg(long, default_value = DEFAULT_VERSION_TAG)]
    version_tag: String,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Check => cmd_check().await,
    };

    if let Err(err) = outcome {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let source = match (&args.questions, args.persona) {
        (Some(path), _) => QuestionSource::from_file(path)
            .with_context(|| format!("Failed to read questions from {}", path.display()))?,
        (None, Some(persona)) => QuestionSource::Persona {
            persona,
            count: args.count,
        },
        (None, None) => anyhow::bail!("Either --persona or --questions is required"),
    };

    info!(
        mode = source.mode_name(),
        evaluator = %args.evaluator,
        chat_deployment = %config.azure.chat_deployment,
        embedding_deployment = %config.azure.embedding_deployment,
        "starting test run"
    );
    let start = Instant::now();

    let corpus = Corpus::load_dir(&args.corpus).context("Failed to load corpus")?;

    let chat = AzureChatClient::new(config.azure.clone()).context("Failed to build chat client")?;
    let embedder = AzureEmbeddingClient::new(config.azure.clone())
        .context("Failed to build embedding client")?;
    let judge = args
        .evaluator
        .build(&config)
        .context("Failed to build evaluator")?;

    // The evaluator choice also picks the model that writes persona questions.
    let gemini = match args.evaluator {
        EvaluatorKind::Gemini => Some(
            GeminiClient::new(
                config.gemini.clone(),
                config.azure.request_timeout(),
                config.azure.max_tokens,
            )
            .context("Failed to build Gemini client")?,
        ),
        EvaluatorKind::Gpt => None,
    };

    let mut orchestrator = TestOrchestrator::new(&chat, &embedder, &judge, config.retry.policy())
        .with_matcher(HitMatcher::new(args.threshold));
    if let Some(gemini) = &gemini {
        orchestrator = orchestrator.with_question_model(gemini);
    }

    let results = orchestrator
        .run(&source, &corpus.chunks)
        .await
        .context("Test run failed")?;

    let writer = ResultWriter::new(&args.output, args.version_tag, args.format);
    let path = writer
        .write(&results, source.mode_name())
        .context("Failed to write results")?;

    let summary = RunSummary::from_results(&results);
    if summary.failed > 0 {
        warn!(failed = summary.failed, "some questions did not complete every stage");
    }
    info!(
        total = summary.total,
        hits = summary.hits,
        hit_rate = %format!("{:.1}%", summary.hit_rate() * 100.0),
        mean_relevance = %format!("{:.3}", summary.mean_relevance),
        mean_score = %summary.mean_score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "n/a".into()),
        follow_ups_on_topic = summary.follow_ups_on_topic,
        elapsed = ?start.elapsed(),
        output = %path.display(),
        "test run complete"
    );

    Ok(())
}

async fn cmd_check() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    let key = &config.azure.api_key;
    info!(
        chat_endpoint = %config.azure.chat_endpoint,
        embedding_endpoint = %config.azure.embedding_endpoint(),
        api_version = %config.azure.api_version,
        chat_deployment = %config.azure.chat_deployment,
        embedding_deployment = %config.azure.embedding_deployment,
        api_key = %format!("{}...", key.chars().take(8).collect::<String>()),
        "configuration"
    );
    config.validate().context("Invalid configuration")?;

    let chat = AzureChatClient::new(config.azure.clone())?;
    let reply = chat
        .complete(None, "Reply with the single word: ready")
        .await
        .context("Chat request failed")?;
    info!(deployment = chat.deployment(), reply = %reply.trim(), "chat connection ok");

    let embedder = AzureEmbeddingClient::new(config.azure.clone())?;
    let embedding = embedder
        .embed("connection check")
        .await
        .context("Embedding request failed")?;
    info!(dimensions = embedding.len(), "embedding connection ok");

    if config.validate_gemini().is_ok() {
        let gemini = GeminiClient::new(
            config.gemini.clone(),
            config.azure.request_timeout(),
            config.azure.max_tokens,
        )?;
        let reply = gemini
            .complete(None, "Reply with the single word: ready")
            .await
            .context("Gemini request failed")?;
        info!(model = gemini.name(), reply = %reply.trim(), "gemini connection ok");
    }

    Ok(())
}
