//! Result persistence: one timestamped file per run.
//!
//! Supports CSV (the default, spreadsheet friendly) and pretty-printed JSON.

use crate::error::{EvalError, Result};
use crate::result::TestResult;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Version tag written into output file names unless overridden.
pub const DEFAULT_VERSION_TAG: &str = "v5";

/// Column order of every output file.
pub const COLUMNS: [&str; 8] = [
    "question",
    "enriched_question",
    "hit",
    "summary",
    "hitRelevance",
    "follow_up",
    "follow_up_on_topic",
    "evaluation",
];

const MAX_SUFFIX: u32 = 1000;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(EvalError::Config(format!("Unknown output format '{}'", other))),
        }
    }
}

/// One persisted row. Field order is the column order.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    question: &'a str,
    enriched_question: &'a str,
    hit: bool,
    summary: &'a str,
    #[serde(rename = "hitRelevance")]
    hit_relevance: f32,
    follow_up: &'a str,
    follow_up_on_topic: &'a str,
    evaluation: &'a str,
}

impl<'a> From<&'a TestResult> for ResultRow<'a> {
    fn from(result: &'a TestResult) -> Self {
        Self {
            question: &result.question,
            enriched_question: &result.enriched_question_summary,
            hit: result.hit,
            summary: result.hit_summary.as_deref().unwrap_or(""),
            hit_relevance: result.hit_relevance,
            follow_up: &result.follow_up,
            follow_up_on_topic: &result.follow_up_on_topic,
            evaluation: &result.evaluation,
        }
    }
}

/// `test_output_<version>_<mode>_<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn output_file_name(
    version: &str,
    mode: &str,
    timestamp: NaiveDateTime,
    format: OutputFormat,
) -> String {
    format!(
        "test_output_{}_{}_{}.{}",
        version,
        mode,
        timestamp.format("%Y-%m-%d_%H-%M-%S"),
        format.extension()
    )
}

/// Writes run results into an output directory.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
    version: String,
    format: OutputFormat,
}

impl ResultWriter {
    pub fn new(dir: impl Into<PathBuf>, version: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            version: version.into(),
            format,
        }
    }

    /// Write `results` for test mode `mode`, stamped with the current local time.
    pub fn write(&self, results: &[TestResult], mode: &str) -> Result<PathBuf> {
        self.write_at(results, mode, Local::now().naive_local())
    }

    /// Write with an explicit timestamp. Returns the path actually written.
    pub fn write_at(
        &self,
        results: &[TestResult],
        mode: &str,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| EvalError::persistence(&self.dir, e))?;

        let name = output_file_name(&self.version, mode, timestamp, self.format);
        let (path, file) = self.create_unique(&name)?;

        let rows: Vec<ResultRow<'_>> = results.iter().map(ResultRow::from).collect();
        let written = match self.format {
            OutputFormat::Csv => write_csv(file, &rows),
            OutputFormat::Json => write_json(file, &rows),
        };
        written.map_err(|e| EvalError::persistence(&path, e))?;

        info!(path = %path.display(), rows = rows.len(), "results written");
        Ok(path)
    }

    /// Open a new file, adding `-1`, `-2`, ... before the extension on collision.
    fn create_unique(&self, name: &str) -> Result<(PathBuf, File)> {
        let path = Path::new(name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
        let ext = self.format.extension();

        let mut last_err = None;
        for suffix in 0..=MAX_SUFFIX {
            let candidate = if suffix == 0 {
                self.dir.join(name)
            } else {
                self.dir.join(format!("{}-{}.{}", stem, suffix, ext))
            };
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(EvalError::persistence(candidate, e)),
            }
        }

        let err = last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"));
        Err(EvalError::persistence(self.dir.join(name), err))
    }
}

fn write_csv(file: File, rows: &[ResultRow<'_>]) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()
}

fn write_json(file: File, rows: &[ResultRow<'_>]) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
