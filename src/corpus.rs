//! Loading the precomputed chunk corpus.
//!
//! The corpus is a directory of `*.json` files, each holding a JSON array of
//! objects with at least an `embedding` and a `summary`. Chunks from every
//! file are accumulated in file-name order.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// A precomputed corpus entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Embedding of the chunk text.
    pub embedding: Vec<f32>,
    /// Human-readable summary of the chunk.
    #[serde(default)]
    pub summary: Option<String>,
    /// Any other source metadata carried by the entry.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Chunk {
    pub fn new(embedding: Vec<f32>, summary: impl Into<String>) -> Self {
        Self {
            embedding,
            summary: Some(summary.into()),
            metadata: Map::new(),
        }
    }
}

/// Counts gathered while loading a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub files: usize,
    pub chunks: usize,
    pub skipped: usize,
}

/// Chunks loaded for one run.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub chunks: Vec<Chunk>,
    pub stats: CorpusStats,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Load every `*.json` file directly inside `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            error!(path = %dir.display(), "corpus directory missing");
            return Err(EvalError::InvalidCorpusPath(dir.to_path_buf()));
        }

        let mut corpus = Corpus::default();

        for path in json_files(dir)? {
            let (chunks, skipped) = load_file(&path)?;
            debug!(
                path = %path.display(),
                chunks = chunks.len(),
                skipped,
                "loaded corpus file"
            );
            corpus.stats.files += 1;
            corpus.stats.skipped += skipped;
            corpus.chunks.extend(chunks);
        }
        corpus.stats.chunks = corpus.chunks.len();

        if corpus.is_empty() {
            error!(path = %dir.display(), "corpus contains no usable chunks");
        } else {
            info!(
                files = corpus.stats.files,
                chunks = corpus.stats.chunks,
                skipped = corpus.stats.skipped,
                "corpus loaded"
            );
        }

        Ok(corpus)
    }
}

/// `*.json` files directly inside `dir`, sorted by file name.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            EvalError::io(path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Parse one corpus file, returning the well-formed chunks and the number of
/// entries that were skipped.
fn load_file(path: &Path) -> Result<(Vec<Chunk>, usize)> {
    let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    let entries: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
        EvalError::Serialization(format!("{}: expected a JSON array of chunks: {}", path.display(), e))
    })?;

    let mut chunks = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            skipped += 1;
            continue;
        }
        match serde_json::from_value::<Chunk>(entry) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                debug!(path = %path.display(), index, error = %e, "skipping malformed chunk");
                skipped += 1;
            }
        }
    }

    Ok((chunks, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_accumulates_across_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "b.json",
            r#"[{"embedding": [0.0, 1.0], "summary": "from b"}]"#,
        );
        write(
            dir.path(),
            "a.json",
            r#"[{"embedding": [1.0, 0.0], "summary": "from a", "url": "https://x"}]"#,
        );
        write(dir.path(), "notes.txt", "ignored");

        let corpus = Corpus::load_dir(dir.path()).unwrap();

        assert_eq!(corpus.stats.files, 2);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.chunks[0].summary.as_deref(), Some("from a"));
        assert_eq!(corpus.chunks[1].summary.as_deref(), Some("from b"));
        assert_eq!(corpus.chunks[0].metadata["url"], "https://x");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "chunks.json",
            r#"[
                null,
                "text",
                {"summary": "no embedding"},
                {"embedding": "not an array", "summary": "bad"},
                {"embedding": [0.5, 0.5], "summary": "good"},
                {"embedding": [0.1, 0.2]}
            ]"#,
        );

        let corpus = Corpus::load_dir(dir.path()).unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.stats.skipped, 4);
        assert_eq!(corpus.chunks[0].summary.as_deref(), Some("good"));
        assert_eq!(corpus.chunks[1].summary, None);
    }

    #[test]
    fn test_missing_directory() {
        let result = Corpus::load_dir(Path::new("/nonexistent/corpus"));
        assert!(matches!(result, Err(EvalError::InvalidCorpusPath(_))));
    }

    #[test]
    fn test_non_array_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "chunks.json", r#"{"embedding": [1.0]}"#);
        assert!(matches!(
            Corpus::load_dir(dir.path()),
            Err(EvalError::Serialization(_))
        ));
    }

    #[test]
    fn test_empty_directory_yields_empty_corpus() {
        let dir = TempDir::new().unwrap();
        let corpus = Corpus::load_dir(dir.path()).unwrap();
        assert!(corpus.is_empty());
    }
}
