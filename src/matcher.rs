//! Best-hit selection over the chunk corpus.

use crate::corpus::Chunk;
use crate::similarity::cosine_similarity;
use tracing::debug;

/// Minimum similarity (exclusive) for a chunk to count as a hit.
pub const SIMILARITY_THRESHOLD: f32 = 0.8;

/// Outcome of matching one query embedding against the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Highest similarity seen (0.0 if nothing beat zero).
    pub best_similarity: f32,
    /// Summary of the chunk that produced `best_similarity`.
    pub best_summary: Option<String>,
    /// Whether any chunk scored strictly above the threshold.
    pub is_hit: bool,
    /// Chunks that could not be scored against the query.
    pub skipped: usize,
}

impl MatchOutcome {
    fn empty() -> Self {
        Self {
            best_similarity: 0.0,
            best_summary: None,
            is_hit: false,
            skipped: 0,
        }
    }
}

/// Finds the closest chunk to a query embedding.
#[derive(Debug, Clone, Copy)]
pub struct HitMatcher {
    threshold: f32,
}

impl Default for HitMatcher {
    fn default() -> Self {
        Self::new(SIMILARITY_THRESHOLD)
    }
}

impl HitMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Scan the corpus once, in order.
    ///
    /// The best entry is only replaced on strict improvement, so ties keep
    /// the earlier chunk. `is_hit` latches on the first chunk above the
    /// threshold. Chunks that cannot be scored are skipped.
    pub fn find_best_match(&self, query: &[f32], corpus: &[Chunk]) -> MatchOutcome {
        let mut outcome = MatchOutcome::empty();

        for (index, chunk) in corpus.iter().enumerate() {
            let similarity = match cosine_similarity(&chunk.embedding, query) {
                Ok(s) => s,
                Err(e) => {
                    debug!(index, error = %e, "skipping chunk");
                    outcome.skipped += 1;
                    continue;
                }
            };

            if similarity > self.threshold {
                outcome.is_hit = true;
            }

            if similarity > outcome.best_similarity {
                outcome.best_similarity = similarity;
                outcome.best_summary = chunk.summary.clone();
            }
        }

        outcome
    }
}
