//! Similarity computation and match selection.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A pair with no computable similarity scores exactly 0.0 instead of
/// failing: either vector empty, lengths differ, or either norm is zero.
/// Such a candidate simply does not match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// The candidate key (label, document, or text).
    pub key: String,

    /// Cosine similarity against the query.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(key: impl Into<String>, score: f32) -> Self {
        Self {
            key: key.into(),
            score,
        }
    }
}

/// Select the best matches from a list of scored keys.
///
/// Entries below `min_similarity` are dropped, the rest are ordered by
/// descending score. Equal scores keep their input order. When
/// `max_results` is set only that many leading entries are kept.
pub fn select_top_matches<I, K>(
    scores: I,
    min_similarity: f32,
    max_results: Option<usize>,
) -> Vec<SimilarityResult>
where
    I: IntoIterator<Item = (K, f32)>,
    K: Into<String>,
{
    let mut selected: Vec<SimilarityResult> = scores
        .into_iter()
        .filter(|(_, score)| *score >= min_similarity)
        .map(|(key, score)| SimilarityResult::new(key, score))
        .collect();

    // `sort_by_key` is stable, which keeps ties deterministic.
    selected.sort_by_key(|result| Reverse(OrderedFloat(result.score)));

    if let Some(limit) = max_results {
        selected.truncate(limit);
    }

    selected
}
