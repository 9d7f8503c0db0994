//! Cosine similarity and batch candidate ranking.
//!
//! Scoring is pure computation over already-resolved vectors; the
//! embedding service handles cache lookups before calling in here.

use rayon::prelude::*;

/// Candidate count above which batch scoring fans out across the rayon
/// thread pool. Below this the per-task overhead outweighs the win.
const PARALLEL_SCORING_THRESHOLD: usize = 256;

/// Calculates cosine similarity between two vectors.
///
/// Zero-norm operands are defined to yield 0.0 — never a division by
/// zero, never NaN for finite inputs.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Scores every candidate vector against the reference and returns
/// `(index, score)` pairs sorted by score descending, ties broken by
/// input order.
///
/// Large candidate sets are scored in parallel; the sort keeps the
/// ordering deterministic either way.
#[must_use]
pub fn rank_candidates(reference: &[f32], candidates: &[Vec<f32>]) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = if candidates.len() >= PARALLEL_SCORING_THRESHOLD {
        candidates
            .par_iter()
            .enumerate()
            .map(|(i, candidate)| (i, cosine_similarity(reference, candidate)))
            .collect()
    } else {
        candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| (i, cosine_similarity(reference, candidate)))
            .collect()
    };

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored
}
