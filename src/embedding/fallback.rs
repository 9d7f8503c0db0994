//! Deterministic fallback embedding generation.
//!
//! When no model backend is available the service still has to produce a
//! vector for every text, with three guarantees: the same text always
//! yields the same vector (within a process and across restarts),
//! different texts yield statistically uncorrelated vectors, and texts
//! sharing terms stay similar enough that ranking remains meaningful.
//!
//! Each token's SHA-256 digest seeds a pseudo-random unit vector; the
//! token vectors are frequency-weighted and summed together with a
//! reduced-weight whole-text vector, then L2-normalized. Token overlap
//! between two texts produces overlapping components, so
//! "ai research" ranks closer to "ai research papers" than to an
//! unrelated query even without a model.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::embedding::types::VectorDimension;

/// Weight of the whole-text component relative to the token sum.
///
/// Keeps texts with identical token multisets but different ordering
/// distinguishable without drowning out token overlap.
const WHOLE_TEXT_WEIGHT: f32 = 0.25;

/// Deterministic hash-seeded embedding generator.
#[derive(Debug, Clone, Copy)]
pub struct FallbackGenerator {
    dimension: VectorDimension,
}

impl FallbackGenerator {
    /// Creates a generator producing vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    /// The dimension of generated vectors.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Generates the deterministic vector for `text`.
    ///
    /// Empty or whitespace-only text still yields a deterministic
    /// non-zero vector (the whole-text component alone).
    #[must_use]
    pub fn generate(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let tokens = tokenize(text);

        let mut acc = vec![0.0f32; dim];

        if !tokens.is_empty() {
            let mut counts: HashMap<&str, f32> = HashMap::new();
            for token in &tokens {
                *counts.entry(token.as_str()).or_default() += 1.0;
            }
            let total = tokens.len() as f32;
            for (token, count) in counts {
                let token_vec = seeded_unit_vector(token, dim);
                let weight = count / total;
                for (slot, value) in acc.iter_mut().zip(token_vec.iter()) {
                    *slot += weight * value;
                }
            }
        }

        // Whole-text component keyed on the exact (trimmed) text.
        let whole = seeded_unit_vector(text.trim(), dim);
        for (slot, value) in acc.iter_mut().zip(whole.iter()) {
            *slot += WHOLE_TEXT_WEIGHT * value;
        }

        l2_normalize(&mut acc);
        acc
    }

    /// Generates vectors for a batch of texts, order-preserving.
    #[must_use]
    pub fn generate_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.generate(t)).collect()
    }
}

/// Splits text into lowercase alphanumeric terms of length >= 2.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|s| s.len() >= 2)
        .map(|s| s.to_lowercase())
        .collect()
}

/// Derives a unit vector from the SHA-256 digest of `seed_text`.
///
/// The digest seeds a `StdRng`, so the mapping is stable across
/// processes and cache restarts for a pinned rand version.
fn seeded_unit_vector(seed_text: &str, dim: usize) -> Vec<f32> {
    let mut hasher = Sha256::new();
    hasher.update(seed_text.as_bytes());
    let digest = hasher.finalize();

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);

    let mut rng = StdRng::from_seed(seed);
    let mut vec: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
    l2_normalize(&mut vec);
    vec
}

/// Normalizes to unit length in place. Zero vectors are left unchanged.
fn l2_normalize(vec: &mut [f32]) {
    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vec.iter_mut() {
            *value /= magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::similarity::cosine_similarity;

    fn generator() -> FallbackGenerator {
        FallbackGenerator::new(VectorDimension::dimension_384())
    }

    #[test]
    fn test_same_text_same_vector() {
        let generator = generator();
        let a = generator.generate("quantum computing research");
        let b = generator.generate("quantum computing research");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_texts_differ() {
        let generator = generator();
        let a = generator.generate("quantum computing research");
        let b = generator.generate("best pizza recipe");
        assert_ne!(a, b);
        // Unrelated texts should be roughly uncorrelated.
        assert!(cosine_similarity(&a, &b).abs() < 0.3);
    }

    #[test]
    fn test_vectors_are_unit_length() {
        let generator = generator();
        for text in ["hello world", "a", ""] {
            let vec = generator.generate(text);
            let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!(
                (magnitude - 1.0).abs() < 0.01,
                "expected unit vector for {text:?}"
            );
        }
    }

    #[test]
    fn test_token_overlap_ranks_higher() {
        let generator = generator();
        let reference = generator.generate("ai research");
        let related = generator.generate("ai research papers");
        let unrelated = generator.generate("best pizza recipe");

        let related_score = cosine_similarity(&reference, &related);
        let unrelated_score = cosine_similarity(&reference, &unrelated);
        assert!(
            related_score > unrelated_score,
            "related {related_score} should beat unrelated {unrelated_score}"
        );
    }

    #[test]
    fn test_empty_text_is_deterministic() {
        let generator = generator();
        assert_eq!(generator.generate(""), generator.generate(""));
        let vec = generator.generate("");
        assert!(vec.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let generator = generator();
        let texts = vec!["one".to_string(), "two".to_string()];
        let batch = generator.generate_batch(&texts);
        assert_eq!(batch[0], generator.generate("one"));
        assert_eq!(batch[1], generator.generate("two"));
    }
}
