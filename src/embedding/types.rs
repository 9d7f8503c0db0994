//! Core types for the embedding subsystem.
//!
//! Newtypes and error types following the project's type safety
//! guidelines: dimensions and cache keys are validated wrappers rather
//! than bare primitives.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Standard vector dimension for query embeddings (all-MiniLM-L6-v2 model).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent
/// dimension mismatches between cache tiers and backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        if vector.len() != self.0 {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Cache key for an embedding: a pure function of model id and
/// normalized text.
///
/// Two callers embedding the same text with the same model always hit
/// the same cache slot, regardless of surrounding whitespace or letter
/// case in the raw input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    model_id: String,
    text_hash: String,
}

impl CacheKey {
    /// Builds the key for `(model_id, text)`.
    ///
    /// The text is normalized (lowercased, whitespace collapsed) before
    /// hashing so trivially different spellings of the same query share
    /// a slot.
    #[must_use]
    pub fn new(model_id: &str, text: &str) -> Self {
        let normalized = normalize_text(text);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let text_hash = format!("{:x}", hasher.finalize());
        Self {
            model_id: model_id.to_string(),
            text_hash,
        }
    }

    /// The model identifier this key was derived for.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Full SHA-256 hex digest of the normalized text.
    #[must_use]
    pub fn text_hash(&self) -> &str {
        &self.text_hash
    }

    /// Stable string form used by the in-memory tier.
    #[must_use]
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.model_id, self.text_hash)
    }

    /// Short hash prefix used as the disk tier's file stem.
    #[must_use]
    pub fn file_stem(&self) -> &str {
        &self.text_hash[..16]
    }
}

/// Normalizes text for cache keying: lowercase, whitespace collapsed to
/// single spaces, leading/trailing whitespace removed.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Errors that can occur during embedding operations.
///
/// These never escape the service's public `embed`/`similarity` surface;
/// they drive tier degradation internally and surface only through logs.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all cache tiers were written with the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Unknown embedding model '{0}'\nSuggestion: Use one of the supported model names (e.g. AllMiniLML6V2)"
    )]
    UnknownModel(String),

    #[error(
        "Embedding backend failed: {0}\nSuggestion: Verify the model is downloaded and readable"
    )]
    BackendFailed(String),

    #[error("Disk cache error: {0}\nSuggestion: Check disk space and cache directory permissions")]
    DiskCache(#[from] std::io::Error),

    #[error("Malformed cache entry: {0}")]
    MalformedEntry(String),
}
