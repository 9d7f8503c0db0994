//! Embedding backend abstraction.
//!
//! The production backend wraps fastembed's `TextEmbedding`. Backends
//! are interchangeable behind the `EmbeddingBackend` trait so the
//! service (and tests) never depend on a concrete model.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

use crate::embedding::types::{EmbeddingError, VectorDimension};

/// Trait for model-backed embedding generation.
///
/// Implementations must be thread-safe and handle batches efficiently.
pub trait EmbeddingBackend: Send + Sync {
    /// Generates embeddings for multiple texts, one per input in order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The dimension of embeddings produced by this backend.
    fn dimension(&self) -> VectorDimension;

    /// Stable identifier used in cache keys.
    fn model_id(&self) -> &str;
}

/// Resolves a configured model name to a fastembed model.
///
/// Unrecognized names are a configuration error and reject at
/// construction time — the one place this crate is allowed to fail
/// loudly.
pub fn resolve_model(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML6V2Q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(EmbeddingError::UnknownModel(other.to_string())),
    }
}

/// FastEmbed-backed implementation.
///
/// The model is wrapped in a `Mutex` for interior mutability; encode
/// calls serialize on it. Construction downloads the model on first use,
/// which is why the service initializes backends lazily.
pub struct FastEmbedBackend {
    model: Mutex<TextEmbedding>,
    model_id: String,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedBackend")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("model", &"<TextEmbedding>")
            .finish()
    }
}

impl FastEmbedBackend {
    /// Creates a backend for the named model, caching model files under
    /// `models_dir`.
    ///
    /// # Errors
    /// Returns an error if the name is unknown or the model fails to
    /// initialize or download.
    pub fn new(model_name: &str, models_dir: &Path) -> Result<Self, EmbeddingError> {
        let model = resolve_model(model_name)?;

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(models_dir.to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| {
            EmbeddingError::BackendFailed(format!(
                "Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download"
            ))
        })?;

        // Probe the model once to learn the output dimension.
        let probe = text_model
            .embed(vec!["dimension probe".to_string()], None)
            .map_err(|e| EmbeddingError::BackendFailed(e.to_string()))?;
        let dimension = VectorDimension::new(
            probe
                .first()
                .map(Vec::len)
                .ok_or_else(|| EmbeddingError::BackendFailed("empty probe result".to_string()))?,
        )?;

        Ok(Self {
            model: Mutex::new(text_model),
            model_id: model_name.to_string(),
            dimension,
        })
    }
}

impl EmbeddingBackend for FastEmbedBackend {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EmbeddingError::BackendFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::BackendFailed(e.to_string()))?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Deterministic mock backend for unit tests.
///
/// Embeds texts onto a handful of topic axes so tests can steer
/// similarity without downloading a model.
#[cfg(test)]
pub struct MockBackend {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockBackend {
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
        }
    }
}

#[cfg(test)]
impl EmbeddingBackend for MockBackend {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let dim = self.dimension.get();
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let lower = text.to_lowercase();
            let mut embedding = vec![0.05; dim];

            // Topic axes keyed on content-type vocabulary.
            if lower.contains("research") || lower.contains("study") || lower.contains("paper") {
                embedding[0] = 0.9;
                embedding[1] = 0.8;
            }
            if lower.contains("news") || lower.contains("latest") || lower.contains("breaking") {
                embedding[2] = 0.9;
                embedding[3] = 0.8;
            }
            if lower.contains("code") || lower.contains("api") || lower.contains("software") {
                embedding[4] = 0.9;
                embedding[5] = 0.8;
            }
            if lower.contains("market") || lower.contains("business") || lower.contains("company")
            {
                embedding[6] = 0.9;
                embedding[7] = 0.8;
            }

            let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for value in &mut embedding {
                    *value /= magnitude;
                }
            }
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}
