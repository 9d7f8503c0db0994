//! Nearest-centroid statistical model.
//!
//! One centroid per trained category; probabilities come from a
//! temperature-scaled softmax over cosine similarities between the
//! query embedding and each centroid. The model is a small bincode
//! artifact, loaded lazily and rewritten on every refit.

use bincode::{Decode, Encode};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::classify::types::{ClassifyError, ContentType};
use crate::embedding::cosine_similarity;

/// Current artifact format version.
const FORMAT_VERSION: u32 = 1;

/// Centroid classifier over embeddings.
#[derive(Debug, Clone, Encode, Decode)]
pub struct CentroidModel {
    version: u32,
    /// Embedding model the centroids were computed with.
    pub embedding_model_id: String,
    dimension: u32,
    centroids: Vec<(ContentType, Vec<f32>)>,
    pub trained_examples: u64,
}

impl CentroidModel {
    /// Fits centroids from labeled embeddings.
    ///
    /// Returns `None` when `samples` is empty — there is nothing to fit
    /// and callers treat that as "no model".
    #[must_use]
    pub fn fit(
        samples: &[(ContentType, Vec<f32>)],
        embedding_model_id: &str,
        dimension: usize,
    ) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sums: HashMap<ContentType, (Vec<f32>, usize)> = HashMap::new();
        for (label, embedding) in samples {
            if embedding.len() != dimension {
                continue;
            }
            let (sum, count) = sums
                .entry(*label)
                .or_insert_with(|| (vec![0.0; dimension], 0));
            for (slot, value) in sum.iter_mut().zip(embedding.iter()) {
                *slot += value;
            }
            *count += 1;
        }

        if sums.is_empty() {
            return None;
        }

        let mut centroids: Vec<(ContentType, Vec<f32>)> = sums
            .into_iter()
            .map(|(label, (mut sum, count))| {
                for value in &mut sum {
                    *value /= count as f32;
                }
                let magnitude: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
                if magnitude > 0.0 {
                    for value in &mut sum {
                        *value /= magnitude;
                    }
                }
                (label, sum)
            })
            .collect();
        // Stable centroid order keeps artifacts byte-comparable.
        centroids.sort_by_key(|(label, _)| {
            ContentType::ALL.iter().position(|c| c == label).unwrap_or(usize::MAX)
        });

        Some(Self {
            version: FORMAT_VERSION,
            embedding_model_id: embedding_model_id.to_string(),
            dimension: dimension as u32,
            centroids,
            trained_examples: samples.len() as u64,
        })
    }

    /// Per-category probabilities for an embedding.
    ///
    /// Categories without a trained centroid get probability 0.0; the
    /// rest share a softmax over similarity to their centroids.
    pub fn predict(
        &self,
        embedding: &[f32],
        temperature: f32,
    ) -> Result<HashMap<ContentType, f32>, ClassifyError> {
        if self.centroids.is_empty() {
            return Err(ClassifyError::EmptyModel);
        }
        if embedding.len() != self.dimension as usize {
            return Err(ClassifyError::DimensionMismatch {
                model: self.dimension as usize,
                embedding: embedding.len(),
            });
        }

        let temperature = temperature.max(0.01);
        let scaled: Vec<(ContentType, f32)> = self
            .centroids
            .iter()
            .map(|(label, centroid)| {
                (*label, cosine_similarity(embedding, centroid) / temperature)
            })
            .collect();

        // Softmax with max-shift for numeric stability.
        let max = scaled
            .iter()
            .map(|(_, s)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<(ContentType, f32)> = scaled
            .into_iter()
            .map(|(label, s)| (label, (s - max).exp()))
            .collect();
        let total: f32 = exps.iter().map(|(_, e)| e).sum();

        let mut probabilities: HashMap<ContentType, f32> = ContentType::ALL
            .iter()
            .map(|content_type| (*content_type, 0.0))
            .collect();
        for (label, exp) in exps {
            probabilities.insert(label, exp / total);
        }

        Ok(probabilities)
    }

    /// Number of trained centroids.
    #[must_use]
    pub fn centroid_count(&self) -> usize {
        self.centroids.len()
    }

    /// Writes the artifact atomically.
    pub fn save(&self, path: &Path) -> Result<(), ClassifyError> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            ClassifyError::ArtifactWrite {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClassifyError::ArtifactWrite {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let tmp = tempfile::NamedTempFile::new_in(
            path.parent().unwrap_or_else(|| Path::new(".")),
        )
        .map_err(|e| ClassifyError::ArtifactWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(tmp.path(), &bytes).map_err(|e| ClassifyError::ArtifactWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tmp.persist(path).map_err(|e| ClassifyError::ArtifactWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), centroids = self.centroid_count(), "saved classifier model");
        Ok(())
    }

    /// Loads an artifact written by `save`.
    pub fn load(path: &Path) -> Result<Self, ClassifyError> {
        let bytes = std::fs::read(path).map_err(|e| ClassifyError::ArtifactRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let (model, _): (Self, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).map_err(|e| {
                ClassifyError::ArtifactRead {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;

        if model.version != FORMAT_VERSION {
            return Err(ClassifyError::ArtifactRead {
                path: path.display().to_string(),
                reason: format!(
                    "unsupported artifact version {} (expected {FORMAT_VERSION})",
                    model.version
                ),
            });
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn axis(dim: usize, index: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dim];
        vec[index] = 1.0;
        vec
    }

    fn trained_model() -> CentroidModel {
        let samples = vec![
            (ContentType::Academic, axis(8, 0)),
            (ContentType::Academic, axis(8, 0)),
            (ContentType::News, axis(8, 1)),
            (ContentType::Technical, axis(8, 2)),
        ];
        CentroidModel::fit(&samples, "mock", 8).unwrap()
    }

    #[test]
    fn test_fit_requires_samples() {
        assert!(CentroidModel::fit(&[], "mock", 8).is_none());
    }

    #[test]
    fn test_predict_favors_matching_centroid() {
        let model = trained_model();
        let probabilities = model.predict(&axis(8, 0), 0.1).unwrap();

        let academic = probabilities[&ContentType::Academic];
        for (content_type, probability) in &probabilities {
            if *content_type != ContentType::Academic {
                assert!(academic > *probability);
            }
        }
        // Untrained categories carry zero probability.
        assert_eq!(probabilities[&ContentType::Business], 0.0);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let model = trained_model();
        let probabilities = model.predict(&axis(8, 1), 0.1).unwrap();
        let total: f32 = probabilities.values().sum();
        assert!((total - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let model = trained_model();
        let result = model.predict(&axis(16, 0), 0.1);
        assert!(matches!(
            result,
            Err(ClassifyError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classifier").join("model.bin");

        let model = trained_model();
        model.save(&path).unwrap();

        let loaded = CentroidModel::load(&path).unwrap();
        assert_eq!(loaded.centroid_count(), model.centroid_count());
        assert_eq!(loaded.embedding_model_id, "mock");
        assert_eq!(loaded.trained_examples, 4);

        let probabilities = loaded.predict(&axis(8, 2), 0.1).unwrap();
        let top = probabilities
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(*top.0, ContentType::Technical);
    }

    #[test]
    fn test_load_missing_artifact_fails() {
        let dir = TempDir::new().unwrap();
        assert!(CentroidModel::load(&dir.path().join("absent.bin")).is_err());
    }
}
