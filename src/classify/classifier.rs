//! The content classifier: statistical model blended with the rule
//! scorer.
//!
//! Decision order: no model → rules alone; confident model → take it;
//! hesitant model confirmed by rules → boosted confidence; hesitant
//! model contradicted by rules → the rules win; model blew up → rules
//! win, tagged as the error path. `classify` never fails.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::model::CentroidModel;
use crate::classify::rules::RuleBasedScorer;
use crate::classify::types::{
    ClassificationMethod, ClassificationResult, ClassifyError, ContentType,
};
use crate::config::ClassifierConfig;
use crate::embedding::EmbeddingService;

/// Probability assigned to the dominant category in rule-based results.
const RULE_DOMINANT_PROBABILITY: f32 = 0.85;
/// Probability floor for the remaining categories (5 × 0.03 + 0.85 = 1).
const RULE_FLOOR_PROBABILITY: f32 = 0.03;

/// Lifecycle of the lazily-loaded model artifact.
enum ModelState {
    /// Not yet looked for on disk.
    Unloaded,
    /// Looked, not found (or unreadable). Rules-only until `update`.
    Missing,
    /// Loaded or freshly fitted.
    Ready(Arc<CentroidModel>),
}

/// Content classifier with constructor-injected dependencies.
pub struct ContentClassifier {
    embeddings: Arc<EmbeddingService>,
    rules: RuleBasedScorer,
    model_state: RwLock<ModelState>,
    model_path: Option<PathBuf>,
    ml_enabled: bool,
    confidence_threshold: f32,
    agreement_bonus: f32,
    rule_confidence: f32,
    multi_label: bool,
    softmax_temperature: f32,
}

impl std::fmt::Debug for ContentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentClassifier")
            .field("ml_enabled", &self.ml_enabled)
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl ContentClassifier {
    /// Builds the classifier.
    #[must_use]
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        ml_enabled: bool,
        config: &ClassifierConfig,
    ) -> Self {
        Self {
            embeddings,
            rules: RuleBasedScorer::new(),
            model_state: RwLock::new(ModelState::Unloaded),
            model_path: config.model_path.clone(),
            ml_enabled,
            confidence_threshold: config.confidence_threshold,
            agreement_bonus: config.agreement_bonus,
            rule_confidence: config.rule_confidence,
            multi_label: config.multi_label,
            softmax_temperature: config.softmax_temperature,
        }
    }

    /// Classifies `text` into one of the six content types.
    ///
    /// Always returns a result; degraded paths are visible only through
    /// the `method` tag.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let Some(model) = self.resolve_model() else {
            return self.rule_based_result(text, ClassificationMethod::RuleBased);
        };

        match self.classify_statistical(text, &model) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "statistical classification failed, falling back to rules");
                self.rule_based_result(text, ClassificationMethod::ErrorFallback)
            }
        }
    }

    /// Refits the statistical model in place from labeled texts.
    ///
    /// Returns `false` when the ML backend is unavailable or the inputs
    /// are unusable; the previous model (if any) stays in effect then.
    pub fn update(&self, texts: &[String], labels: &[ContentType]) -> bool {
        if !self.ml_enabled {
            debug!("update skipped: ML disabled");
            return false;
        }
        if texts.is_empty() || texts.len() != labels.len() {
            warn!(
                texts = texts.len(),
                labels = labels.len(),
                "update skipped: texts and labels must be non-empty and equal length"
            );
            return false;
        }

        let embeddings = self.embeddings.embed_batch(texts);
        // embed_batch resolves the lazy backend; if that failed, the
        // vectors above are fallback output and not worth fitting on.
        if !self.embeddings.backend_available() {
            warn!("update skipped: embedding backend unavailable");
            return false;
        }

        let samples: Vec<(ContentType, Vec<f32>)> = labels
            .iter()
            .copied()
            .zip(embeddings)
            .map(|(label, embedding)| (label, embedding))
            .collect();

        let dimension = self.embeddings.dimension().get();
        let Some(model) = CentroidModel::fit(&samples, "service", dimension) else {
            warn!("update skipped: no usable samples");
            return false;
        };

        if let Some(path) = &self.model_path {
            if let Err(e) = model.save(path) {
                warn!(error = %e, "failed to persist classifier model");
            }
        }

        info!(
            examples = model.trained_examples,
            centroids = model.centroid_count(),
            "classifier model refitted"
        );
        *self.model_state.write() = ModelState::Ready(Arc::new(model));
        true
    }

    fn classify_statistical(
        &self,
        text: &str,
        model: &CentroidModel,
    ) -> Result<ClassificationResult, ClassifyError> {
        let embedding = self.embeddings.embed(text);
        let probabilities = model.predict(&embedding, self.softmax_temperature)?;

        let (top, confidence) = probabilities
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(content_type, probability)| (*content_type, *probability))
            .ok_or(ClassifyError::EmptyModel)?;

        if confidence >= self.confidence_threshold {
            return Ok(self.maybe_multi_label(
                text,
                ClassificationResult::new(
                    top,
                    confidence,
                    probabilities,
                    ClassificationMethod::Statistical,
                ),
            ));
        }

        // Hesitant model: let the rules confirm or override.
        let evaluation = self.rules.evaluate(text);
        if evaluation.top == top {
            debug!(content_type = %top, "rule scorer confirmed statistical prediction");
            return Ok(self.maybe_multi_label(
                text,
                ClassificationResult::new(
                    top,
                    confidence + self.agreement_bonus,
                    probabilities,
                    ClassificationMethod::StatisticalConfirmed,
                ),
            ));
        }

        debug!(
            statistical = %top,
            rule_based = %evaluation.top,
            "rule scorer overrode low-confidence statistical prediction"
        );
        Ok(self.rule_based_result(text, ClassificationMethod::RuleBasedFallback))
    }

    /// Builds a result from the rule scorer alone.
    ///
    /// Rule-based results assert strong, not probabilistic, confidence:
    /// a fixed high confidence and a skewed probability map.
    fn rule_based_result(
        &self,
        text: &str,
        method: ClassificationMethod,
    ) -> ClassificationResult {
        let evaluation = self.rules.evaluate(text);

        let probabilities: HashMap<ContentType, f32> = ContentType::ALL
            .iter()
            .map(|content_type| {
                let probability = if *content_type == evaluation.top {
                    RULE_DOMINANT_PROBABILITY
                } else {
                    RULE_FLOOR_PROBABILITY
                };
                (*content_type, probability)
            })
            .collect();

        let result = ClassificationResult::new(
            evaluation.top,
            self.rule_confidence,
            probabilities,
            method,
        );
        if self.multi_label {
            result.with_significant_types(evaluation.significant)
        } else {
            result
        }
    }

    fn maybe_multi_label(&self, text: &str, result: ClassificationResult) -> ClassificationResult {
        if self.multi_label {
            let evaluation = self.rules.evaluate(text);
            result.with_significant_types(evaluation.significant)
        } else {
            result
        }
    }

    /// Installs a prefitted model, bypassing the artifact load.
    #[cfg(test)]
    pub(crate) fn set_model_for_tests(&self, model: CentroidModel) {
        *self.model_state.write() = ModelState::Ready(Arc::new(model));
    }

    /// Resolves the model, loading the artifact on first use.
    fn resolve_model(&self) -> Option<Arc<CentroidModel>> {
        if !self.ml_enabled {
            return None;
        }

        {
            let state = self.model_state.read();
            match &*state {
                ModelState::Ready(model) => return Some(Arc::clone(model)),
                ModelState::Missing => return None,
                ModelState::Unloaded => {}
            }
        }

        let mut state = self.model_state.write();
        // Another task may have loaded while we waited.
        match &*state {
            ModelState::Ready(model) => return Some(Arc::clone(model)),
            ModelState::Missing => return None,
            ModelState::Unloaded => {}
        }

        let loaded = self
            .model_path
            .as_ref()
            .filter(|path| path.exists())
            .and_then(|path| match CentroidModel::load(path) {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!(error = %e, "failed to load classifier model artifact");
                    None
                }
            });

        match loaded {
            Some(model) => {
                info!(centroids = model.centroid_count(), "classifier model loaded");
                let model = Arc::new(model);
                *state = ModelState::Ready(Arc::clone(&model));
                Some(model)
            }
            None => {
                *state = ModelState::Missing;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use tempfile::TempDir;

    fn rules_only_classifier(dir: &TempDir) -> ContentClassifier {
        let embedding_config = EmbeddingConfig {
            disk_cache_dir: Some(dir.path().join("cache")),
            ..EmbeddingConfig::default()
        };
        let service = Arc::new(EmbeddingService::new(false, &embedding_config).unwrap());
        ContentClassifier::new(service, false, &ClassifierConfig::default())
    }

    #[test]
    fn test_rules_only_method_tag() {
        let dir = TempDir::new().unwrap();
        let classifier = rules_only_classifier(&dir);
        let result = classifier.classify("research paper on quantum computing");
        assert_eq!(result.content_type, ContentType::Academic);
        assert_eq!(result.method, ClassificationMethod::RuleBased);
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let dir = TempDir::new().unwrap();
        let classifier = rules_only_classifier(&dir);
        let result = classifier.classify("latest news about tech industry");
        let total: f32 = result.probabilities.values().sum();
        assert!((total - 1.0).abs() < 0.001);
        assert_eq!(result.probabilities.len(), 6);
    }

    #[test]
    fn test_empty_text_still_classifies() {
        let dir = TempDir::new().unwrap();
        let classifier = rules_only_classifier(&dir);
        let result = classifier.classify("");
        assert_eq!(result.content_type, ContentType::General);
    }

    #[test]
    fn test_update_returns_false_without_ml() {
        let dir = TempDir::new().unwrap();
        let classifier = rules_only_classifier(&dir);
        let updated = classifier.update(
            &["research paper".to_string()],
            &[ContentType::Academic],
        );
        assert!(!updated);
    }

    #[test]
    fn test_update_rejects_mismatched_inputs() {
        let dir = TempDir::new().unwrap();
        let embedding_config = EmbeddingConfig {
            disk_cache_enabled: false,
            ..EmbeddingConfig::default()
        };
        let service = Arc::new(EmbeddingService::new(false, &embedding_config).unwrap());
        let classifier = ContentClassifier::new(service, true, &ClassifierConfig::default());
        assert!(!classifier.update(&["text".to_string()], &[]));
        assert!(!classifier.update(&[], &[]));
    }

    /// Classifier whose statistical path runs over deterministic
    /// fallback embeddings, with an injected model.
    fn statistical_classifier(
        dir: &TempDir,
        temperature: f32,
        training: &[(&str, ContentType)],
    ) -> ContentClassifier {
        let embedding_config = EmbeddingConfig {
            disk_cache_dir: Some(dir.path().join("cache")),
            ..EmbeddingConfig::default()
        };
        let service = Arc::new(EmbeddingService::new(false, &embedding_config).unwrap());

        let samples: Vec<(ContentType, Vec<f32>)> = training
            .iter()
            .map(|(text, label)| (*label, service.embed(text)))
            .collect();
        let model = crate::classify::model::CentroidModel::fit(&samples, "fallback", 384).unwrap();

        let config = ClassifierConfig {
            softmax_temperature: temperature,
            ..ClassifierConfig::default()
        };
        let classifier = ContentClassifier::new(service, true, &config);
        classifier.set_model_for_tests(model);
        classifier
    }

    #[test]
    fn test_confident_statistical_prediction() {
        let dir = TempDir::new().unwrap();
        let classifier = statistical_classifier(
            &dir,
            0.1,
            &[
                ("quantum entanglement experiments", ContentType::Academic),
                ("stock market earnings season", ContentType::Business),
            ],
        );

        // Classifying a training text lands on its own centroid.
        let result = classifier.classify("quantum entanglement experiments");
        assert_eq!(result.content_type, ContentType::Academic);
        assert_eq!(result.method, ClassificationMethod::Statistical);
        assert!(result.confidence >= 0.6);
    }

    #[test]
    fn test_hesitant_prediction_confirmed_by_rules() {
        let dir = TempDir::new().unwrap();
        // High temperature flattens the softmax below the threshold.
        let classifier = statistical_classifier(
            &dir,
            10.0,
            &[
                ("research paper on quantum computing", ContentType::Academic),
                ("stock market earnings season", ContentType::Business),
            ],
        );

        let result = classifier.classify("research paper on quantum computing");
        assert_eq!(result.content_type, ContentType::Academic);
        assert_eq!(result.method, ClassificationMethod::StatisticalConfirmed);
        // Boosted above the raw statistical confidence.
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_hesitant_prediction_overridden_by_rules() {
        let dir = TempDir::new().unwrap();
        // The News centroid shares tokens with the query, so the
        // hesitant model picks News while the rules see academic
        // vocabulary.
        let classifier = statistical_classifier(
            &dir,
            10.0,
            &[
                ("breaking research paper news", ContentType::News),
                ("unrelated corporate finance words", ContentType::Business),
            ],
        );

        let result = classifier.classify("research paper on quantum computing");
        assert_eq!(result.content_type, ContentType::Academic);
        assert_eq!(result.method, ClassificationMethod::RuleBasedFallback);
    }

    #[test]
    fn test_model_failure_falls_back_to_rules() {
        let dir = TempDir::new().unwrap();
        let embedding_config = EmbeddingConfig {
            disk_cache_dir: Some(dir.path().join("cache")),
            ..EmbeddingConfig::default()
        };
        let service = Arc::new(EmbeddingService::new(false, &embedding_config).unwrap());

        // Model trained at a different dimension: predict always errs.
        let samples = vec![(ContentType::News, vec![1.0, 0.0])];
        let model = crate::classify::model::CentroidModel::fit(&samples, "tiny", 2).unwrap();

        let classifier =
            ContentClassifier::new(service, true, &ClassifierConfig::default());
        classifier.set_model_for_tests(model);

        let result = classifier.classify("research paper on quantum computing");
        assert_eq!(result.content_type, ContentType::Academic);
        assert_eq!(result.method, ClassificationMethod::ErrorFallback);
    }

    #[test]
    fn test_multi_label_lists_significant_types() {
        let dir = TempDir::new().unwrap();
        let embedding_config = EmbeddingConfig {
            disk_cache_dir: Some(dir.path().join("cache")),
            ..EmbeddingConfig::default()
        };
        let service = Arc::new(EmbeddingService::new(false, &embedding_config).unwrap());
        let config = ClassifierConfig {
            multi_label: true,
            ..ClassifierConfig::default()
        };
        let classifier = ContentClassifier::new(service, false, &config);

        let result =
            classifier.classify("research paper about market share and industry revenue");
        assert!(result.significant_types.len() > 1);
        assert_eq!(result.significant_types[0], result.content_type);
    }
}
