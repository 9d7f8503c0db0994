//! The query-understanding pipeline facade.
//!
//! Wires the embedding service, classifier, partitioner, and rewriter
//! together behind the narrow surface the server layer consumes:
//! `classify`, `partition`, `rewrite`, `embed`, `similarity`, and the
//! composite `process`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::classify::{
    ClassificationMethod, ClassificationResult, ContentClassifier, ContentType,
};
use crate::config::Settings;
use crate::embedding::{EmbeddingService, EmbeddingServiceStats};
use crate::error::PipelineResult;
use crate::partition::{PartitionResult, QueryPartitioner};
use crate::rewrite::{QueryRewriter, RewriteResult};

/// An incoming query: raw text plus an optional caller-supplied
/// content-type override.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub content_type: Option<ContentType>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content_type: None,
        }
    }

    /// Trust the caller's content type and skip classification.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

/// Composite pipeline output for one query.
#[derive(Debug, Clone)]
pub struct QueryUnderstanding {
    pub classification: ClassificationResult,
    /// Present only when the query actually split into multiple parts.
    pub partition: Option<PartitionResult>,
    pub rewrites: Vec<RewriteResult>,
}

/// The assembled query-understanding pipeline.
pub struct QueryPipeline {
    embeddings: Arc<EmbeddingService>,
    classifier: Arc<ContentClassifier>,
    partitioner: QueryPartitioner,
    rewriter: QueryRewriter,
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("embeddings", &self.embeddings)
            .finish()
    }
}

impl QueryPipeline {
    /// Assembles the pipeline from settings.
    ///
    /// # Errors
    /// Fails only on invalid configuration (unknown model name, zero
    /// dimension, unusable cache directory). Operational degradation
    /// after construction never raises.
    pub fn new(settings: &Settings) -> PipelineResult<Self> {
        let embeddings = Arc::new(EmbeddingService::new(
            settings.ml_enabled,
            &settings.embedding,
        )?);
        let classifier = Arc::new(ContentClassifier::new(
            Arc::clone(&embeddings),
            settings.ml_enabled,
            &settings.classifier,
        ));
        let partitioner = QueryPartitioner::new(
            Arc::clone(&embeddings),
            Arc::clone(&classifier),
            settings.ml_enabled,
            &settings.partitioner,
        );
        let rewriter = QueryRewriter::new(Arc::clone(&embeddings), &settings.rewriter);

        Ok(Self {
            embeddings,
            classifier,
            partitioner,
            rewriter,
        })
    }

    /// Classifies a text into one of the six content types.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult {
        self.classifier.classify(text)
    }

    /// Partitions a query into ranked sub-queries.
    #[must_use]
    pub fn partition(&self, query: &str) -> PartitionResult {
        self.partitioner.partition(query)
    }

    /// Produces rewrite candidates for a query.
    #[must_use]
    pub fn rewrite(&self, query: &str, content_type: ContentType) -> Vec<RewriteResult> {
        self.rewriter.rewrite(query, content_type)
    }

    /// Embeds a text.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        self.embeddings.embed(text)
    }

    /// Cosine similarity between the embeddings of two texts.
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        self.embeddings.similarity(a, b)
    }

    /// Ranks candidate texts against a reference text.
    #[must_use]
    pub fn similarity_batch(
        &self,
        reference: &str,
        candidates: &[String],
    ) -> Vec<(String, f32)> {
        self.embeddings.similarity_batch(reference, candidates)
    }

    /// Retrains the classifier from labeled texts.
    ///
    /// Returns `false` when the ML backend is unavailable.
    pub fn update_classifier(&self, texts: &[String], labels: &[ContentType]) -> bool {
        self.classifier.update(texts, labels)
    }

    /// Records a rewrite that led to a successful retrieval.
    pub fn record_rewrite_success(
        &self,
        original: &str,
        rewritten: &str,
        content_type: ContentType,
    ) {
        self.rewriter.record_success(original, rewritten, content_type);
    }

    /// Cache statistics from the embedding tiers.
    #[must_use]
    pub fn embedding_stats(&self) -> EmbeddingServiceStats {
        self.embeddings.stats()
    }

    /// The shared embedding service (for maintenance such as disk
    /// cache pruning).
    #[must_use]
    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    /// Runs the whole pipeline for one incoming query.
    ///
    /// A caller-supplied content type is trusted as-is; otherwise the
    /// classifier decides. The partition is included only when the
    /// query actually split; rewrites are keyed off the final content
    /// type.
    #[must_use]
    pub fn process(&self, query: &SearchQuery) -> QueryUnderstanding {
        let classification = match query.content_type {
            Some(content_type) => {
                debug!(content_type = %content_type, "using caller-supplied content type");
                provided_classification(content_type)
            }
            None => self.classifier.classify(&query.text),
        };

        let partition = self.partitioner.partition(&query.text);
        let partition = (partition.parts.len() > 1).then_some(partition);

        let rewrites = self
            .rewriter
            .rewrite(&query.text, classification.content_type);

        QueryUnderstanding {
            classification,
            partition,
            rewrites,
        }
    }
}

/// Classification shell for a caller-supplied content type.
fn provided_classification(content_type: ContentType) -> ClassificationResult {
    let probabilities: HashMap<ContentType, f32> = ContentType::ALL
        .iter()
        .map(|candidate| {
            let probability = if *candidate == content_type { 1.0 } else { 0.0 };
            (*candidate, probability)
        })
        .collect();

    ClassificationResult::new(
        content_type,
        1.0,
        probabilities,
        ClassificationMethod::CallerProvided,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir) -> QueryPipeline {
        let mut settings = Settings::default();
        settings.ml_enabled = false;
        settings.embedding.disk_cache_dir = Some(dir.path().join("cache"));
        QueryPipeline::new(&settings).unwrap()
    }

    #[test]
    fn test_process_with_override_skips_classification() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let query =
            SearchQuery::new("tell me about API documentation").with_content_type(ContentType::Technical);
        let understanding = pipeline.process(&query);

        assert_eq!(
            understanding.classification.content_type,
            ContentType::Technical
        );
        assert_eq!(
            understanding.classification.method,
            ClassificationMethod::CallerProvided
        );
        assert_eq!(understanding.classification.confidence, 1.0);
    }

    #[test]
    fn test_process_classifies_without_override() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let understanding = pipeline.process(&SearchQuery::new("research paper on quantum computing"));
        assert_eq!(
            understanding.classification.content_type,
            ContentType::Academic
        );
        // Single-intent query: no partition in the composite.
        assert!(understanding.partition.is_none());
    }

    #[test]
    fn test_process_includes_partition_for_multi_intent() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let understanding = pipeline.process(&SearchQuery::new(
            "compare electric cars and hybrid cars and also find the best pricing",
        ));
        let partition = understanding.partition.expect("expected a partition");
        assert!(partition.parts.len() >= 2);
    }

    #[test]
    fn test_invalid_model_rejected() {
        let mut settings = Settings::default();
        settings.embedding.model = "NotARealModel".to_string();
        settings.embedding.disk_cache_enabled = false;
        assert!(QueryPipeline::new(&settings).is_err());
    }
}
