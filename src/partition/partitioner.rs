//! Query partitioning orchestration.
//!
//! Decides whether a query carries multiple intents, splits it when it
//! does, classifies each part independently, and ranks parts by an
//! importance score. Dependencies (classifier, embedding service) are
//! constructor-injected.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::classify::{ContentClassifier, ContentType, RuleBasedScorer};
use crate::config::PartitionerConfig;
use crate::embedding::EmbeddingService;
use crate::partition::detect::IntentDetector;
use crate::partition::splitter::QuerySplitter;
use crate::partition::types::{PartitionMethod, PartitionResult, QueryPart};

/// Fixed confidence for the rule-based path when ML is disabled.
const RULE_CONFIDENCE: f32 = 0.7;
/// Reduced confidence when the ML path degraded mid-flight.
const RULE_FALLBACK_CONFIDENCE: f32 = 0.6;
/// Confidence when detection flagged multiple intents but no split
/// strategy could realize them.
const UNSPLIT_MULTI_CONFIDENCE: f32 = 0.5;

/// Splits multi-intent queries into ranked, classified parts.
pub struct QueryPartitioner {
    embeddings: Arc<EmbeddingService>,
    classifier: Arc<ContentClassifier>,
    detector: IntentDetector,
    splitter: QuerySplitter,
    rules: RuleBasedScorer,
    min_words: usize,
    ml_enabled: bool,
}

impl std::fmt::Debug for QueryPartitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPartitioner")
            .field("min_words", &self.min_words)
            .field("ml_enabled", &self.ml_enabled)
            .finish()
    }
}

impl QueryPartitioner {
    /// Builds the partitioner with injected dependencies.
    #[must_use]
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        classifier: Arc<ContentClassifier>,
        ml_enabled: bool,
        config: &PartitionerConfig,
    ) -> Self {
        let detector = IntentDetector::new(
            Arc::clone(&embeddings),
            config.long_query_words,
            config.window_words,
            config.topic_shift_threshold,
        );
        Self {
            embeddings,
            classifier,
            detector,
            splitter: QuerySplitter::new(),
            rules: RuleBasedScorer::new(),
            min_words: config.min_words,
            ml_enabled,
        }
    }

    /// Partitions a query.
    ///
    /// Never fails and never returns an empty part list: an
    /// unpartitioned query yields one part equal to the whole query.
    #[must_use]
    pub fn partition(&self, query: &str) -> PartitionResult {
        let word_count = query.split_whitespace().count();
        if word_count < self.min_words {
            return self.single_part(query, 1.0);
        }

        if !self.ml_enabled || !self.embeddings.backend_available() {
            return self.rule_based_partition(query, PartitionMethod::RuleBased, RULE_CONFIDENCE);
        }

        let multi_intent = self.detector.is_multi_intent(query);

        // The topic-shift test may have been the first embedding call
        // of the process; if backend construction failed under it, the
        // ML decision above ran on degraded vectors. Treat that like a
        // backend exception: full rule-based fallback, reduced
        // confidence.
        if !self.embeddings.backend_available() {
            warn!("embedding backend degraded during partition detection");
            return self.rule_based_partition(
                query,
                PartitionMethod::RuleBasedFallback,
                RULE_FALLBACK_CONFIDENCE,
            );
        }

        if !multi_intent {
            return self.single_part(query, 1.0);
        }

        if let Some((parts, confidence)) = self.splitter.split_by_conjunctions(query) {
            debug!(parts = parts.len(), "conjunction split accepted");
            return self.build_result(query, parts, PartitionMethod::Conjunction, confidence);
        }

        if let Some(parts) = self.splitter.split_by_sentences(query) {
            debug!(parts = parts.len(), "sentence split accepted");
            return self.build_result(query, parts, PartitionMethod::Sentence, RULE_CONFIDENCE);
        }

        // Multi-intent but unsplittable: stays whole, low confidence.
        self.single_part(query, UNSPLIT_MULTI_CONFIDENCE)
    }

    /// Classifies split parts and ranks them by importance.
    fn build_result(
        &self,
        query: &str,
        parts: Vec<String>,
        method: PartitionMethod,
        confidence: f32,
    ) -> PartitionResult {
        let count = parts.len();
        let mut query_parts: Vec<QueryPart> = parts
            .into_iter()
            .enumerate()
            .map(|(position, text)| {
                let classification = self.classifier.classify(&text);
                let importance =
                    importance_score(position, count, &text, classification.content_type);
                QueryPart::new(text, classification.content_type, importance)
            })
            .collect();

        sort_by_importance(&mut query_parts);

        PartitionResult {
            original_query: query.to_string(),
            parts: query_parts,
            method,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Rule-based splitting: literal boundaries, positional decay,
    /// parts classified through the rule scorer directly (no embedding
    /// dependency).
    fn rule_based_partition(
        &self,
        query: &str,
        method: PartitionMethod,
        confidence: f32,
    ) -> PartitionResult {
        let Some(parts) = self.splitter.split_rule_based(query) else {
            let evaluation = self.rules.evaluate(query);
            return PartitionResult {
                original_query: query.to_string(),
                parts: vec![QueryPart::new(query.to_string(), evaluation.top, 1.0)],
                method: PartitionMethod::Single,
                confidence,
            };
        };

        let mut query_parts: Vec<QueryPart> = parts
            .into_iter()
            .enumerate()
            .map(|(position, text)| {
                let evaluation = self.rules.evaluate(&text);
                // Linear decay per position, floored.
                let importance = (1.0 - 0.2 * position as f32).max(0.5);
                QueryPart::new(text, evaluation.top, importance)
            })
            .collect();

        sort_by_importance(&mut query_parts);

        PartitionResult {
            original_query: query.to_string(),
            parts: query_parts,
            method,
            confidence,
        }
    }

    /// The whole query as a single part with importance 1.0.
    fn single_part(&self, query: &str, confidence: f32) -> PartitionResult {
        let classification = self.classifier.classify(query);
        PartitionResult {
            original_query: query.to_string(),
            parts: vec![QueryPart::new(
                query.to_string(),
                classification.content_type,
                1.0,
            )],
            method: PartitionMethod::Single,
            confidence,
        }
    }
}

/// Importance = position factor × length factor × type factor, capped
/// at 1.0.
fn importance_score(
    position: usize,
    count: usize,
    text: &str,
    content_type: ContentType,
) -> f32 {
    // Decays linearly from 1.0 for the first part to 0.7 for the last.
    let position_factor = if count <= 1 {
        1.0
    } else {
        1.0 - 0.3 * (position as f32 / (count - 1) as f32)
    };

    // Scales from 0.5 toward 1.0 with part length, capped.
    let words = text.split_whitespace().count();
    let length_factor = (0.5 + 0.05 * words as f32).min(1.0);

    let type_factor = match content_type {
        ContentType::Academic | ContentType::Technical => 1.2,
        ContentType::News | ContentType::Business => 1.1,
        _ => 1.0,
    };

    (position_factor * length_factor * type_factor).min(1.0)
}

/// Stable descending sort: equal importance keeps original order.
fn sort_by_importance(parts: &mut [QueryPart]) {
    parts.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
