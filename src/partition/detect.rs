//! Multi-intent detection.
//!
//! Cheap signals first (conjunction markers, question marks, question
//! words); the embedding-based sliding-window topic-shift test runs
//! last and only for long queries, since it costs one embedding per
//! window.

use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::{EmbeddingService, cosine_similarity};

/// Question words counted for the distinct-question-word signal.
const QUESTION_WORDS: [&str; 7] = ["what", "how", "why", "when", "where", "which", "who"];

/// Detects whether a query carries more than one distinct intent.
pub struct IntentDetector {
    embeddings: Arc<EmbeddingService>,
    marker_patterns: Vec<Regex>,
    long_query_words: usize,
    window_words: usize,
    topic_shift_threshold: f32,
}

impl std::fmt::Debug for IntentDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentDetector")
            .field("long_query_words", &self.long_query_words)
            .field("window_words", &self.window_words)
            .field("topic_shift_threshold", &self.topic_shift_threshold)
            .finish()
    }
}

impl IntentDetector {
    #[must_use]
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        long_query_words: usize,
        window_words: usize,
        topic_shift_threshold: f32,
    ) -> Self {
        Self {
            embeddings,
            marker_patterns: build_marker_patterns(),
            long_query_words,
            window_words: window_words.max(2),
            topic_shift_threshold,
        }
    }

    /// Runs the detection signals in order; any positive signal decides.
    #[must_use]
    pub fn is_multi_intent(&self, query: &str) -> bool {
        let lower = query.to_lowercase();

        if self.marker_patterns.iter().any(|p| p.is_match(&lower)) {
            debug!("multi-intent: conjunction marker matched");
            return true;
        }

        if query.matches('?').count() > 1 {
            debug!("multi-intent: multiple question marks");
            return true;
        }

        if self.distinct_question_words(&lower) > 1 {
            debug!("multi-intent: multiple distinct question words");
            return true;
        }

        if self.has_topic_shift(&lower) {
            debug!("multi-intent: topic shift between windows");
            return true;
        }

        false
    }

    fn distinct_question_words(&self, lower: &str) -> usize {
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect();
        QUESTION_WORDS
            .iter()
            .filter(|word| tokens.contains(*word))
            .count()
    }

    /// Sliding-window topic-shift test for long queries.
    ///
    /// The query is cut into fixed-size word windows at 50% overlap;
    /// a pair of adjacent windows below the similarity threshold flags
    /// a shift.
    fn has_topic_shift(&self, lower: &str) -> bool {
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.len() <= self.long_query_words {
            return false;
        }

        let step = (self.window_words / 2).max(1);
        let mut windows: Vec<String> = Vec::new();
        let mut start = 0;
        while start + self.window_words <= words.len() {
            windows.push(words[start..start + self.window_words].join(" "));
            start += step;
        }
        if windows.len() < 2 {
            return false;
        }

        let vectors = self.embeddings.embed_batch(&windows);
        for pair in vectors.windows(2) {
            let similarity = cosine_similarity(&pair[0], &pair[1]);
            if similarity < self.topic_shift_threshold {
                return true;
            }
        }
        false
    }
}

fn build_marker_patterns() -> Vec<Regex> {
    // Markers that reliably join two separable requests. A bare "and"
    // is not here — it splits noun phrases too often; the splitter
    // handles it with its own acceptance rules.
    [
        r"\bnot only\b.*\bbut also\b",
        r"\bfirst\b.*\bthen\b",
        r"\b(?:versus|vs)\b",
        r"\band also\b",
        r"\balternatively\b",
        r"\balong with\b",
        r"[;]",
        r",\s+(?:and\s+)?(?:also\s+)?\w",
        r"\band\s+(?:also\s+)?(?:find|compare|show|tell|explain|list|get)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("invalid built-in marker pattern"))
    .collect()
}
