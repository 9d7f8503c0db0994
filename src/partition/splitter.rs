//! Query splitting: conjunction patterns, sentence boundaries, and the
//! rule-based literal fallback.
//!
//! Each splitter proposes a split only when every resulting part clears
//! a minimum word count; otherwise the caller moves to the next
//! strategy or leaves the query whole.

use regex::Regex;

/// Minimum words per part for conjunction and sentence splits.
pub const MIN_PART_WORDS: usize = 3;

/// Minimum words per part for the rule-based literal split.
pub const MIN_RULE_PART_WORDS: usize = 2;

/// A conjunction split pattern with its confidence.
struct ConjunctionPattern {
    regex: Regex,
    confidence: f32,
}

/// Ordered conjunction splitter; patterns are tried in descending
/// confidence order and the first acceptable split wins.
pub struct QuerySplitter {
    patterns: Vec<ConjunctionPattern>,
    sentence_boundary: Regex,
    rule_boundary: Regex,
}

impl std::fmt::Debug for QuerySplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySplitter")
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

impl Default for QuerySplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySplitter {
    #[must_use]
    pub fn new() -> Self {
        let patterns = [
            (r"(?i)\bnot only\b|\bbut also\b", 0.9),
            (r"(?i)\bfirst\b|\bthen\b", 0.85),
            (r"(?i)\b(?:versus|vs)\b", 0.85),
            (r"(?i);|\band also\b", 0.8),
            (r"(?i)\balternatively\b|\balong with\b", 0.75),
            (r"(?i)\band\b", 0.7),
            (r",", 0.6),
        ]
        .iter()
        .map(|(pattern, confidence)| ConjunctionPattern {
            regex: Regex::new(pattern).expect("invalid built-in conjunction pattern"),
            confidence: *confidence,
        })
        .collect();

        Self {
            patterns,
            sentence_boundary: Regex::new(r"[.!?]+").expect("invalid sentence boundary pattern"),
            rule_boundary: Regex::new(r"(?i)\band\b|;|,").expect("invalid rule boundary pattern"),
        }
    }

    /// Tries conjunction patterns in descending confidence order.
    ///
    /// Returns the parts and the matched pattern's confidence, or
    /// `None` when no pattern yields a split whose every part has at
    /// least [`MIN_PART_WORDS`] words.
    #[must_use]
    pub fn split_by_conjunctions(&self, query: &str) -> Option<(Vec<String>, f32)> {
        for pattern in &self.patterns {
            let parts = clean_parts(pattern.regex.split(query));
            if parts.len() >= 2 && parts.iter().all(|p| word_count(p) >= MIN_PART_WORDS) {
                return Some((parts, pattern.confidence));
            }
        }
        None
    }

    /// Splits on sentence boundaries.
    ///
    /// Accepted only when it yields at least two sentences of at least
    /// [`MIN_PART_WORDS`] words each.
    #[must_use]
    pub fn split_by_sentences(&self, query: &str) -> Option<Vec<String>> {
        let parts = clean_parts(self.sentence_boundary.split(query));
        if parts.len() >= 2 && parts.iter().all(|p| word_count(p) >= MIN_PART_WORDS) {
            Some(parts)
        } else {
            None
        }
    }

    /// Rule-based literal split on "and", semicolons, or commas.
    ///
    /// Accepted only when every part has at least
    /// [`MIN_RULE_PART_WORDS`] words.
    #[must_use]
    pub fn split_rule_based(&self, query: &str) -> Option<Vec<String>> {
        let parts = clean_parts(self.rule_boundary.split(query));
        if parts.len() >= 2 && parts.iter().all(|p| word_count(p) >= MIN_RULE_PART_WORDS) {
            Some(parts)
        } else {
            None
        }
    }
}

fn clean_parts<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
