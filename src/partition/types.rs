//! Partitioning result types.

use serde::{Deserialize, Serialize};

use crate::classify::ContentType;

/// One independently classifiable piece of a query.
///
/// `recommended_providers` starts empty; the provider-selection layer
/// fills it downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPart {
    pub text: String,
    pub content_type: ContentType,
    pub importance: f32,
    pub recommended_providers: Vec<String>,
}

impl QueryPart {
    /// Builds a part with importance clamped to `[0, 1]`.
    #[must_use]
    pub fn new(text: String, content_type: ContentType, importance: f32) -> Self {
        Self {
            text,
            content_type,
            importance: importance.clamp(0.0, 1.0),
            recommended_providers: Vec::new(),
        }
    }
}

/// How a partition decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMethod {
    /// The query stayed whole (too short, single intent, or
    /// unsplittable).
    Single,
    /// Split on a conjunction/contrast pattern.
    Conjunction,
    /// Split on sentence boundaries.
    Sentence,
    /// Rule-based literal splitting (ML unavailable).
    RuleBased,
    /// Rule-based splitting after the ML path degraded mid-flight.
    RuleBasedFallback,
}

impl PartitionMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionMethod::Single => "single",
            PartitionMethod::Conjunction => "conjunction",
            PartitionMethod::Sentence => "sentence",
            PartitionMethod::RuleBased => "rule_based",
            PartitionMethod::RuleBasedFallback => "rule_based_fallback",
        }
    }
}

/// Result of partitioning one query.
///
/// `parts` is never empty: an unpartitioned query yields exactly one
/// part equal to the whole query. Parts are ordered by descending
/// importance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionResult {
    pub original_query: String,
    pub parts: Vec<QueryPart>,
    pub method: PartitionMethod,
    pub confidence: f32,
}
