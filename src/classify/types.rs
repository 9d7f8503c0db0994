//! Classification types: the closed content-type taxonomy and result
//! structures.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The closed content-type taxonomy.
///
/// Every classification resolves to exactly one of these six
/// categories; downstream provider selection keys off them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Academic,
    News,
    Technical,
    Business,
    WebContent,
    General,
}

impl ContentType {
    /// All categories, in stable order.
    pub const ALL: [ContentType; 6] = [
        ContentType::Academic,
        ContentType::News,
        ContentType::Technical,
        ContentType::Business,
        ContentType::WebContent,
        ContentType::General,
    ];

    /// Stable snake_case name, matching the serde representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Academic => "academic",
            ContentType::News => "news",
            ContentType::Technical => "technical",
            ContentType::Business => "business",
            ContentType::WebContent => "web_content",
            ContentType::General => "general",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error for parsing an unknown content-type name.
#[derive(Error, Debug)]
#[error("Unknown content type '{0}'\nSuggestion: Use one of: academic, news, technical, business, web_content, general")]
pub struct UnknownContentType(pub String);

impl std::str::FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(ContentType::Academic),
            "news" => Ok(ContentType::News),
            "technical" => Ok(ContentType::Technical),
            "business" => Ok(ContentType::Business),
            "web_content" => Ok(ContentType::WebContent),
            "general" => Ok(ContentType::General),
            other => Err(UnknownContentType(other.to_string())),
        }
    }
}

/// Which decision path produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// Statistical model, confidence at or above the threshold.
    Statistical,
    /// Statistical model below threshold, confirmed by the rule scorer.
    StatisticalConfirmed,
    /// Rule scorer alone (no statistical model available).
    RuleBased,
    /// Rule scorer overrode a low-confidence statistical prediction.
    RuleBasedFallback,
    /// Statistical inference failed; rule scorer took over.
    ErrorFallback,
    /// Caller supplied the content type; classification was skipped.
    CallerProvided,
}

impl ClassificationMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::Statistical => "statistical",
            ClassificationMethod::StatisticalConfirmed => "statistical_confirmed",
            ClassificationMethod::RuleBased => "rule_based",
            ClassificationMethod::RuleBasedFallback => "rule_based_fallback",
            ClassificationMethod::ErrorFallback => "error_fallback",
            ClassificationMethod::CallerProvided => "caller_provided",
        }
    }
}

/// Outcome of classifying one text.
///
/// Transient, owned by the caller, never mutated after construction.
/// Degraded paths still populate realistic confidence and probability
/// fields; `method` is the only place degradation is visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub content_type: ContentType,
    pub confidence: f32,
    pub probabilities: HashMap<ContentType, f32>,
    pub method: ClassificationMethod,
    /// Every category above the significance threshold, highest first.
    /// Populated only when multi-label output is enabled.
    pub significant_types: Vec<ContentType>,
}

impl ClassificationResult {
    /// Builds a result with confidence clamped to `[0, 1]`.
    #[must_use]
    pub fn new(
        content_type: ContentType,
        confidence: f32,
        probabilities: HashMap<ContentType, f32>,
        method: ClassificationMethod,
    ) -> Self {
        Self {
            content_type,
            confidence: confidence.clamp(0.0, 1.0),
            probabilities,
            method,
            significant_types: Vec::new(),
        }
    }

    /// Attaches the significant-category listing (multi-label mode).
    #[must_use]
    pub fn with_significant_types(mut self, types: Vec<ContentType>) -> Self {
        self.significant_types = types;
        self
    }
}

/// Errors internal to the classifier; they never escape `classify`.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(
        "Model dimension mismatch: centroids are {model}, embedding is {embedding}\nSuggestion: Retrain the model with the current embedding backend"
    )]
    DimensionMismatch { model: usize, embedding: usize },

    #[error("Model has no trained centroids")]
    EmptyModel,

    #[error("Failed to read model artifact '{path}': {reason}")]
    ArtifactRead { path: String, reason: String },

    #[error("Failed to write model artifact '{path}': {reason}")]
    ArtifactWrite { path: String, reason: String },
}
