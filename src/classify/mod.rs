//! Content classification for search queries.
//!
//! Maps text to one of six content categories with a confidence score,
//! blending a centroid model over embeddings with a rule-based
//! keyword/regex scorer used both as a fallback and as a confidence
//! booster.

mod classifier;
mod model;
mod rules;
mod types;

// Re-export core types for public API
pub use classifier::ContentClassifier;
pub use model::CentroidModel;
pub use rules::{RuleBasedScorer, RuleEvaluation, SIGNIFICANCE_THRESHOLD};
pub use types::{
    ClassificationMethod, ClassificationResult, ClassifyError, ContentType, UnknownContentType,
};
