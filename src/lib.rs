//! Query understanding for federated search.
//!
//! Turns a raw free-text query into a vector embedding, a content-type
//! classification, an optional decomposition into ranked sub-queries,
//! and rewritten variants — degrading gracefully to deterministic
//! rule-based paths whenever the ML backend is unavailable.

pub mod classify;
pub mod config;
pub mod embedding;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod rewrite;

// Explicit exports for better API clarity
pub use classify::{
    ClassificationMethod, ClassificationResult, ContentClassifier, ContentType,
};
pub use config::Settings;
pub use embedding::{EmbeddingService, cosine_similarity};
pub use error::{ErrorContext, PipelineError, PipelineResult};
pub use partition::{PartitionMethod, PartitionResult, QueryPart, QueryPartitioner};
pub use pipeline::{QueryPipeline, QueryUnderstanding, SearchQuery};
pub use rewrite::{QueryRewriter, RewriteMethod, RewriteResult};
