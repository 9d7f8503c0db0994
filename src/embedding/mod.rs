//! Embedding generation, caching, and similarity.
//!
//! Produces a fixed-length vector for any text through a tiered chain:
//! bounded in-memory cache, optional on-disk cache, model backend,
//! deterministic fallback. Downstream subsystems (classifier,
//! partitioner, rewriter) all consume embeddings through this module.
//!
//! # Architecture
//! The service owns both cache tiers and the lazily-initialized backend.
//! Large batches fan out across a bounded worker pool with an ordered
//! merge; similarity scoring over big candidate sets parallelizes via
//! rayon. Degradation never surfaces as an error — only in logs and
//! cache statistics.

mod backend;
mod cache;
mod disk;
mod fallback;
mod pool;
mod service;
mod similarity;
mod types;

// Re-export core types for public API
#[cfg(test)]
pub use backend::MockBackend;
pub use backend::{EmbeddingBackend, FastEmbedBackend, resolve_model};
pub use cache::{CacheStats, MemoryCache};
pub use disk::DiskCache;
pub use fallback::FallbackGenerator;
pub use pool::{ChunkJob, default_worker_count, make_chunks, run_chunked};
pub use service::{EmbeddingService, EmbeddingServiceStats};
pub use similarity::{cosine_similarity, rank_candidates};
pub use types::{
    CacheKey, EmbeddingError, VECTOR_DIMENSION_384, VectorDimension, normalize_text,
};
