//! The embedding service: cache tiers, backend, fallback, batch policy.
//!
//! Lookup order for a single text: in-memory cache, disk cache (when
//! enabled), model backend, deterministic fallback. Every successful
//! computation populates both enabled tiers before returning. Encoding
//! never fails to the caller — degradation is visible only through the
//! `tracing` log and the cache statistics.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::embedding::backend::{EmbeddingBackend, FastEmbedBackend, resolve_model};
use crate::embedding::cache::{CacheStats, MemoryCache};
use crate::embedding::disk::DiskCache;
use crate::embedding::fallback::FallbackGenerator;
use crate::embedding::pool;
use crate::embedding::similarity::{cosine_similarity, rank_candidates};
use crate::embedding::types::{CacheKey, EmbeddingError, VectorDimension};

/// Lifecycle of the lazily-constructed model backend.
///
/// Construction is deferred because it may download model files; the
/// state cell makes the one-time transition explicit instead of hiding
/// it behind ambient global state.
enum BackendState {
    /// ML disabled by the process-wide feature flag.
    Disabled,
    /// Not yet attempted; first use will try to construct.
    Uninitialized,
    /// Construction succeeded.
    Ready(Arc<dyn EmbeddingBackend>),
    /// Construction failed; the service is permanently on fallback.
    Failed,
}

/// Combined statistics over both cache tiers.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingServiceStats {
    pub memory: CacheStats,
    pub disk: Option<CacheStats>,
}

/// Embedding service with two cache tiers and graceful degradation.
pub struct EmbeddingService {
    model_id: String,
    models_dir: PathBuf,
    dimension: VectorDimension,
    backend: RwLock<BackendState>,
    fallback: FallbackGenerator,
    memory: MemoryCache,
    disk: Option<DiskCache>,
    small_batch_max: usize,
    parallel_threshold: usize,
    chunk_size: usize,
    workers: usize,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("disk_cache", &self.disk.is_some())
            .finish()
    }
}

impl EmbeddingService {
    /// Builds the service from configuration.
    ///
    /// # Errors
    /// Construction is the only place this subsystem fails loudly: an
    /// unknown model name (with ML enabled), a zero dimension, or an
    /// unusable disk cache directory reject here.
    pub fn new(ml_enabled: bool, config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let dimension = VectorDimension::new(config.dimension)?;

        if ml_enabled {
            // Validate the configured name now; the heavy construction
            // stays deferred until the first embed call.
            resolve_model(&config.model)?;
        }

        let disk = if config.disk_cache_enabled {
            Some(DiskCache::open_or_create(
                config.disk_cache_dir(),
                &config.model,
                dimension,
            )?)
        } else {
            None
        };

        let state = if ml_enabled {
            BackendState::Uninitialized
        } else {
            BackendState::Disabled
        };

        Ok(Self {
            model_id: config.model.clone(),
            models_dir: config.models_dir(),
            dimension,
            backend: RwLock::new(state),
            fallback: FallbackGenerator::new(dimension),
            memory: MemoryCache::new(config.memory_cache_entries),
            disk,
            small_batch_max: config.batch.small_batch_max,
            parallel_threshold: config.batch.parallel_threshold,
            chunk_size: config.batch.chunk_size,
            workers: config.batch.workers.unwrap_or_else(pool::default_worker_count),
        })
    }

    /// The dimension of every vector this service produces.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Embeds a single text. Never fails: the result comes from the
    /// first tier that can produce it.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let key = CacheKey::new(&self.active_model_id(), text);

        if let Some(vector) = self.lookup(&key) {
            return vector;
        }

        match self.resolve_backend() {
            Some(backend) => self.encode_single_degrading(&backend, text),
            None => self.compute_fallback(text),
        }
    }

    /// Embeds a batch, order-preserving and one-to-one with the input.
    ///
    /// Threshold-driven policy: small batches reuse the per-item cached
    /// path; medium batches make one backend call for the uncached
    /// remainder; large batches fan out across the worker pool. Items
    /// resolved from either cache tier are excluded from the computation
    /// and merged back in input order.
    #[must_use]
    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        if texts.len() <= self.small_batch_max {
            return texts.iter().map(|t| self.embed(t)).collect();
        }

        let active_id = self.active_model_id();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut uncached: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = CacheKey::new(&active_id, text);
            match self.lookup(&key) {
                Some(vector) => results[i] = Some(vector),
                None => uncached.push((i, text.clone())),
            }
        }

        if !uncached.is_empty() {
            let pending: Vec<String> = uncached.iter().map(|(_, t)| t.clone()).collect();
            let computed = self.compute_batch(&pending);
            for ((i, _), vector) in uncached.into_iter().zip(computed) {
                results[i] = Some(vector);
            }
        }

        // Every slot was filled by a cache hit or the computation above.
        results
            .into_iter()
            .zip(texts)
            .map(|(slot, text)| slot.unwrap_or_else(|| self.compute_fallback(text)))
            .collect()
    }

    /// Cosine similarity between the embeddings of two texts.
    ///
    /// Cache-resident operands never re-invoke the backend.
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        let vec_a = self.embed(a);
        let vec_b = self.embed(b);
        cosine_similarity(&vec_a, &vec_b)
    }

    /// Scores every candidate against the reference text.
    ///
    /// Returns `(text, score)` pairs sorted by score descending, ties
    /// broken by input order.
    #[must_use]
    pub fn similarity_batch(&self, reference: &str, candidates: &[String]) -> Vec<(String, f32)> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let reference_vec = self.embed(reference);
        let candidate_vecs = self.embed_batch(candidates);

        rank_candidates(&reference_vec, &candidate_vecs)
            .into_iter()
            .map(|(i, score)| (candidates[i].clone(), score))
            .collect()
    }

    /// Hit/miss statistics for both cache tiers.
    #[must_use]
    pub fn stats(&self) -> EmbeddingServiceStats {
        EmbeddingServiceStats {
            memory: self.memory.stats(),
            disk: self.disk.as_ref().map(DiskCache::stats),
        }
    }

    /// Access to the disk tier for maintenance (prune, invalidate).
    #[must_use]
    pub fn disk_cache(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Whether a model backend is currently usable (for callers that
    /// gate ML-only logic, e.g. the partitioner's topic-shift test).
    #[must_use]
    pub fn backend_available(&self) -> bool {
        matches!(
            *self.backend.read(),
            BackendState::Ready(_) | BackendState::Uninitialized
        )
    }

    /// Model id used for cache keys in the current backend state.
    ///
    /// Fallback-produced vectors are keyed separately from model
    /// vectors so a later recovered backend never serves them as real
    /// model output.
    fn active_model_id(&self) -> String {
        match *self.backend.read() {
            BackendState::Disabled | BackendState::Failed => self.fallback_model_id(),
            BackendState::Uninitialized | BackendState::Ready(_) => self.model_id.clone(),
        }
    }

    fn fallback_model_id(&self) -> String {
        format!("fallback-{}", self.dimension.get())
    }

    /// Two-tier cache lookup; a disk hit warms the memory tier.
    fn lookup(&self, key: &CacheKey) -> Option<Vec<f32>> {
        if let Some(vector) = self.memory.get(key) {
            debug!(key = %key.as_string(), "memory cache hit");
            return Some(vector);
        }
        if let Some(disk) = &self.disk {
            if let Some(vector) = disk.get(key) {
                debug!(key = %key.as_string(), "disk cache hit");
                self.memory.insert(key, vector.clone());
                return Some(vector);
            }
        }
        None
    }

    /// Populates both enabled tiers.
    fn store(&self, key: &CacheKey, vector: &[f32]) {
        self.memory.insert(key, vector.to_vec());
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.insert(key, vector) {
                warn!(error = %e, "failed to persist embedding to disk cache");
            }
        }
    }

    /// Resolves the backend, constructing it on first use.
    fn resolve_backend(&self) -> Option<Arc<dyn EmbeddingBackend>> {
        {
            let state = self.backend.read();
            match &*state {
                BackendState::Ready(backend) => return Some(Arc::clone(backend)),
                BackendState::Disabled | BackendState::Failed => return None,
                BackendState::Uninitialized => {}
            }
        }

        let mut state = self.backend.write();
        // Another task may have initialized while we waited.
        match &*state {
            BackendState::Ready(backend) => return Some(Arc::clone(backend)),
            BackendState::Disabled | BackendState::Failed => return None,
            BackendState::Uninitialized => {}
        }

        match FastEmbedBackend::new(&self.model_id, &self.models_dir) {
            Ok(backend) if backend.dimension() == self.dimension => {
                let backend: Arc<dyn EmbeddingBackend> = Arc::new(backend);
                *state = BackendState::Ready(Arc::clone(&backend));
                Some(backend)
            }
            Ok(backend) => {
                warn!(
                    expected = self.dimension.get(),
                    actual = backend.dimension().get(),
                    "backend dimension does not match configuration, using fallback"
                );
                *state = BackendState::Failed;
                None
            }
            Err(e) => {
                warn!(error = %e, "embedding backend unavailable, using deterministic fallback");
                *state = BackendState::Failed;
                None
            }
        }
    }

    /// Computes the uncached remainder of a batch under the size policy.
    fn compute_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let Some(backend) = self.resolve_backend() else {
            let vectors = self.fallback.generate_batch(texts);
            let fallback_id = self.fallback_model_id();
            for (text, vector) in texts.iter().zip(&vectors) {
                self.store(&CacheKey::new(&fallback_id, text), vector);
            }
            return vectors;
        };

        if texts.len() <= self.parallel_threshold {
            return self.encode_batch_degrading(&backend, texts);
        }

        let chunks = pool::make_chunks(texts, self.chunk_size);
        pool::run_chunked(chunks, self.workers, |chunk| {
            self.encode_batch_degrading(&backend, chunk)
        })
    }

    /// One backend call for the whole slice; degrades to per-item
    /// encoding on failure. Successful vectors populate both tiers.
    fn encode_batch_degrading(
        &self,
        backend: &Arc<dyn EmbeddingBackend>,
        texts: &[String],
    ) -> Vec<Vec<f32>> {
        match backend.encode(texts) {
            Ok(vectors) => {
                for (text, vector) in texts.iter().zip(&vectors) {
                    self.store(&CacheKey::new(backend.model_id(), text), vector);
                }
                vectors
            }
            Err(e) => {
                warn!(error = %e, count = texts.len(), "batch encode failed, degrading to per-item");
                texts
                    .iter()
                    .map(|t| self.encode_single_degrading(backend, t))
                    .collect()
            }
        }
    }

    /// Per-item encode; degrades to the deterministic fallback.
    fn encode_single_degrading(&self, backend: &Arc<dyn EmbeddingBackend>, text: &str) -> Vec<f32> {
        let single = [text.to_string()];
        match backend.encode(&single) {
            Ok(mut vectors) if !vectors.is_empty() => {
                let vector = vectors.swap_remove(0);
                self.store(&CacheKey::new(backend.model_id(), text), &vector);
                vector
            }
            Ok(_) => {
                warn!("backend returned no vector, using deterministic fallback");
                self.compute_fallback(text)
            }
            Err(e) => {
                warn!(error = %e, "encode failed, using deterministic fallback");
                self.compute_fallback(text)
            }
        }
    }

    fn compute_fallback(&self, text: &str) -> Vec<f32> {
        let vector = self.fallback.generate(text);
        self.store(&CacheKey::new(&self.fallback_model_id(), text), &vector);
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use tempfile::TempDir;

    fn service_without_ml(dir: &TempDir) -> EmbeddingService {
        let config = EmbeddingConfig {
            disk_cache_dir: Some(dir.path().to_path_buf()),
            ..EmbeddingConfig::default()
        };
        EmbeddingService::new(false, &config).unwrap()
    }

    #[test]
    fn test_embed_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);

        let a = service.embed("quantum computing research");
        let b = service.embed("quantum computing research");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn test_embed_batch_matches_single() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);

        let texts: Vec<String> = (0..10).map(|i| format!("query number {i}")).collect();
        let batch = service.embed_batch(&texts);
        assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&service.embed(text), vector);
        }
    }

    #[test]
    fn test_large_batch_preserves_order() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);

        // Well past the parallel threshold to exercise the worker pool.
        let texts: Vec<String> = (0..100).map(|i| format!("document {i}")).collect();
        let batch = service.embed_batch(&texts);
        assert_eq!(batch.len(), 100);
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&service.embed(text), vector);
        }
    }

    #[test]
    fn test_self_similarity_is_high() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);
        let score = service.similarity("rust programming", "rust programming");
        assert!(score > 0.9);
    }

    #[test]
    fn test_similarity_bounds() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);
        for (a, b) in [
            ("alpha", "beta"),
            ("", "nonempty"),
            ("same", "same"),
            ("one two three", "four five six"),
        ] {
            let score = service.similarity(a, b);
            assert!((-1.0..=1.0).contains(&score), "similarity({a}, {b}) = {score}");
        }
    }

    #[test]
    fn test_similarity_batch_sorted_descending() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);

        let candidates = vec![
            "ai research papers".to_string(),
            "best pizza recipe".to_string(),
        ];
        let ranked = service.similarity_batch("ai research", &candidates);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].1 >= ranked[1].1);
        assert_eq!(ranked[0].0, "ai research papers");
    }

    #[test]
    fn test_memory_cache_hit_on_second_embed() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);

        service.embed("repeated query");
        let before = service.stats().memory;
        service.embed("repeated query");
        let after = service.stats().memory;
        assert_eq!(after.hits, before.hits + 1);
    }

    #[test]
    fn test_disk_cache_transparency() {
        let dir = TempDir::new().unwrap();

        let cold = {
            let service = service_without_ml(&dir);
            service.embed("warm me up")
        };

        // Fresh instance, same disk cache directory: result identical.
        let service = service_without_ml(&dir);
        let warm = service.embed("warm me up");
        assert_eq!(cold, warm);
        let stats = service.stats();
        assert_eq!(stats.disk.unwrap().hits, 1);
    }

    #[test]
    fn test_unknown_model_rejected_at_construction() {
        let config = EmbeddingConfig {
            model: "NotARealModel".to_string(),
            disk_cache_enabled: false,
            ..EmbeddingConfig::default()
        };
        assert!(EmbeddingService::new(true, &config).is_err());
        // Without ML the name is never used, so construction succeeds.
        assert!(EmbeddingService::new(false, &config).is_ok());
    }

    #[test]
    fn test_empty_text_embeds() {
        let dir = TempDir::new().unwrap();
        let service = service_without_ml(&dir);
        let vector = service.embed("");
        assert_eq!(vector.len(), 384);
        assert_eq!(service.embed(""), vector);
    }
}
