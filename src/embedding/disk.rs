//! On-disk embedding cache tier.
//!
//! Second tier of the lookup chain: unbounded, survives restarts, pruned
//! only on request. Each entry is a bincode blob in its own file named by
//! a prefix of the content hash; a `metadata.json` document records the
//! model and dimension the cache was written with so a model change
//! invalidates stale vectors instead of serving them.
//!
//! Every read validates the decoded entry against the requested key.
//! Malformed or mismatched entries are treated as cache misses, never as
//! errors.

use bincode::{Decode, Encode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::embedding::cache::CacheStats;
use crate::embedding::types::{CacheKey, EmbeddingError, VectorDimension};

/// Current on-disk entry format version.
const FORMAT_VERSION: u32 = 1;

/// File extension for cache entries.
const ENTRY_EXT: &str = "emb";

/// Describes what the cache directory was written with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct DiskCacheMetadata {
    model_id: String,
    dimension: usize,
    version: u32,
}

/// A single persisted embedding.
#[derive(Debug, Encode, Decode)]
struct DiskEntry {
    model_id: String,
    text_hash: String,
    dimension: u32,
    vector: Vec<f32>,
    created_at: u64,
}

/// On-disk embedding cache.
pub struct DiskCache {
    root: PathBuf,
    model_id: String,
    dimension: VectorDimension,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("root", &self.root)
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl DiskCache {
    /// Opens the cache at `root`, creating the directory if needed.
    ///
    /// If the directory was written with a different model or dimension,
    /// its entries are invalidated and fresh metadata is written.
    pub fn open_or_create(
        root: impl AsRef<Path>,
        model_id: &str,
        dimension: VectorDimension,
    ) -> Result<Self, EmbeddingError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let cache = Self {
            root,
            model_id: model_id.to_string(),
            dimension,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };

        let expected = DiskCacheMetadata {
            model_id: model_id.to_string(),
            dimension: dimension.get(),
            version: FORMAT_VERSION,
        };

        match cache.read_metadata() {
            Some(found) if found == expected => {}
            Some(found) => {
                warn!(
                    old_model = %found.model_id,
                    new_model = %expected.model_id,
                    "disk cache written with different model settings, invalidating"
                );
                cache.invalidate()?;
                cache.write_metadata(&expected)?;
            }
            None => {
                cache.write_metadata(&expected)?;
            }
        }

        Ok(cache)
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{ENTRY_EXT}", key.file_stem()))
    }

    fn read_metadata(&self) -> Option<DiskCacheMetadata> {
        let content = std::fs::read_to_string(self.metadata_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_metadata(&self, metadata: &DiskCacheMetadata) -> Result<(), EmbeddingError> {
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| EmbeddingError::MalformedEntry(e.to_string()))?;
        std::fs::write(self.metadata_path(), json)?;
        Ok(())
    }

    /// Looks up a vector. Any read or decode failure is a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<f32>> {
        let path = self.entry_path(key);
        let result = self.read_entry(&path, key);
        match result {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    fn read_entry(&self, path: &Path, key: &CacheKey) -> Option<Vec<f32>> {
        let bytes = std::fs::read(path).ok()?;
        let (entry, _): (DiskEntry, usize) =
            match bincode::decode_from_slice(&bytes, bincode::config::standard()) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "malformed disk cache entry, treating as miss");
                    return None;
                }
            };

        // A hash-prefix collision or a stale model both invalidate the hit.
        if entry.model_id != key.model_id()
            || entry.text_hash != key.text_hash()
            || entry.dimension as usize != self.dimension.get()
        {
            debug!(path = %path.display(), "disk cache entry does not match key, treating as miss");
            return None;
        }

        Some(entry.vector)
    }

    /// Persists a vector, atomically replacing any previous entry.
    pub fn insert(&self, key: &CacheKey, vector: &[f32]) -> Result<(), EmbeddingError> {
        self.dimension.validate_vector(vector)?;

        let entry = DiskEntry {
            model_id: key.model_id().to_string(),
            text_hash: key.text_hash().to_string(),
            dimension: self.dimension.get() as u32,
            vector: vector.to_vec(),
            created_at: Utc::now().timestamp() as u64,
        };

        let bytes = bincode::encode_to_vec(&entry, bincode::config::standard())
            .map_err(|e| EmbeddingError::MalformedEntry(e.to_string()))?;

        // Write-then-rename so a crash never leaves a torn entry behind.
        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        std::fs::write(tmp.path(), &bytes)?;
        tmp.persist(self.entry_path(key))
            .map_err(|e| EmbeddingError::DiskCache(e.error))?;

        Ok(())
    }

    /// Number of entries on disk.
    pub fn entry_count(&self) -> Result<usize, EmbeddingError> {
        Ok(self.entry_files()?.len())
    }

    /// Removes every entry, keeping the directory and metadata.
    pub fn invalidate(&self) -> Result<(), EmbeddingError> {
        for path in self.entry_files()? {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Removes entries older than `max_age_secs`. Returns the number
    /// removed.
    pub fn prune_older_than(&self, max_age_secs: u64) -> Result<usize, EmbeddingError> {
        let now = Utc::now().timestamp() as u64;
        let mut removed = 0;

        for path in self.entry_files()? {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let age = match bincode::decode_from_slice::<DiskEntry, _>(
                &bytes,
                bincode::config::standard(),
            ) {
                Ok((entry, _)) => now.saturating_sub(entry.created_at),
                // Unreadable entries are dead weight either way.
                Err(_) => u64::MAX,
            };
            if age > max_age_secs {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>, EmbeddingError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXT) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Snapshot of the hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dim4() -> VectorDimension {
        VectorDimension::new(4).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
        let key = CacheKey::new("minilm", "hello world");
        let vector = vec![1.0, 2.0, 3.0, 4.0];

        assert_eq!(cache.get(&key), None);
        cache.insert(&key, &vector).unwrap();
        assert_eq!(cache.get(&key), Some(vector));
        assert_eq!(cache.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::new("minilm", "persistent");
        let vector = vec![0.5, 0.25, 0.125, 0.0625];

        {
            let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
            cache.insert(&key, &vector).unwrap();
        }

        let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
        assert_eq!(cache.get(&key), Some(vector));
    }

    #[test]
    fn test_model_change_invalidates() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::new("minilm", "stale");

        {
            let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
            cache.insert(&key, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        }

        let cache = DiskCache::open_or_create(dir.path(), "other-model", dim4()).unwrap();
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_malformed_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
        let key = CacheKey::new("minilm", "garbage");

        std::fs::write(cache.entry_path(&key), b"not bincode at all").unwrap();
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn test_invalidate_removes_entries() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
        cache
            .insert(&CacheKey::new("minilm", "a"), &[1.0, 0.0, 0.0, 0.0])
            .unwrap();
        cache
            .insert(&CacheKey::new("minilm", "b"), &[0.0, 1.0, 0.0, 0.0])
            .unwrap();

        cache.invalidate().unwrap();
        assert_eq!(cache.entry_count().unwrap(), 0);
        // Metadata survives invalidation.
        assert!(dir.path().join("metadata.json").exists());
    }

    #[test]
    fn test_prune_keeps_recent_entries() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
        cache
            .insert(&CacheKey::new("minilm", "recent"), &[1.0, 0.0, 0.0, 0.0])
            .unwrap();

        // Freshly written entries are younger than an hour.
        let removed = cache.prune_older_than(3600).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(cache.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open_or_create(dir.path(), "minilm", dim4()).unwrap();
        let result = cache.insert(&CacheKey::new("minilm", "short"), &[1.0, 2.0]);
        assert!(result.is_err());
    }
}
