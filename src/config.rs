//! Configuration for the query-understanding pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `QS_` and use double underscores
//! to separate nested levels:
//! - `QS_ML_ENABLED=false` disables every ML path uniformly
//! - `QS_EMBEDDING__MODEL=BGESmallENV15` sets `embedding.model`
//! - `QS_PARTITIONER__MIN_WORDS=5` sets `partitioner.min_words`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Process-wide ML feature flag. When false, every component takes
    /// its rule-based/fallback path uniformly.
    #[serde(default = "default_true")]
    pub ml_enabled: bool,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Content classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Query partitioner configuration
    #[serde(default)]
    pub partitioner: PartitionerConfig,

    /// Query rewriter configuration
    #[serde(default)]
    pub rewriter: RewriterConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model name (fastembed identifier)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension the model produces
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Directory for downloaded model files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,

    /// Max entries in the in-memory cache tier
    #[serde(default = "default_memory_cache_entries")]
    pub memory_cache_entries: u64,

    /// Whether the on-disk cache tier is enabled
    #[serde(default = "default_true")]
    pub disk_cache_enabled: bool,

    /// Directory for the on-disk cache tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_cache_dir: Option<PathBuf>,

    /// Batch computation policy
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BatchConfig {
    /// At or below this size, batches reuse the per-item cached path
    #[serde(default = "default_small_batch_max")]
    pub small_batch_max: usize,

    /// Above this many uncached items, the batch fans out in chunks
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Chunk size for the fan-out path
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Worker bound override (default: available cores minus one)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Path to the persisted model artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Statistical confidence below which the rule scorer weighs in
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Confidence bonus when the rule scorer confirms the model
    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f32,

    /// Fixed confidence asserted by rule-based results
    #[serde(default = "default_rule_confidence")]
    pub rule_confidence: f32,

    /// Surface every significant category instead of just the top one
    #[serde(default = "default_false")]
    pub multi_label: bool,

    /// Softmax temperature for centroid probabilities
    #[serde(default = "default_softmax_temperature")]
    pub softmax_temperature: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PartitionerConfig {
    /// Queries under this word count are never partitioned
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Word count above which the topic-shift test runs
    #[serde(default = "default_long_query_words")]
    pub long_query_words: usize,

    /// Sliding window size in words (50% overlap)
    #[serde(default = "default_window_words")]
    pub window_words: usize,

    /// Adjacent-window similarity below this flags a topic shift
    #[serde(default = "default_topic_shift_threshold")]
    pub topic_shift_threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RewriterConfig {
    /// Rewrites below this confidence are discarded
    #[serde(default = "default_min_rewrite_confidence")]
    pub min_confidence: f32,

    /// Max terms appended by the expansion strategy
    #[serde(default = "default_max_expansion_terms")]
    pub max_expansion_terms: usize,

    /// Success cache size that triggers pruning
    #[serde(default = "default_success_cache_max")]
    pub success_cache_max: usize,

    /// Entries kept per content type after a prune
    #[serde(default = "default_success_cache_keep")]
    pub success_cache_keep: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_dimension() -> usize {
    384
}
fn default_memory_cache_entries() -> u64 {
    2048
}
fn default_small_batch_max() -> usize {
    4
}
fn default_parallel_threshold() -> usize {
    32
}
fn default_chunk_size() -> usize {
    16
}
fn default_confidence_threshold() -> f32 {
    0.6
}
fn default_agreement_bonus() -> f32 {
    0.15
}
fn default_rule_confidence() -> f32 {
    0.8
}
fn default_softmax_temperature() -> f32 {
    0.1
}
fn default_min_words() -> usize {
    4
}
fn default_long_query_words() -> usize {
    12
}
fn default_window_words() -> usize {
    6
}
fn default_topic_shift_threshold() -> f32 {
    0.6
}
fn default_min_rewrite_confidence() -> f32 {
    0.6
}
fn default_max_expansion_terms() -> usize {
    2
}
fn default_success_cache_max() -> usize {
    1000
}
fn default_success_cache_keep() -> usize {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            ml_enabled: true,
            embedding: EmbeddingConfig::default(),
            classifier: ClassifierConfig::default(),
            partitioner: PartitionerConfig::default(),
            rewriter: RewriterConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_dimension(),
            models_dir: None,
            memory_cache_entries: default_memory_cache_entries(),
            disk_cache_enabled: true,
            disk_cache_dir: None,
            batch: BatchConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            small_batch_max: default_small_batch_max(),
            parallel_threshold: default_parallel_threshold(),
            chunk_size: default_chunk_size(),
            workers: None,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            confidence_threshold: default_confidence_threshold(),
            agreement_bonus: default_agreement_bonus(),
            rule_confidence: default_rule_confidence(),
            multi_label: false,
            softmax_temperature: default_softmax_temperature(),
        }
    }
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            long_query_words: default_long_query_words(),
            window_words: default_window_words(),
            topic_shift_threshold: default_topic_shift_threshold(),
        }
    }
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_rewrite_confidence(),
            max_expansion_terms: default_max_expansion_terms(),
            success_cache_max: default_success_cache_max(),
            success_cache_keep: default_success_cache_keep(),
        }
    }
}

impl EmbeddingConfig {
    /// Model file directory, defaulting under the user cache dir.
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| data_root().join("models"))
    }

    /// Disk cache directory, defaulting under the user cache dir.
    #[must_use]
    pub fn disk_cache_dir(&self) -> PathBuf {
        self.disk_cache_dir
            .clone()
            .unwrap_or_else(|| data_root().join("embeddings"))
    }
}

/// Root for per-user persisted state.
fn data_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("querysense")
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file("querysense.toml"))
            // Layer in environment variables with QS_ prefix
            // Use double underscore (__) to separate nested levels
            .merge(Env::prefixed("QS_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(Box::new)
    }
}
