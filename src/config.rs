//! Configuration types for RagLens.
//!
//! The [`Config`] struct controls session behavior including:
//! - Embedding provider (feature hashing or builtin ONNX) and default model
//! - Chunking window and overlap
//! - Default collection name, result count and reduction method
//! - Manifold layout tuning
//!
//! # Example
//! ```rust
//! use raglens::{ChunkingConfig, Config, ReductionMethod};
//!
//! // Use defaults (100-word chunks, 20-word overlap, PCA)
//! let config = Config::default();
//!
//! // Smaller windows, UMAP-style layout
//! let config = Config {
//!     chunking: ChunkingConfig { chunk_size: 50, overlap: 10 },
//!     default_reduction: ReductionMethod::Manifold,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingModel;
use crate::error::{RagLensError, Result};
use crate::reduce::ReductionMethod;
use crate::vector::DistanceMetric;

/// Default words per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default words shared by consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 20;

/// Default collection name.
pub const DEFAULT_COLLECTION_NAME: &str = "rag_embeddings";

/// Default number of query results.
pub const DEFAULT_TOP_K: usize = 3;

/// Session configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use raglens::Config;
///
/// let config = Config {
///     default_top_k: 5,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How embedding models are realized.
    pub embedding_provider: EmbeddingProvider,

    /// Model used when an ingest request doesn't name one.
    pub default_model: EmbeddingModel,

    /// Default chunking window.
    pub chunking: ChunkingConfig,

    /// Collection used when an ingest request doesn't name one.
    pub default_collection: String,

    /// Result count for [`RagSession::query_default`](crate::RagSession::query_default).
    pub default_top_k: usize,

    /// Reduction method used when none is chosen.
    pub default_reduction: ReductionMethod,

    /// Distance metric for nearest-neighbor search.
    pub distance_metric: DistanceMetric,

    /// Tuning for [`ReductionMethod::Manifold`].
    pub manifold: ManifoldConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Hashing is the safe default - no model files required
            embedding_provider: EmbeddingProvider::Hashing,
            default_model: EmbeddingModel::default(),
            chunking: ChunkingConfig::default(),
            default_collection: DEFAULT_COLLECTION_NAME.to_string(),
            default_top_k: DEFAULT_TOP_K,
            default_reduction: ReductionMethod::default(),
            distance_metric: DistanceMetric::default(),
            manifold: ManifoldConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for builtin ONNX embedding generation.
    ///
    /// This requires the `builtin-embeddings` feature to be enabled.
    ///
    /// # Example
    /// ```rust
    /// use raglens::Config;
    ///
    /// let config = Config::with_builtin_embeddings();
    /// assert!(config.embedding_provider.is_builtin());
    /// ```
    pub fn with_builtin_embeddings() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Builtin { model_dir: None },
            ..Default::default()
        }
    }

    /// Parses a JSON document and validates the result.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// ```rust
    /// use raglens::Config;
    ///
    /// let config = Config::from_json(r#"{ "default_top_k": 5 }"#).unwrap();
    /// assert_eq!(config.default_top_k, 5);
    /// assert_eq!(config.chunking.chunk_size, 100);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `RagSession::new()`.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if:
    /// - the chunking window is invalid (see [`ChunkingConfig::validate`])
    /// - `default_top_k` is 0
    /// - `default_collection` is blank
    /// - the manifold settings are invalid (see [`ManifoldConfig::validate`])
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.default_top_k == 0 {
            return Err(RagLensError::config("default_top_k must be greater than 0"));
        }

        if self.default_collection.trim().is_empty() {
            return Err(RagLensError::config("default_collection must not be empty"));
        }

        self.manifold.validate()
    }
}

/// Embedding provider configuration.
///
/// Determines how an [`EmbeddingModel`] is turned into a working encoder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProvider {
    /// Deterministic feature-hashing encoder sized like the chosen model.
    ///
    /// Needs no model files; lexical overlap drives similarity.
    #[default]
    Hashing,

    /// Pretrained sentence-embedding model run through ONNX Runtime.
    ///
    /// Requires the `builtin-embeddings` feature.
    Builtin {
        /// Root containing one directory per model. If `None`, uses the
        /// platform cache directory.
        model_dir: Option<PathBuf>,
    },
}

impl EmbeddingProvider {
    /// Returns true if this is the builtin provider.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }

    /// Returns true if this is the hashing provider.
    pub fn is_hashing(&self) -> bool {
        matches!(self, Self::Hashing)
    }
}

/// Word-window chunking parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per window.
    pub chunk_size: usize,

    /// Words shared by consecutive windows. Must be smaller than `chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    /// Creates a chunking config; call [`validate`](Self::validate) before use.
    pub const fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Words the window start advances by on each step.
    #[inline]
    pub const fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap)
    }

    /// Validates the window.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if `chunk_size` is 0 or
    /// `overlap >= chunk_size` (the window would never advance).
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagLensError::config("chunk_size must be greater than 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagLensError::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Tuning for the UMAP-style neighbor embedding.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldConfig {
    /// Size of the local neighborhood (clamped to `n - 1`).
    pub n_neighbors: usize,

    /// Minimum distance between embedded points.
    pub min_dist: f32,

    /// Scale of the embedded points; `min_dist` must not exceed it.
    pub spread: f32,

    /// Optimization epochs.
    pub n_epochs: usize,

    /// Negative samples drawn per positive edge sample.
    pub negative_sample_rate: usize,

    /// Initial SGD learning rate, decayed linearly to zero.
    pub learning_rate: f32,

    /// RNG seed; the same seed and input give the same layout.
    pub seed: u64,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 200,
            negative_sample_rate: 5,
            learning_rate: 1.0,
            seed: 42,
        }
    }
}

impl ManifoldConfig {
    /// Validates the manifold settings.
    pub fn validate(&self) -> Result<()> {
        if self.n_neighbors < 2 {
            return Err(RagLensError::config("manifold.n_neighbors must be at least 2"));
        }
        if self.spread.is_nan() || self.spread <= 0.0 {
            return Err(RagLensError::config("manifold.spread must be positive"));
        }
        if !(0.0..=self.spread).contains(&self.min_dist) {
            return Err(RagLensError::config(format!(
                "manifold.min_dist must be between 0 and spread ({}), got {}",
                self.spread, self.min_dist
            )));
        }
        if self.n_epochs == 0 {
            return Err(RagLensError::config("manifold.n_epochs must be greater than 0"));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(RagLensError::config("manifold.learning_rate must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.embedding_provider.is_hashing());
        assert_eq!(config.chunking.chunk_size, 100);
        assert_eq!(config.chunking.overlap, 20);
        assert_eq!(config.default_collection, "rag_embeddings");
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.default_reduction, ReductionMethod::Linear);
        assert_eq!(config.distance_metric, DistanceMetric::Cosine);
        assert_eq!(config.default_model, EmbeddingModel::MiniLm);
    }

    #[test]
    fn test_with_builtin_embeddings() {
        let config = Config::with_builtin_embeddings();
        assert!(config.embedding_provider.is_builtin());
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_overlap_equal_to_chunk_size() {
        let config = Config {
            chunking: ChunkingConfig::new(10, 10),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_validate_chunk_size_zero() {
        assert!(ChunkingConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_validate_top_k_zero() {
        let config = Config {
            default_top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_blank_collection() {
        let config = Config {
            default_collection: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stride() {
        assert_eq!(ChunkingConfig::new(4, 1).stride(), 3);
        assert_eq!(ChunkingConfig::default().stride(), 80);
    }

    #[test]
    fn test_manifold_validation() {
        let bad_dist = ManifoldConfig {
            min_dist: 2.0,
            ..Default::default()
        };
        assert!(bad_dist.validate().is_err());

        let bad_neighbors = ManifoldConfig {
            n_neighbors: 1,
            ..Default::default()
        };
        assert!(bad_neighbors.validate().is_err());

        let nan_rate = ManifoldConfig {
            learning_rate: f32::NAN,
            ..Default::default()
        };
        assert!(nan_rate.validate().is_err());

        for spread in [f32::NAN, 0.0, -1.0] {
            let bad_spread = ManifoldConfig {
                spread,
                min_dist: 0.0,
                ..Default::default()
            };
            assert!(bad_spread.validate().unwrap_err().is_config());
        }
    }

    #[test]
    fn test_from_json_partial() {
        let config = Config::from_json(
            r#"{ "chunking": { "chunk_size": 40, "overlap": 5 }, "default_reduction": "Manifold" }"#,
        )
        .unwrap();
        assert_eq!(config.chunking, ChunkingConfig::new(40, 5));
        assert_eq!(config.default_reduction, ReductionMethod::Manifold);
        assert_eq!(config.default_top_k, 3);
    }

    #[test]
    fn test_from_json_partial_nested_sections() {
        let config = Config::from_json(
            r#"{ "chunking": { "chunk_size": 50 }, "manifold": { "seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.chunking, ChunkingConfig::new(50, DEFAULT_OVERLAP));
        assert_eq!(config.manifold.seed, 7);
        assert_eq!(config.manifold.n_neighbors, ManifoldConfig::default().n_neighbors);
    }

    #[test]
    fn test_from_json_rejects_invalid_window() {
        let err = Config::from_json(r#"{ "chunking": { "chunk_size": 5, "overlap": 5 } }"#)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_json_malformed() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, RagLensError::Serialization(_)));
    }
}
