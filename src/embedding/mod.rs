//! Embedding service abstractions for RagLens.
//!
//! This module provides the trait and implementations for embedding generation.
//! Embeddings are dense vector representations of text used for semantic search.
//!
//! # Providers
//!
//! - [`HashingEmbedding`] - Deterministic feature hashing, no model files
//! - `OnnxEmbedding` - Pretrained model via ONNX Runtime (requires `builtin-embeddings` feature)
//!
//! Loaded services are shared through [`EmbedderCache`], which keeps one
//! instance per [`EmbeddingModel`] for the life of the process.
//!
//! # Example
//!
//! ```rust
//! use raglens::embedding::{EmbeddingService, HashingEmbedding};
//! use raglens::EmbeddingModel;
//!
//! let service = HashingEmbedding::new(EmbeddingModel::MiniLm);
//! let vectors = service.embed_batch(&["the lazy dog", "the quick brown fox"]).unwrap();
//! assert_eq!(vectors.len(), 2);
//! assert_eq!(vectors[0].len(), 384);
//! ```

mod cache;
mod model;

#[cfg(feature = "builtin-embeddings")]
pub mod onnx;

pub use cache::EmbedderCache;
pub use model::EmbeddingModel;

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::config::EmbeddingProvider;
use crate::error::{IndexError, RagLensError, Result};
use crate::types::Embedding;

/// Embedding service trait for generating vector representations of text.
///
/// This trait defines the contract for any embedding provider. Implementations
/// must be thread-safe (`Send + Sync`) because one loaded model is shared by
/// every session in the process.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use raglens::embedding::EmbeddingService;
/// use raglens::{Embedding, Result};
///
/// struct MyEmbeddingService {
///     client: MyApiClient,
/// }
///
/// impl EmbeddingService for MyEmbeddingService {
///     fn embed(&self, text: &str) -> Result<Embedding> {
///         Ok(self.client.get_embedding(text)?)
///     }
///
///     fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
///         Ok(self.client.get_embeddings(texts)?)
///     }
///
///     fn dimension(&self) -> usize {
///         1536
///     }
/// }
/// ```
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns `RagLensError::Embedding` if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generates embeddings for multiple texts, in input order.
    ///
    /// # Errors
    ///
    /// Returns `RagLensError::Embedding` if any embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> usize;

    /// Validates that an embedding has the correct dimension.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &Embedding) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(IndexError::dimension_mismatch(expected, actual).into());
        }

        Ok(())
    }
}

/// Embeds `texts` and checks the output shape.
///
/// The backend is a black box, so this is where the one-vector-per-input
/// and identical-length guarantees are enforced.
///
/// # Errors
///
/// Returns `RagLensError::Embedding` if the backend fails, returns the wrong
/// number of vectors, or returns vectors of differing length.
pub fn embed_texts(service: &dyn EmbeddingService, texts: &[&str]) -> Result<Vec<Embedding>> {
    let vectors = service.embed_batch(texts)?;

    if vectors.len() != texts.len() {
        return Err(RagLensError::embedding(format!(
            "Backend returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }

    let expected = service.dimension();
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != expected) {
        let preview: String = texts[i].chars().take(40).collect();
        return Err(RagLensError::embedding(format!(
            "Vector {i} has length {}, expected {expected} (input: {preview:?})",
            v.len()
        )));
    }

    Ok(vectors)
}

/// Feature-hashing embedding service.
///
/// Each lowercase alphanumeric token is hashed with xxHash64 into one of
/// `dimension` buckets with a hash-derived sign, and the counts are
/// L2-normalized. Texts sharing words land close together under cosine
/// distance; the output is identical across runs and platforms. Text with
/// no alphanumeric tokens hashes as one raw feature.
///
/// Sized like the [`EmbeddingModel`] it stands in for, so a session can
/// switch to the ONNX backend without changing anything downstream.
#[derive(Clone, Debug)]
pub struct HashingEmbedding {
    model: EmbeddingModel,
    seed: u64,
}

impl HashingEmbedding {
    /// Creates a hashing service shaped like `model`.
    pub fn new(model: EmbeddingModel) -> Self {
        // Distinct seeds keep the models' spaces from being interchangeable
        let seed = hash_token(model.identifier(), 0);
        Self { model, seed }
    }

    /// The model this service stands in for.
    pub fn model(&self) -> EmbeddingModel {
        self.model
    }
}

impl EmbeddingService for HashingEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let dim = self.model.dimension();
        let mut vector = vec![0.0f32; dim];
        let mut tokens = 0usize;

        for token in tokenize(text) {
            let h = hash_token(&token, self.seed);
            let bucket = (h % dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            // Punctuation-only text hashes as a single raw feature
            let raw = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if raw.is_empty() {
                return Err(RagLensError::embedding(
                    "Text has no embeddable tokens: empty or whitespace-only input",
                ));
            }
            let h = hash_token(&raw, self.seed);
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[(h % dim as u64) as usize] = sign;
        }

        Ok(l2_normalize(&vector))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.model.dimension()
    }
}

/// Creates an embedding service for `model` using the configured provider.
///
/// # Errors
///
/// Returns `ModelLoad` if:
/// - Builtin embeddings requested but feature not enabled
/// - ONNX model loading fails (for builtin provider)
pub fn create_embedding_service(
    model: EmbeddingModel,
    provider: &EmbeddingProvider,
) -> Result<Box<dyn EmbeddingService>> {
    match provider {
        EmbeddingProvider::Hashing => Ok(Box::new(HashingEmbedding::new(model))),

        #[cfg(feature = "builtin-embeddings")]
        EmbeddingProvider::Builtin { model_dir } => {
            let service = onnx::OnnxEmbedding::load(model, model_dir.as_deref())?;
            Ok(Box::new(service))
        }

        #[cfg(not(feature = "builtin-embeddings"))]
        EmbeddingProvider::Builtin { .. } => Err(RagLensError::model_load(
            model.identifier(),
            "builtin embeddings require the 'builtin-embeddings' feature",
        )),
    }
}

/// Lowercased alphanumeric runs of `text`.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn hash_token(token: &str, seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(token.as_bytes());
    hasher.finish()
}

/// L2 normalizes a vector to unit length.
///
/// After normalization, the vector has magnitude 1.0, which means
/// cosine similarity can be computed as a simple dot product.
pub(crate) fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
