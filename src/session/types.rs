//! Request and result types for [`RagSession`](super::RagSession).

use serde::{Deserialize, Serialize};

use crate::config::{ChunkingConfig, Config};
use crate::embedding::EmbeddingModel;
use crate::error::Result;
use crate::reduce::ReductionMethod;
use crate::types::ReducedPoint;

/// Input to [`RagSession::ingest`](super::RagSession::ingest).
///
/// Unset fields fall back to the session's [`Config`].
///
/// # Example
///
/// ```rust
/// use raglens::{EmbeddingModel, IngestRequest};
///
/// let request = IngestRequest::new("the quick brown fox jumps over the lazy dog")
///     .chunk_size(4)
///     .overlap(1)
///     .model(EmbeddingModel::MiniLm)
///     .collection("t1");
/// assert_eq!(request.chunk_size, Some(4));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Source passage.
    pub text: String,

    /// Words per chunk.
    pub chunk_size: Option<usize>,

    /// Words shared by consecutive chunks.
    pub overlap: Option<usize>,

    /// Embedding model.
    pub model: Option<EmbeddingModel>,

    /// Collection to (re)build.
    pub collection: Option<String>,
}

impl IngestRequest {
    /// Creates a request for `text` with every setting defaulted.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Sets the chunk size in words.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Sets the overlap in words.
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.overlap = Some(overlap);
        self
    }

    /// Sets the embedding model.
    pub fn model(mut self, model: EmbeddingModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the collection name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub(crate) fn resolve_chunking(&self, config: &Config) -> ChunkingConfig {
        ChunkingConfig::new(
            self.chunk_size.unwrap_or(config.chunking.chunk_size),
            self.overlap.unwrap_or(config.chunking.overlap),
        )
    }

    pub(crate) fn resolve_model(&self, config: &Config) -> EmbeddingModel {
        self.model.unwrap_or(config.default_model)
    }

    pub(crate) fn resolve_collection(&self, config: &Config) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| config.default_collection.clone())
    }
}

/// What a successful ingestion built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Collection name.
    pub collection: String,
    /// Number of chunks indexed.
    pub chunk_count: usize,
    /// Embedding dimension.
    pub dimension: usize,
    /// Model used.
    pub model: EmbeddingModel,
}

/// Everything a renderer needs to draw the vector space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    /// Method that produced the points.
    pub method: ReductionMethod,

    /// One point per chunk, aligned with `texts`.
    pub points: Vec<ReducedPoint>,

    /// Position of the last query, when requested and available.
    pub query_point: Option<ReducedPoint>,

    /// Chunk texts, aligned with `points`.
    pub texts: Vec<String>,

    /// Chunk ordinals retrieved by the last query, in rank order.
    pub highlighted: Vec<usize>,

    /// Set when the projection had to degrade; the points are then a
    /// zero-padded fallback.
    pub warning: Option<String>,
}

impl Visualization {
    /// True when the points are a fallback layout.
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }

    /// Serializes for a rendering collaborator.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Summary numbers for the indexed corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Collection name.
    pub collection: String,
    /// Model used for the collection.
    pub model: EmbeddingModel,
    /// Number of chunks.
    pub chunk_count: usize,
    /// Embedding dimension.
    pub embedding_dimension: usize,
    /// Words across all chunks, counting overlapped words once per chunk.
    pub total_words: usize,
    /// Mean words per chunk.
    pub avg_words_per_chunk: f64,
    /// Shortest chunk, in words.
    pub min_words: usize,
    /// Longest chunk, in words.
    pub max_words: usize,
}

impl SessionStats {
    /// Serializes for a rendering collaborator.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A prompt assembled from the last query and its retrieved chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentedPrompt {
    /// Instructions for the model.
    pub system_prompt: String,

    /// Numbered context blocks followed by the question.
    pub user_prompt: String,

    /// Ids of the chunks placed in the context, in rank order.
    pub context_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_config() {
        let config = Config::default();
        let request = IngestRequest::new("some text");
        assert_eq!(request.resolve_chunking(&config), config.chunking);
        assert_eq!(request.resolve_model(&config), EmbeddingModel::MiniLm);
        assert_eq!(request.resolve_collection(&config), "rag_embeddings");
    }

    #[test]
    fn test_request_overrides() {
        let config = Config::default();
        let request = IngestRequest::new("x")
            .chunk_size(4)
            .overlap(1)
            .model(EmbeddingModel::MpNet)
            .collection("t1");
        assert_eq!(request.resolve_chunking(&config), ChunkingConfig::new(4, 1));
        assert_eq!(request.resolve_model(&config), EmbeddingModel::MpNet);
        assert_eq!(request.resolve_collection(&config), "t1");
    }

    #[test]
    fn test_visualization_json() {
        let vis = Visualization {
            method: ReductionMethod::Linear,
            points: vec![ReducedPoint::new(1.0, 2.0, 3.0)],
            query_point: None,
            texts: vec!["hello".into()],
            highlighted: vec![0],
            warning: None,
        };
        let json = vis.to_json().unwrap();
        assert!(json.contains("\"method\":\"Linear\""));
        assert!(json.contains("\"highlighted\":[0]"));
        assert!(!vis.is_degraded());
    }
}
