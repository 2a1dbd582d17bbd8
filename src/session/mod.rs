//! The retrieval pipeline for one user session.
//!
//! A [`RagSession`] owns everything a single learner works with: the chunks,
//! their embeddings, the vector collection and the last query. The only
//! thing shared between sessions is the [`EmbedderCache`].
//!
//! # States
//!
//! ```text
//!            ingest                 query / visualize / re-ingest
//!   Empty ──────────► Indexed ◄──────────────────────────────────┐
//!     ▲                  └───────────────────────────────────────┘
//!     └── failed ingest from Empty stays Empty
//! ```
//!
//! Ingestion is fail-fast and atomic: the new collection is fully built
//! before it replaces anything, so an error leaves the previous state
//! exactly as it was.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use raglens::{Config, EmbedderCache, IngestRequest, RagSession, ReductionMethod};
//!
//! let cache = Arc::new(EmbedderCache::default());
//! let mut session = RagSession::new(Config::default(), cache).unwrap();
//!
//! session
//!     .ingest(
//!         IngestRequest::new("the quick brown fox jumps over the lazy dog")
//!             .chunk_size(4)
//!             .overlap(1)
//!             .collection("t1"),
//!     )
//!     .unwrap();
//!
//! let result = session.query("lazy dog", 1).unwrap();
//! assert_eq!(result.hits[0].id, "t1_2");
//!
//! let vis = session.visualize(ReductionMethod::Linear, true).unwrap();
//! assert_eq!(vis.points.len(), 3);
//! assert!(vis.query_point.is_some());
//! ```

mod augment;
mod types;
mod validation;

pub use augment::DEFAULT_SYSTEM_PROMPT;
pub use types::{AugmentedPrompt, IngestRequest, IngestSummary, SessionStats, Visualization};
pub use validation::MAX_COLLECTION_NAME_LENGTH;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::chunking::build_chunks;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{embed_texts, EmbedderCache, EmbeddingModel};
use crate::error::{RagLensError, Result, ValidationError};
use crate::reduce::{self, project, project_in_background, Projection, ReductionMethod};
use crate::types::{Chunk, Embedding, QueryResult, ReducedPoint, SessionId};
use crate::vector::{Collection, CollectionHandle, Metadata, VectorStore};

/// Indexed corpus and everything derived from it.
#[derive(Debug)]
struct IndexedCorpus {
    handle: CollectionHandle,
    model: EmbeddingModel,
    chunking: ChunkingConfig,
    chunks: Vec<Chunk>,
    embeddings: Vec<Embedding>,
    last_query: Option<LastQuery>,
}

#[derive(Clone, Debug)]
struct LastQuery {
    text: String,
    embedding: Embedding,
    result: QueryResult,
}

#[derive(Debug)]
enum SessionState {
    Empty,
    Indexed(IndexedCorpus),
}

/// One learner's retrieval pipeline: chunk, embed, index, query, project.
///
/// # Thread Safety
///
/// `RagSession` is `Send + Sync`. Mutating operations take `&mut self`, so a
/// session shared between tasks needs its own lock; separate sessions never
/// contend except on the first load of a model.
pub struct RagSession {
    id: SessionId,
    config: Config,
    embedders: Arc<EmbedderCache>,
    store: VectorStore,
    state: SessionState,
}

impl std::fmt::Debug for RagSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagSession")
            .field("id", &self.id)
            .field("indexed", &self.is_indexed())
            .field("collections", &self.store.names())
            .finish_non_exhaustive()
    }
}

impl RagSession {
    /// Creates an empty session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails
    /// [`Config::validate`].
    pub fn new(config: Config, embedders: Arc<EmbedderCache>) -> Result<Self> {
        config.validate()?;

        let id = SessionId::new();
        debug!(session = %id, "Session created");

        Ok(Self {
            id,
            store: VectorStore::new(config.distance_metric),
            config,
            embedders,
            state: SessionState::Empty,
        })
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Configuration this session was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared embedder cache.
    pub fn embedders(&self) -> &Arc<EmbedderCache> {
        &self.embedders
    }

    /// True once an ingestion has succeeded.
    pub fn is_indexed(&self) -> bool {
        matches!(self.state, SessionState::Indexed(_))
    }

    /// Chunks, embeds and indexes `request.text`, replacing any previous
    /// corpus.
    ///
    /// # Errors
    ///
    /// - `Validation` if the text is blank or the collection name is invalid
    /// - `InvalidConfiguration` if `overlap >= chunk_size` or `chunk_size == 0`
    /// - `ModelLoad` / `Embedding` if the embedding backend fails
    /// - `Index` if the embeddings cannot be indexed
    ///
    /// On error the session keeps its previous state.
    #[instrument(skip(self, request), fields(session = %self.id, chars = request.text.len()))]
    pub fn ingest(&mut self, request: IngestRequest) -> Result<IngestSummary> {
        let collection = request.resolve_collection(&self.config);
        validation::validate_ingest_request(&request, &collection)?;

        let chunking = request.resolve_chunking(&self.config);
        chunking.validate()?;
        let model = request.resolve_model(&self.config);

        let chunks = build_chunks(&collection, &request.text, &chunking)?;
        if chunks.is_empty() {
            return Err(ValidationError::required_field("text").into());
        }

        let service = self.embedders.load_model(model)?;
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embed_texts(service.as_ref(), &texts)?;

        // Build the replacement off to the side so failures change nothing
        let mut staged = Collection::new(collection.as_str(), self.config.distance_metric);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let metadata: Vec<Metadata> = chunks
            .iter()
            .map(|c| {
                Metadata::from([
                    ("source_offset".to_string(), c.source_offset.to_string()),
                    ("model".to_string(), model.identifier().to_string()),
                ])
            })
            .collect();
        staged.add_with_metadata(&ids, &embeddings, &texts, &metadata)?;

        if let SessionState::Indexed(previous) = &self.state {
            if previous.handle.name() != collection {
                self.store.remove(previous.handle.name());
            }
        }
        let handle = self.store.replace_with(staged);

        let summary = IngestSummary {
            collection,
            chunk_count: chunks.len(),
            dimension: service.dimension(),
            model,
        };

        self.state = SessionState::Indexed(IndexedCorpus {
            handle,
            model,
            chunking,
            chunks,
            embeddings,
            last_query: None,
        });

        info!(
            collection = %summary.collection,
            chunks = summary.chunk_count,
            dimension = summary.dimension,
            model = %model,
            "Ingestion complete"
        );

        Ok(summary)
    }

    /// Embeds `text` with the corpus model and returns the `top_k` nearest
    /// chunks. The result is remembered for [`RagSession::visualize`] and
    /// [`RagSession::augment`].
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if `top_k` is zero
    /// - `NotIndexed` before a successful ingestion
    /// - `Validation` if `text` is blank
    /// - `Embedding` if the query cannot be embedded
    #[instrument(skip(self, text), fields(session = %self.id))]
    pub fn query(&mut self, text: &str, top_k: usize) -> Result<QueryResult> {
        if top_k == 0 {
            return Err(RagLensError::config("top_k must be greater than 0"));
        }
        let SessionState::Indexed(corpus) = &mut self.state else {
            return Err(RagLensError::NotIndexed);
        };
        validation::validate_query(text)?;

        let service = self.embedders.load_model(corpus.model)?;
        let embedding = service.embed(text)?;
        service.validate_embedding(&embedding)?;

        let result = self.store.query(&corpus.handle, &embedding, top_k)?;
        info!(hits = result.len(), top = ?result.top().map(|h| h.id.as_str()), "Query complete");

        corpus.last_query = Some(LastQuery {
            text: text.to_string(),
            embedding,
            result: result.clone(),
        });

        Ok(result)
    }

    /// [`RagSession::query`] with the configured default `top_k`.
    pub fn query_default(&mut self, text: &str) -> Result<QueryResult> {
        self.query(text, self.config.default_top_k)
    }

    /// Projects the corpus (and the last query, if `include_query`) to 3D.
    ///
    /// Too few chunks for `method` is not an error: the result carries a
    /// `warning` and a zero-padded linear fallback layout.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` before a successful ingestion, and reduction
    /// errors other than `InsufficientSamples`.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn visualize(&self, method: ReductionMethod, include_query: bool) -> Result<Visualization> {
        let corpus = self.indexed()?;
        let query = Self::query_vector(corpus, include_query);

        let outcome = project(&corpus.embeddings, query, method, &self.config.manifold);
        self.finish_visualization(corpus, method, query.is_some(), outcome)
    }

    /// [`RagSession::visualize`] running the projection on tokio's blocking
    /// pool, so an interactive caller stays responsive during a manifold
    /// layout.
    ///
    /// # Errors
    ///
    /// As [`RagSession::visualize`], plus `Task` if the blocking task fails.
    pub async fn visualize_in_background(
        &self,
        method: ReductionMethod,
        include_query: bool,
    ) -> Result<Visualization> {
        let corpus = self.indexed()?;
        let query = Self::query_vector(corpus, include_query).map(<[f32]>::to_vec);
        let has_query = query.is_some();

        let outcome = project_in_background(
            corpus.embeddings.clone(),
            query,
            method,
            self.config.manifold,
        )
        .await;
        self.finish_visualization(corpus, method, has_query, outcome)
    }

    /// [`RagSession::visualize`] with the configured default method.
    pub fn visualize_default(&self, include_query: bool) -> Result<Visualization> {
        self.visualize(self.config.default_reduction, include_query)
    }

    fn query_vector(corpus: &IndexedCorpus, include_query: bool) -> Option<&[f32]> {
        if !include_query {
            return None;
        }
        corpus.last_query.as_ref().map(|q| q.embedding.as_slice())
    }

    fn finish_visualization(
        &self,
        corpus: &IndexedCorpus,
        method: ReductionMethod,
        has_query: bool,
        outcome: Result<Projection>,
    ) -> Result<Visualization> {
        let (projection, warning) = match outcome {
            Ok(projection) => (projection, None),
            Err(e) if e.is_insufficient_samples() => {
                warn!(method = %method, chunks = corpus.chunks.len(), error = %e, "Falling back to degraded layout");
                (fallback_projection(corpus, has_query, &self.config), Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        let highlighted = corpus
            .last_query
            .as_ref()
            .map(|q| q.result.ordinals())
            .unwrap_or_default();

        info!(points = projection.points.len(), degraded = warning.is_some(), "Visualization ready");

        Ok(Visualization {
            method,
            points: projection.points,
            query_point: projection.query,
            texts: corpus.chunks.iter().map(|c| c.text.clone()).collect(),
            highlighted,
            warning,
        })
    }

    /// Chunks of the indexed corpus, in order. Empty before ingestion.
    pub fn chunks(&self) -> &[Chunk] {
        match &self.state {
            SessionState::Indexed(corpus) => &corpus.chunks,
            SessionState::Empty => &[],
        }
    }

    /// The chunk at `ordinal`, if any.
    pub fn chunk(&self, ordinal: usize) -> Option<&Chunk> {
        self.chunks().get(ordinal)
    }

    /// Embeddings aligned with [`RagSession::chunks`].
    pub fn embeddings(&self) -> &[Embedding] {
        match &self.state {
            SessionState::Indexed(corpus) => &corpus.embeddings,
            SessionState::Empty => &[],
        }
    }

    /// Model of the indexed corpus.
    pub fn model(&self) -> Option<EmbeddingModel> {
        self.indexed().ok().map(|c| c.model)
    }

    /// Chunking parameters of the indexed corpus.
    pub fn chunking(&self) -> Option<ChunkingConfig> {
        self.indexed().ok().map(|c| c.chunking)
    }

    /// The indexed collection.
    pub fn collection(&self) -> Option<&Collection> {
        let corpus = self.indexed().ok()?;
        self.store.collection(&corpus.handle).ok()
    }

    /// Result of the last query since the latest ingestion.
    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_query().map(|q| &q.result)
    }

    /// Text of the last query since the latest ingestion.
    pub fn last_query_text(&self) -> Option<&str> {
        self.last_query().map(|q| q.text.as_str())
    }

    fn last_query(&self) -> Option<&LastQuery> {
        self.indexed().ok()?.last_query.as_ref()
    }

    /// Corpus statistics.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` before a successful ingestion.
    pub fn stats(&self) -> Result<SessionStats> {
        let corpus = self.indexed()?;
        let words: Vec<usize> = corpus.chunks.iter().map(Chunk::word_count).collect();
        let total_words: usize = words.iter().sum();

        Ok(SessionStats {
            collection: corpus.handle.name().to_string(),
            model: corpus.model,
            chunk_count: corpus.chunks.len(),
            embedding_dimension: corpus.embeddings.first().map_or(0, Vec::len),
            total_words,
            avg_words_per_chunk: total_words as f64 / words.len().max(1) as f64,
            min_words: words.iter().copied().min().unwrap_or(0),
            max_words: words.iter().copied().max().unwrap_or(0),
        })
    }

    /// Builds an LLM prompt from the last query and its retrieved chunks.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` before ingestion and a `Validation` error if no
    /// query has been run since the latest ingestion.
    pub fn augment(&self, system_prompt: Option<&str>) -> Result<AugmentedPrompt> {
        let corpus = self.indexed()?;
        let last = corpus
            .last_query
            .as_ref()
            .ok_or_else(|| ValidationError::required_field("query"))?;

        Ok(augment::build_prompt(&last.text, &last.result, system_prompt))
    }

    fn indexed(&self) -> Result<&IndexedCorpus> {
        match &self.state {
            SessionState::Indexed(corpus) => Ok(corpus),
            SessionState::Empty => Err(RagLensError::NotIndexed),
        }
    }
}

/// Linear layout over as many axes as the sample count supports, padded
/// with zeros; every point at the origin if even that fails.
fn fallback_projection(corpus: &IndexedCorpus, has_query: bool, config: &Config) -> Projection {
    let mut rows = corpus.embeddings.clone();
    if has_query {
        if let Some(q) = &corpus.last_query {
            rows.push(q.embedding.clone());
        }
    }

    let dims = rows.len().min(reduce::TARGET_DIM);
    let mut points = match reduce::reduce(&rows, ReductionMethod::Linear, dims, &config.manifold) {
        Ok(reduced) => reduce::to_points(&reduced),
        Err(e) => {
            debug!(error = %e, "Fallback projection failed, using origin");
            vec![ReducedPoint::origin(); rows.len()]
        }
    };

    let query = if has_query { points.pop() } else { None };
    Projection { points, query }
}
