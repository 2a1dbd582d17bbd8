//! # RagLens
//!
//! A small, exact, fully in-memory retrieval pipeline for learning how
//! retrieval-augmented generation works.
//!
//! RagLens splits a passage into overlapping word chunks, embeds every chunk,
//! indexes the vectors, answers natural-language queries with the nearest
//! chunks, and projects the whole vector space (query included) to 3D so a
//! renderer can draw it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use raglens::{Config, EmbedderCache, IngestRequest, RagSession, ReductionMethod};
//!
//! // One cache per process, shared by every session
//! let cache = Arc::new(EmbedderCache::default());
//! let mut session = RagSession::new(Config::default(), cache)?;
//!
//! session.ingest(
//!     IngestRequest::new("the quick brown fox jumps over the lazy dog")
//!         .chunk_size(4)
//!         .overlap(1)
//!         .collection("t1"),
//! )?;
//!
//! let result = session.query("lazy dog", 1)?;
//! assert_eq!(result.hits[0].text, "the lazy dog");
//!
//! let vis = session.visualize(ReductionMethod::Linear, true)?;
//! println!("{}", vis.to_json()?);
//! # Ok::<(), raglens::RagLensError>(())
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! text ─► chunking ─► embedding ─► vector (build)
//! query ─► embedding ─► vector (search) ─► QueryResult
//! corpus vectors + query vector ─► reduce (one pass) ─► 3D points
//! ```
//!
//! ## Embedding Providers
//!
//! - **Hashing** (default): deterministic feature hashing, no model files,
//!   shaped like the selected model
//! - **Builtin**: pretrained sentence-transformer models through ONNX
//!   Runtime (requires the `builtin-embeddings` feature)
//!
//! ## Features
//!
//! - `builtin-embeddings` - Enable ONNX embedding generation
//!
//! ## Thread Safety
//!
//! [`RagSession`] and [`EmbedderCache`] are `Send + Sync`. Sessions are
//! fully isolated from each other; the embedder cache is the only shared
//! state and is read-only once a model is loaded.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod error;
mod session;
mod types;

pub mod chunking;
pub mod embedding;
pub mod reduce;

/// Exact vector index and named collections.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main pipeline interface
pub use session::{
    AugmentedPrompt, IngestRequest, IngestSummary, RagSession, SessionStats, Visualization,
    DEFAULT_SYSTEM_PROMPT, MAX_COLLECTION_NAME_LENGTH,
};

// Configuration
pub use config::{
    ChunkingConfig, Config, EmbeddingProvider, ManifoldConfig, DEFAULT_CHUNK_SIZE,
    DEFAULT_COLLECTION_NAME, DEFAULT_OVERLAP, DEFAULT_TOP_K,
};

// Error handling
pub use error::{IndexError, RagLensError, ReductionError, Result, ValidationError};

// Core types
pub use types::{
    chunk_id, chunk_ordinal, Chunk, Embedding, QueryHit, QueryResult, ReducedPoint, SessionId,
};

// Pipeline stages
pub use chunking::{build_chunks, chunk_words};
pub use embedding::{EmbedderCache, EmbeddingModel, EmbeddingService};
pub use reduce::{Projection, ReductionMethod};
pub use vector::{DistanceMetric, VectorStore};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common RagLens usage.
///
/// ```rust
/// use raglens::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ChunkingConfig, Config};
    pub use crate::embedding::{EmbedderCache, EmbeddingModel};
    pub use crate::error::{RagLensError, Result};
    pub use crate::reduce::ReductionMethod;
    pub use crate::session::{IngestRequest, RagSession, Visualization};
    pub use crate::types::{Chunk, QueryResult, ReducedPoint};
}
