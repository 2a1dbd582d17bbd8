//! Core type definitions shared by the chunker, index, reducer and session.
//!
//! Chunk ids follow the `"<collection>_<ordinal>"` convention so that a search
//! hit can always be traced back to its position in the chunk sequence.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Embedding vector type alias.
///
/// Embeddings are f32 vectors of fixed dimension (typically 384 or 768).
pub type Embedding = Vec<f32>;

/// Session identifier (UUID v7 for time-ordering).
///
/// Every [`RagSession`](crate::RagSession) gets one; it only appears in
/// tracing spans and serialized output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new SessionId with a UUID v7 (time-ordered).
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a nil (all zeros) SessionId.
    #[inline]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for SessionId {
    /// Returns a nil (all zeros) SessionId.
    ///
    /// For a new unique ID, use [`SessionId::new()`].
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds the id of the chunk at `ordinal` in `collection`.
///
/// ```rust
/// assert_eq!(raglens::chunk_id("t1", 2), "t1_2");
/// ```
#[inline]
pub fn chunk_id(collection: &str, ordinal: usize) -> String {
    format!("{collection}_{ordinal}")
}

/// Recovers the ordinal from a chunk id built by [`chunk_id`].
///
/// Splits on the last `_`, so collection names may themselves contain
/// underscores (`rag_embeddings_7` → `7`).
///
/// ```rust
/// assert_eq!(raglens::chunk_ordinal("rag_embeddings_7"), Some(7));
/// assert_eq!(raglens::chunk_ordinal("no-ordinal"), None);
/// ```
pub fn chunk_ordinal(id: &str) -> Option<usize> {
    id.rsplit_once('_')
        .and_then(|(_, ordinal)| ordinal.parse().ok())
}

/// A window of words taken from the source text.
///
/// Immutable once created; `source_offset` is the index of the window's
/// first word in the whitespace-tokenized source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"<collection>_<ordinal>"`.
    pub id: String,

    /// Words of the window joined with single spaces.
    pub text: String,

    /// Word index of the first word of this window.
    pub source_offset: usize,
}

impl Chunk {
    /// Position of this chunk in its collection, parsed from the id.
    pub fn ordinal(&self) -> Option<usize> {
        chunk_ordinal(&self.id)
    }

    /// Number of words in the chunk.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// One ranked entry of a nearest-neighbor query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Id of the matching entry.
    pub id: String,

    /// Stored document text.
    pub text: String,

    /// Distance to the query; smaller is more similar.
    pub distance: f32,

    /// Chunk ordinal recovered from the id, when the id follows the
    /// `"<collection>_<ordinal>"` convention.
    pub ordinal: Option<usize>,
}

/// Ranked hits for one query, closest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Hits sorted by non-decreasing distance.
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True when the query matched nothing.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The closest hit, if any.
    pub fn top(&self) -> Option<&QueryHit> {
        self.hits.first()
    }

    /// Ordinals of the hits, in rank order, skipping ids without one.
    pub fn ordinals(&self) -> Vec<usize> {
        self.hits.iter().filter_map(|h| h.ordinal).collect()
    }

    /// Serializes the result for a rendering collaborator.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A point in the 3D visualization space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedPoint {
    /// First component.
    pub x: f32,
    /// Second component.
    pub y: f32,
    /// Third component.
    pub z: f32,
}

impl ReducedPoint {
    /// Creates a point from its coordinates.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The origin, used when a projection has to degrade.
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}
