//! Vector index abstractions for nearest-neighbor search.
//!
//! This module provides a trait-based abstraction over vector indexes and
//! the named collections built on top of them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │           VectorStore            │  name → Collection, generation handles
//! └──────────┬───────────────────────┘
//!            │
//! ┌──────────┴───────────────────────┐
//! │           Collection             │  (id, vector, text, metadata) entries
//! └──────────┬───────────────────────┘
//!            │
//! ┌──────────┴───────────────────────┐
//! │        VectorIndex trait         │
//! └──────────┬───────────────────────┘
//!            │
//!    ┌───────┴────────┐
//!    │   FlatIndex    │  (exact linear scan)
//!    └────────────────┘
//! ```
//!
//! Collections here hold at most a few thousand chunks, so the default
//! index is an exact scan. A graph or tree index can be plugged in through
//! [`Collection::with_index`] without touching callers.

mod collection;
mod flat;
mod store;

pub use collection::{Collection, IndexEntry, Metadata};
pub use flat::FlatIndex;
pub use store::{CollectionHandle, VectorStore};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Distance metric used to rank neighbors.
///
/// Both metrics grow as vectors become less similar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`. A zero vector is at distance 1.0 from
    /// everything.
    #[default]
    Cosine,

    /// `Σ (a_i - b_i)²`.
    SquaredEuclidean,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                let denom = norm_a.sqrt() * norm_b.sqrt();
                if denom > 0.0 {
                    // Rounding can push the ratio slightly past ±1
                    (1.0 - dot / denom).clamp(0.0, 2.0)
                } else {
                    1.0
                }
            }
            Self::SquaredEuclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }
}

/// Vector index trait for nearest-neighbor search.
///
/// IDs are `usize` positions assigned by the owning [`Collection`];
/// implementations never see the string ids.
pub trait VectorIndex: Send + Sync {
    /// Inserts a single vector with the given ID.
    fn insert(&mut self, id: usize, embedding: &[f32]) -> Result<()>;

    /// Inserts a batch of vectors, all or nothing.
    ///
    /// On error the index is truncated back to its length before the call.
    fn insert_batch(&mut self, items: &[(&[f32], usize)]) -> Result<()> {
        let before = self.len();
        for (embedding, id) in items {
            if let Err(e) = self.insert(*id, embedding) {
                self.truncate(before);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drops every vector inserted after the first `len`.
    fn truncate(&mut self, len: usize);

    /// Searches for the k nearest neighbors to the query vector.
    ///
    /// Returns `(id, distance)` pairs sorted by distance ascending
    /// (closest first). Equal distances keep insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;

    /// Dimension fixed by construction or by the first insert.
    fn dimension(&self) -> Option<usize>;

    /// The metric results are ranked by.
    fn metric(&self) -> DistanceMetric;

    /// Returns the number of vectors.
    fn len(&self) -> usize;

    /// Returns true if the index has no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
