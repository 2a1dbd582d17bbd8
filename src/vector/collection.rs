//! Named set of indexed entries backed by a [`VectorIndex`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, RagLensError, Result, ValidationError};
use crate::types::{chunk_ordinal, Embedding, QueryHit, QueryResult};

use super::{DistanceMetric, FlatIndex, VectorIndex};

/// Free-form string payload attached to an entry.
pub type Metadata = BTreeMap<String, String>;

/// One stored `(id, vector, text, metadata)` entry.
///
/// Entries are never mutated after insertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique id within the collection.
    pub id: String,
    /// Embedding vector.
    pub vector: Embedding,
    /// Document text returned with query hits.
    pub text: String,
    /// Optional payload.
    pub metadata: Metadata,
}

/// A named collection of entries and the index that searches them.
///
/// The entry at position `p` is registered in the index under id `p`, so
/// index results map straight back to entries.
pub struct Collection {
    name: String,
    entries: Vec<IndexEntry>,
    id_to_pos: HashMap<String, usize>,
    index: Box<dyn VectorIndex>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("len", &self.entries.len())
            .field("dimension", &self.index.dimension())
            .field("metric", &self.index.metric())
            .finish()
    }
}

impl Collection {
    /// Creates an empty collection searched by a [`FlatIndex`].
    pub fn new(name: impl Into<String>, metric: DistanceMetric) -> Self {
        Self::with_index(name, Box::new(FlatIndex::new(metric)))
    }

    /// Creates an empty collection searched by a caller-supplied index.
    ///
    /// The index must be empty.
    pub fn with_index(name: impl Into<String>, index: Box<dyn VectorIndex>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            id_to_pos: HashMap::new(),
            index,
        }
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts parallel sequences of ids, vectors and documents.
    ///
    /// Either every entry is inserted or none is.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the three sequences differ in length
    /// - `DuplicateId` if an id repeats within the batch or already exists
    /// - `DimensionMismatch` if a vector's length differs from the collection's
    pub fn add<S, T>(&mut self, ids: &[S], vectors: &[Embedding], documents: &[T]) -> Result<()>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let metadata = vec![Metadata::new(); ids.len()];
        self.add_with_metadata(ids, vectors, documents, &metadata)
    }

    /// Like [`Collection::add`], with one metadata map per entry.
    pub fn add_with_metadata<S, T>(
        &mut self,
        ids: &[S],
        vectors: &[Embedding],
        documents: &[T],
        metadata: &[Metadata],
    ) -> Result<()>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        if ids.len() != vectors.len() || ids.len() != documents.len() {
            return Err(IndexError::ShapeMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
                documents: documents.len(),
            }
            .into());
        }
        if metadata.len() != ids.len() {
            return Err(ValidationError::invalid_field(
                "metadata",
                format!("expected {} entries, got {}", ids.len(), metadata.len()),
            )
            .into());
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if self.id_to_pos.contains_key(id) || !seen.insert(id) {
                return Err(IndexError::DuplicateId(id.to_string()).into());
            }
        }

        if let Some(expected) = self.index.dimension().or(vectors.first().map(Vec::len)) {
            if let Some(v) = vectors.iter().find(|v| v.len() != expected) {
                return Err(IndexError::dimension_mismatch(expected, v.len()).into());
            }
        }

        let start = self.entries.len();
        let items: Vec<(&[f32], usize)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (v.as_slice(), start + i))
            .collect();
        if let Err(e) = self.index.insert_batch(&items) {
            self.index.truncate(start);
            return Err(e);
        }

        for (i, ((id, vector), text)) in ids.iter().zip(vectors).zip(documents).enumerate() {
            let id = id.as_ref().to_string();
            self.id_to_pos.insert(id.clone(), start + i);
            self.entries.push(IndexEntry {
                id,
                vector: vector.clone(),
                text: text.as_ref().to_string(),
                metadata: metadata[i].clone(),
            });
        }

        Ok(())
    }

    /// Returns the `top_k` entries nearest to `query`, closest first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `top_k` is zero and
    /// `DimensionMismatch` if the query length differs from the collection's.
    pub fn query(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        if top_k == 0 {
            return Err(RagLensError::config("top_k must be greater than 0"));
        }

        let hits = self
            .index
            .search(query, top_k)?
            .into_iter()
            .filter_map(|(pos, distance)| {
                self.entries.get(pos).map(|e| QueryHit {
                    id: e.id.clone(),
                    text: e.text.clone(),
                    distance,
                    ordinal: chunk_ordinal(&e.id),
                })
            })
            .collect();

        Ok(QueryResult { hits })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.id_to_pos.get(id).and_then(|&pos| self.entries.get(pos))
    }

    /// Vector dimension, once the first entry is in.
    pub fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    /// Metric used for ranking.
    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }
}
