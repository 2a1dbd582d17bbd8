//! Per-session registry of named collections.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{IndexError, Result};
use crate::types::{Embedding, QueryResult};

use super::{Collection, DistanceMetric, Metadata};

/// Refers to one generation of a named collection.
///
/// Replacing the collection bumps its generation, so handles taken before
/// the replacement are rejected instead of silently reading the new data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: String,
    generation: u64,
}

impl CollectionHandle {
    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generation this handle was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Slot {
    generation: u64,
    collection: Collection,
}

/// In-memory collections owned by a single session.
pub struct VectorStore {
    metric: DistanceMetric,
    collections: HashMap<String, Slot>,
    next_generation: u64,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("metric", &self.metric)
            .field("collections", &self.names())
            .finish()
    }
}

impl VectorStore {
    /// Creates an empty store whose collections rank with `metric`.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            collections: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Metric new collections are created with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Resets `name` to an empty collection and returns a fresh handle.
    pub fn create_or_replace(&mut self, name: &str) -> CollectionHandle {
        self.replace_with(Collection::new(name, self.metric))
    }

    /// Installs a fully built collection under its own name.
    ///
    /// Any previous collection of that name is dropped and its handles go
    /// stale.
    pub fn replace_with(&mut self, collection: Collection) -> CollectionHandle {
        let generation = self.next_generation;
        self.next_generation += 1;

        let name = collection.name().to_string();
        debug!(collection = %name, generation, entries = collection.len(), "Collection installed");
        self.collections.insert(
            name.clone(),
            Slot {
                generation,
                collection,
            },
        );

        CollectionHandle { name, generation }
    }

    /// Bulk-inserts entries into the collection behind `handle`.
    ///
    /// # Errors
    ///
    /// Fails with the handle errors of [`VectorStore::collection`] and the
    /// insert errors of [`Collection::add`].
    pub fn add<S, T>(
        &mut self,
        handle: &CollectionHandle,
        ids: &[S],
        vectors: &[Embedding],
        documents: &[T],
    ) -> Result<()>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        self.collection_mut(handle)?.add(ids, vectors, documents)
    }

    /// Like [`VectorStore::add`], with one metadata map per entry.
    pub fn add_with_metadata<S, T>(
        &mut self,
        handle: &CollectionHandle,
        ids: &[S],
        vectors: &[Embedding],
        documents: &[T],
        metadata: &[Metadata],
    ) -> Result<()>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        self.collection_mut(handle)?
            .add_with_metadata(ids, vectors, documents, metadata)
    }

    /// Nearest-neighbor query against the collection behind `handle`.
    pub fn query(
        &self,
        handle: &CollectionHandle,
        query: &[f32],
        top_k: usize,
    ) -> Result<QueryResult> {
        self.collection(handle)?.query(query, top_k)
    }

    /// Resolves a handle.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` if the name is not registered and
    /// `StaleHandle` if the collection was replaced after the handle was
    /// issued.
    pub fn collection(&self, handle: &CollectionHandle) -> Result<&Collection> {
        let slot = self.slot(handle)?;
        Ok(&slot.collection)
    }

    fn collection_mut(&mut self, handle: &CollectionHandle) -> Result<&mut Collection> {
        let slot = self
            .collections
            .get_mut(&handle.name)
            .ok_or_else(|| IndexError::UnknownCollection(handle.name.clone()))?;
        if slot.generation != handle.generation {
            return Err(IndexError::StaleHandle {
                name: handle.name.clone(),
            }
            .into());
        }
        Ok(&mut slot.collection)
    }

    fn slot(&self, handle: &CollectionHandle) -> Result<&Slot> {
        let slot = self
            .collections
            .get(&handle.name)
            .ok_or_else(|| IndexError::UnknownCollection(handle.name.clone()))?;
        if slot.generation != handle.generation {
            return Err(IndexError::StaleHandle {
                name: handle.name.clone(),
            }
            .into());
        }
        Ok(slot)
    }

    /// Drops a collection by name. Returns true if it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.collections.remove(name).is_some()
    }

    /// Registered collection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// True when no collection is registered.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagLensError;

    #[test]
    fn test_create_add_query() {
        let mut store = VectorStore::default();
        let h = store.create_or_replace("t1");
        store
            .add(&h, &["t1_0", "t1_1"], &[vec![1.0, 0.0], vec![0.0, 1.0]], &["a", "b"])
            .unwrap();

        let result = store.query(&h, &[0.1, 0.9], 5).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.hits[0].id, "t1_1");
    }

    #[test]
    fn test_create_or_replace_resets() {
        let mut store = VectorStore::default();
        let old = store.create_or_replace("t1");
        store.add(&old, &["t1_0"], &[vec![1.0]], &["a"]).unwrap();

        let new = store.create_or_replace("t1");
        assert_ne!(old.generation(), new.generation());
        assert!(store.collection(&new).unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut store = VectorStore::default();
        let old = store.create_or_replace("t1");
        store.create_or_replace("t1");

        let err = store.query(&old, &[1.0], 1).unwrap_err();
        assert!(matches!(err, RagLensError::Index(IndexError::StaleHandle { .. })));
        assert!(store.add(&old, &["x"], &[vec![1.0]], &["x"]).is_err());
    }

    #[test]
    fn test_unknown_collection() {
        let mut store = VectorStore::default();
        let h = store.create_or_replace("t1");
        assert!(store.remove("t1"));
        assert!(!store.remove("t1"));

        let err = store.collection(&h).unwrap_err();
        assert!(matches!(err, RagLensError::Index(IndexError::UnknownCollection(_))));
    }

    #[test]
    fn test_replace_with_built_collection() {
        let mut store = VectorStore::new(DistanceMetric::SquaredEuclidean);
        let mut staged = Collection::new("b", store.metric());
        staged.add(&["b_0"], &[vec![2.0, 2.0]], &["two"]).unwrap();

        let h = store.replace_with(staged);
        assert_eq!(h.name(), "b");
        assert_eq!(store.collection(&h).unwrap().len(), 1);
        store.create_or_replace("a");
        assert_eq!(store.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
