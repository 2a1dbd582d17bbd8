//! Exact nearest-neighbor index using a linear scan.

use crate::error::{IndexError, Result};

use super::{DistanceMetric, VectorIndex};

/// Brute-force index: every search computes the distance to every vector.
///
/// Results are exact and deterministic. Equal distances rank in insertion
/// order.
#[derive(Clone, Debug)]
pub struct FlatIndex {
    metric: DistanceMetric,
    dimension: Option<usize>,
    /// Dimension was given at construction, not taken from an insert.
    fixed_dimension: bool,
    /// `(id, vector)` in insertion order.
    vectors: Vec<(usize, Vec<f32>)>,
}

impl FlatIndex {
    /// Creates an empty index; the dimension is fixed by the first insert.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimension: None,
            fixed_dimension: false,
            vectors: Vec::new(),
        }
    }

    /// Creates an empty index that only accepts `dimension`-long vectors.
    pub fn with_dimension(metric: DistanceMetric, dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            fixed_dimension: true,
            ..Self::new(metric)
        }
    }

    fn check_dimension(&self, got: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != got => {
                Err(IndexError::dimension_mismatch(expected, got).into())
            }
            _ => Ok(()),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&mut self, id: usize, embedding: &[f32]) -> Result<()> {
        self.check_dimension(embedding.len())?;
        self.dimension = Some(embedding.len());
        self.vectors.push((id, embedding.to_vec()));
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let mut scored: Vec<(usize, usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, (id, v))| (pos, *id, self.metric.distance(query, v)))
            .collect();

        // NaN sorts last
        scored.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, id, d)| (id, d)).collect())
    }

    fn truncate(&mut self, len: usize) {
        self.vectors.truncate(len);
        if self.vectors.is_empty() && !self.fixed_dimension {
            self.dimension = None;
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
