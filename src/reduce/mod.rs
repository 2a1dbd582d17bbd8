//! Dimensionality reduction of embeddings for 3D display.
//!
//! Two methods are available, one [`Reducer`] per [`ReductionMethod`]
//! variant:
//!
//! - [`Pca`]: linear projection onto the top principal components
//! - [`NeighborEmbedding`]: UMAP-style layout that preserves local
//!   neighborhoods
//!
//! # Projecting a query with its corpus
//!
//! A query point is only comparable to corpus points if it went through the
//! same projection. [`project`] appends the query as the last row, reduces
//! the combined matrix once, and splits the last row back off. Projecting
//! the query separately would place it in an unrelated frame.
//!
//! ```rust
//! use raglens::reduce::{project, ReductionMethod};
//! use raglens::ManifoldConfig;
//!
//! let corpus: Vec<Vec<f32>> = (0..6)
//!     .map(|i| (0..8).map(|j| ((i * 8 + j) as f32 * 0.37).sin()).collect())
//!     .collect();
//! let query = corpus[2].clone();
//!
//! let projection = project(
//!     &corpus,
//!     Some(query.as_slice()),
//!     ReductionMethod::Linear,
//!     &ManifoldConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(projection.points.len(), 6);
//! assert!(projection.query.is_some());
//! ```

mod manifold;
mod pca;

pub use manifold::NeighborEmbedding;
pub use pca::Pca;

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ManifoldConfig;
use crate::error::{RagLensError, ReductionError, Result};
use crate::types::{Embedding, ReducedPoint};

/// Output dimension used for visualization.
pub const TARGET_DIM: usize = 3;

/// Selectable reduction algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionMethod {
    /// Principal component analysis.
    #[default]
    Linear,

    /// UMAP-style neighbor-preserving embedding.
    Manifold,
}

impl ReductionMethod {
    /// Both methods, in menu order.
    pub const ALL: [ReductionMethod; 2] = [Self::Linear, Self::Manifold];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Manifold => "manifold",
        }
    }

    /// Fewest input vectors that can be reduced to `target_dim` components.
    pub fn min_samples(&self, target_dim: usize) -> usize {
        match self {
            Self::Linear => target_dim,
            Self::Manifold => target_dim + 1,
        }
    }

    /// Builds the reducer implementing this method.
    pub fn reducer(&self, manifold: &ManifoldConfig) -> Box<dyn Reducer> {
        match self {
            Self::Linear => Box::new(Pca::new(manifold.seed)),
            Self::Manifold => Box::new(NeighborEmbedding::new(*manifold)),
        }
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReductionMethod {
    type Err = RagLensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "pca" => Ok(Self::Linear),
            "manifold" | "umap" => Ok(Self::Manifold),
            other => Err(RagLensError::config(format!(
                "unknown reduction method '{other}' (expected linear or manifold)"
            ))),
        }
    }
}

/// A dimensionality reduction algorithm.
///
/// Implementations receive an already validated `[n, d]` matrix with
/// `n >= method().min_samples(target_dim)` and must return `[n, target_dim]`.
pub trait Reducer: Send + Sync {
    /// The method this reducer implements.
    fn method(&self) -> ReductionMethod;

    /// Projects the rows of `data` to `target_dim` components.
    fn reduce(&self, data: &Array2<f64>, target_dim: usize) -> Result<Array2<f64>>;
}

/// Reduces `vectors` to `[n, target_dim]`.
///
/// # Errors
///
/// - `InvalidConfiguration` if `target_dim` is zero or the manifold settings
///   are invalid
/// - `EmptyInput` if there are no vectors or they have length zero
/// - `RaggedInput` if the vectors differ in length
/// - `InsufficientSamples` if `n` is below [`ReductionMethod::min_samples`]
#[instrument(skip(vectors, config), fields(n = vectors.len()))]
pub fn reduce(
    vectors: &[Embedding],
    method: ReductionMethod,
    target_dim: usize,
    config: &ManifoldConfig,
) -> Result<Array2<f32>> {
    if target_dim == 0 {
        return Err(RagLensError::config("target_dim must be greater than 0"));
    }
    if method == ReductionMethod::Manifold {
        config.validate()?;
    }

    let data = to_matrix(vectors)?;
    let required = method.min_samples(target_dim);
    if data.nrows() < required {
        return Err(ReductionError::InsufficientSamples {
            method: method.as_str(),
            required,
            got: data.nrows(),
        }
        .into());
    }

    let reduced = method.reducer(config).reduce(&data, target_dim)?;
    debug!(rows = reduced.nrows(), cols = reduced.ncols(), "Reduction complete");

    Ok(reduced.mapv(|v| v as f32))
}

/// Corpus and optional query points in one shared 3D frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// One point per corpus vector, in input order.
    pub points: Vec<ReducedPoint>,

    /// The query's point, when a query was supplied.
    pub query: Option<ReducedPoint>,
}

/// Projects `corpus` (and `query`, if any) to 3D in a single pass.
///
/// # Errors
///
/// Same as [`reduce`], counting the query as one more sample.
pub fn project(
    corpus: &[Embedding],
    query: Option<&[f32]>,
    method: ReductionMethod,
    config: &ManifoldConfig,
) -> Result<Projection> {
    let mut rows: Vec<Embedding> = Vec::with_capacity(corpus.len() + 1);
    rows.extend(corpus.iter().cloned());
    if let Some(q) = query {
        rows.push(q.to_vec());
    }

    let reduced = reduce(&rows, method, TARGET_DIM, config)?;
    let mut points = to_points(&reduced);

    let query = match query {
        Some(_) => points.pop(),
        None => None,
    };

    Ok(Projection { points, query })
}

/// Runs [`project`] on tokio's blocking pool.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Same as [`project`], plus `Task` if the blocking task panicked or was
/// cancelled.
pub async fn project_in_background(
    corpus: Vec<Embedding>,
    query: Option<Embedding>,
    method: ReductionMethod,
    config: ManifoldConfig,
) -> Result<Projection> {
    tokio::task::spawn_blocking(move || project(&corpus, query.as_deref(), method, &config))
        .await
        .map_err(|e| RagLensError::Task(e.to_string()))?
}

/// Converts the rows of a reduced matrix to points.
///
/// Missing components are zero and components past the third are ignored.
pub fn to_points(reduced: &Array2<f32>) -> Vec<ReducedPoint> {
    reduced
        .rows()
        .into_iter()
        .map(|row| {
            let c = |i: usize| row.get(i).copied().unwrap_or(0.0);
            ReducedPoint::new(c(0), c(1), c(2))
        })
        .collect()
}

fn to_matrix(vectors: &[Embedding]) -> Result<Array2<f64>> {
    let d = match vectors.first() {
        Some(v) if !v.is_empty() => v.len(),
        _ => return Err(ReductionError::EmptyInput.into()),
    };
    if let Some((row, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != d) {
        return Err(ReductionError::RaggedInput {
            row,
            expected: d,
            got: v.len(),
        }
        .into());
    }

    Ok(Array2::from_shape_fn((vectors.len(), d), |(i, j)| {
        vectors[i][j] as f64
    }))
}

/// Flips each column so its largest-magnitude entry is positive.
///
/// Eigenvectors are only defined up to sign; fixing it makes repeated runs
/// agree.
pub(crate) fn canonicalize_signs(m: &mut Array2<f64>) {
    for mut col in m.columns_mut() {
        let mut best = 0.0f64;
        for &v in col.iter() {
            if v.abs() > best.abs() {
                best = v;
            }
        }
        if best < 0.0 {
            col.mapv_inplace(|v| -v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize, d: usize) -> Vec<Embedding> {
        (0..n)
            .map(|i| (0..d).map(|j| ((i * d + j) as f32 * 0.37).sin()).collect())
            .collect()
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("PCA".parse::<ReductionMethod>().unwrap(), ReductionMethod::Linear);
        assert_eq!("linear".parse::<ReductionMethod>().unwrap(), ReductionMethod::Linear);
        assert_eq!(" umap ".parse::<ReductionMethod>().unwrap(), ReductionMethod::Manifold);
        assert_eq!("Manifold".parse::<ReductionMethod>().unwrap(), ReductionMethod::Manifold);
        assert!("tsne".parse::<ReductionMethod>().unwrap_err().is_config());
    }

    #[test]
    fn test_method_display_round_trips() {
        for m in ReductionMethod::ALL {
            assert_eq!(m.to_string().parse::<ReductionMethod>().unwrap(), m);
        }
    }

    #[test]
    fn test_min_samples() {
        assert_eq!(ReductionMethod::Linear.min_samples(3), 3);
        assert_eq!(ReductionMethod::Manifold.min_samples(3), 4);
    }

    #[test]
    fn test_reduce_shape() {
        let out = reduce(&sample(10, 16), ReductionMethod::Linear, 3, &ManifoldConfig::default())
            .unwrap();
        assert_eq!(out.dim(), (10, 3));
    }

    #[test]
    fn test_reduce_rejects_empty() {
        let err = reduce(&[], ReductionMethod::Linear, 3, &ManifoldConfig::default()).unwrap_err();
        assert!(matches!(err, RagLensError::Reduction(ReductionError::EmptyInput)));

        let err = reduce(&[vec![]], ReductionMethod::Linear, 3, &ManifoldConfig::default())
            .unwrap_err();
        assert!(matches!(err, RagLensError::Reduction(ReductionError::EmptyInput)));
    }

    #[test]
    fn test_reduce_rejects_ragged() {
        let vectors = vec![vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0]];
        let err = reduce(&vectors, ReductionMethod::Linear, 2, &ManifoldConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RagLensError::Reduction(ReductionError::RaggedInput { row: 2, expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_reduce_rejects_zero_target() {
        let err = reduce(&sample(5, 4), ReductionMethod::Linear, 0, &ManifoldConfig::default())
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_insufficient_samples() {
        let err = reduce(&sample(2, 8), ReductionMethod::Linear, 3, &ManifoldConfig::default())
            .unwrap_err();
        assert!(err.is_insufficient_samples());

        let err = reduce(&sample(3, 8), ReductionMethod::Manifold, 3, &ManifoldConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RagLensError::Reduction(ReductionError::InsufficientSamples {
                method: "manifold",
                required: 4,
                got: 3
            })
        ));
    }

    #[test]
    fn test_manifold_config_validated() {
        let config = ManifoldConfig {
            n_epochs: 0,
            ..Default::default()
        };
        let err = reduce(&sample(8, 4), ReductionMethod::Manifold, 3, &config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_project_splits_query_row() {
        let corpus = sample(6, 8);
        let projection = project(
            &corpus,
            Some(corpus[1].as_slice()),
            ReductionMethod::Linear,
            &ManifoldConfig::default(),
        )
        .unwrap();
        assert_eq!(projection.points.len(), 6);

        // The query duplicates corpus row 1, so they share a position
        let q = projection.query.unwrap();
        let p = projection.points[1];
        assert!((q.x - p.x).abs() < 1e-4);
        assert!((q.y - p.y).abs() < 1e-4);
        assert!((q.z - p.z).abs() < 1e-4);
    }

    #[test]
    fn test_project_without_query() {
        let projection = project(
            &sample(4, 8),
            None,
            ReductionMethod::Linear,
            &ManifoldConfig::default(),
        )
        .unwrap();
        assert_eq!(projection.points.len(), 4);
        assert!(projection.query.is_none());
    }

    #[test]
    fn test_to_points_pads() {
        let m = Array2::from_shape_vec((2, 2), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let points = to_points(&m);
        assert_eq!(points[1], ReducedPoint::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_canonicalize_signs() {
        let mut m = Array2::from_shape_vec((2, 2), vec![1.0, -3.0, -2.0, 1.0]).unwrap();
        canonicalize_signs(&mut m);
        assert_eq!(m[[0, 0]], -1.0);
        assert_eq!(m[[1, 0]], 2.0);
        assert_eq!(m[[0, 1]], 3.0);
    }
}
