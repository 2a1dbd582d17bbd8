//! UMAP-style neighbor-preserving embedding.
//!
//! The layout is built in four steps:
//!
//! 1. exact k-nearest-neighbor graph under Euclidean distance
//! 2. per-point smooth kernel (`rho`, `sigma`) turning distances into
//!    membership strengths, symmetrized with a fuzzy union
//! 3. PCA initialization scaled to a fixed extent
//! 4. stochastic gradient descent on the cross-entropy between the graph
//!    and the low-dimensional similarities `1 / (1 + a d^(2b))`, with
//!    negative sampling
//!
//! Every random choice comes from a `StdRng` seeded by
//! [`ManifoldConfig::seed`], so a given input and seed always yield the same
//! layout.

use std::collections::BTreeMap;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::ManifoldConfig;
use crate::error::{ReductionError, Result};

use super::{Pca, ReductionMethod, Reducer};

/// Target entropy tolerance for the sigma search.
const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const INIT_EXTENT: f64 = 10.0;
const GRADIENT_CLIP: f64 = 4.0;

/// Neighbor embedding reducer (see the module docs).
#[derive(Clone, Debug)]
pub struct NeighborEmbedding {
    config: ManifoldConfig,
}

/// Directed edge of the fuzzy graph.
#[derive(Clone, Copy, Debug)]
struct Edge {
    head: usize,
    tail: usize,
    weight: f64,
}

impl NeighborEmbedding {
    /// Creates a reducer with the given tuning.
    pub fn new(config: ManifoldConfig) -> Self {
        Self { config }
    }

    /// The tuning in use.
    pub fn config(&self) -> &ManifoldConfig {
        &self.config
    }

    fn optimize(&self, embedding: &mut Array2<f64>, edges: &[Edge], a: f64, b: f64, rng: &mut StdRng) {
        let n = embedding.nrows();
        let dim = embedding.ncols();
        let n_epochs = self.config.n_epochs;
        let negative_rate = self.config.negative_sample_rate;

        let max_weight = edges.iter().fold(0.0f64, |m, e| m.max(e.weight));
        let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
        let epochs_per_negative: Vec<f64> = epochs_per_sample
            .iter()
            .map(|eps| eps / negative_rate.max(1) as f64)
            .collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();

        let mut delta = vec![0.0f64; dim];

        for epoch in 0..n_epochs {
            let alpha =
                self.config.learning_rate as f64 * (1.0 - epoch as f64 / n_epochs as f64);
            let now = epoch as f64;

            for (e, edge) in edges.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }
                let (j, k) = (edge.head, edge.tail);

                // Attraction along the edge
                let d2 = squared_distance(embedding, j, k, &mut delta);
                let coeff = if d2 > 0.0 {
                    -2.0 * a * b * d2.powf(b - 1.0) / (1.0 + a * d2.powf(b))
                } else {
                    0.0
                };
                for (c, dc) in delta.iter().enumerate() {
                    let grad = clip(coeff * dc) * alpha;
                    embedding[[j, c]] += grad;
                    embedding[[k, c]] -= grad;
                }
                next_sample[e] += epochs_per_sample[e];

                if negative_rate == 0 {
                    continue;
                }

                // Repulsion from random points
                let n_negative = ((now - next_negative[e]) / epochs_per_negative[e]).floor();
                let n_negative = if n_negative > 0.0 { n_negative as usize } else { 0 };
                for _ in 0..n_negative {
                    let k = rng.gen_range(0..n);
                    if k == j {
                        continue;
                    }
                    let d2 = squared_distance(embedding, j, k, &mut delta);
                    let coeff = if d2 > 0.0 {
                        2.0 * b / ((0.001 + d2) * (1.0 + a * d2.powf(b)))
                    } else {
                        0.0
                    };
                    for (c, dc) in delta.iter().enumerate() {
                        let grad = if coeff > 0.0 {
                            clip(coeff * dc)
                        } else {
                            GRADIENT_CLIP
                        };
                        embedding[[j, c]] += grad * alpha;
                    }
                }
                next_negative[e] += n_negative as f64 * epochs_per_negative[e];
            }
        }
    }
}

impl Default for NeighborEmbedding {
    fn default() -> Self {
        Self::new(ManifoldConfig::default())
    }
}

impl Reducer for NeighborEmbedding {
    fn method(&self) -> ReductionMethod {
        ReductionMethod::Manifold
    }

    fn reduce(&self, data: &Array2<f64>, target_dim: usize) -> Result<Array2<f64>> {
        let n = data.nrows();
        let required = ReductionMethod::Manifold.min_samples(target_dim);
        if n < required {
            return Err(ReductionError::InsufficientSamples {
                method: ReductionMethod::Manifold.as_str(),
                required,
                got: n,
            }
            .into());
        }

        let k = self.config.n_neighbors.min(n - 1);
        let (knn_idx, knn_dist) = nearest_neighbors(data, k);
        let edges = fuzzy_graph(&knn_idx, &knn_dist, self.config.n_epochs);
        let (a, b) = fit_ab(self.config.spread as f64, self.config.min_dist as f64);
        debug!(n, k, edges = edges.len(), a, b, "Manifold graph built");

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut embedding = initialize(data, target_dim, self.config.seed, &mut rng)?;

        if !edges.is_empty() {
            self.optimize(&mut embedding, &edges, a, b, &mut rng);
        }
        debug!(epochs = self.config.n_epochs, "Manifold layout optimized");

        Ok(embedding)
    }
}

#[inline]
fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

/// Writes `y_j - y_k` into `delta` and returns its squared norm.
fn squared_distance(y: &Array2<f64>, j: usize, k: usize, delta: &mut [f64]) -> f64 {
    let mut d2 = 0.0;
    for (c, slot) in delta.iter_mut().enumerate() {
        let diff = y[[j, c]] - y[[k, c]];
        *slot = diff;
        d2 += diff * diff;
    }
    d2
}

/// Exact k nearest neighbors of every row, excluding the row itself.
///
/// Ties are broken by row index.
fn nearest_neighbors(data: &Array2<f64>, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let n = data.nrows();
    let mut idx = Vec::with_capacity(n);
    let mut dist = Vec::with_capacity(n);

    for i in 0..n {
        let row = data.row(i);
        let mut others: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| {
                let diff = &row - &data.row(j);
                (j, diff.dot(&diff).sqrt())
            })
            .collect();
        others.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
        others.truncate(k);

        idx.push(others.iter().map(|o| o.0).collect());
        dist.push(others.iter().map(|o| o.1).collect());
    }

    (idx, dist)
}

/// Finds `(rho, sigma)` for one point so the membership strengths of its
/// neighbors sum to `log2(k)`.
fn smooth_knn(distances: &[f64], mean_all: f64) -> (f64, f64) {
    let k = distances.len();
    let target = (k as f64).log2();
    let rho = distances.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

    let mut lo = 0.0;
    let mut hi = f64::INFINITY;
    let mut sigma = 1.0;

    for _ in 0..64 {
        let sum: f64 = distances
            .iter()
            .map(|&d| {
                let x = d - rho;
                if x > 0.0 {
                    (-x / sigma).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (sum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if sum > target {
            hi = sigma;
            sigma = (lo + hi) / 2.0;
        } else {
            lo = sigma;
            sigma = if hi.is_infinite() { sigma * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let floor = if rho > 0.0 {
        MIN_K_DIST_SCALE * distances.iter().sum::<f64>() / k as f64
    } else {
        MIN_K_DIST_SCALE * mean_all
    };
    (rho, sigma.max(floor).max(f64::MIN_POSITIVE))
}

/// Symmetric fuzzy neighbor graph as a list of directed edges.
///
/// Directed strengths `w_ij` are combined with the fuzzy union
/// `w_ij + w_ji - w_ij * w_ji`; each undirected edge appears in both
/// directions. Edges too weak to be sampled within `n_epochs` are dropped.
fn fuzzy_graph(knn_idx: &[Vec<usize>], knn_dist: &[Vec<f64>], n_epochs: usize) -> Vec<Edge> {
    let n_dists: usize = knn_dist.iter().map(Vec::len).sum();
    let mean_all = if n_dists > 0 {
        knn_dist.iter().flatten().sum::<f64>() / n_dists as f64
    } else {
        0.0
    };

    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, (neighbors, distances)) in knn_idx.iter().zip(knn_dist).enumerate() {
        let (rho, sigma) = smooth_knn(distances, mean_all);
        for (&j, &d) in neighbors.iter().zip(distances) {
            let x = d - rho;
            let w = if x > 0.0 { (-x / sigma).exp() } else { 1.0 };
            directed.insert((i, j), w);
        }
    }

    let mut undirected: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let key = (i.min(j), i.max(j));
        if undirected.contains_key(&key) {
            continue;
        }
        let w_rev = directed.get(&(j, i)).copied().unwrap_or(0.0);
        undirected.insert(key, w + w_rev - w * w_rev);
    }

    let max_weight = undirected.values().fold(0.0f64, |m, &w| m.max(w));
    let min_weight = max_weight / n_epochs as f64;

    let mut edges = Vec::with_capacity(undirected.len() * 2);
    for (&(i, j), &w) in &undirected {
        if w <= 0.0 || w < min_weight {
            continue;
        }
        edges.push(Edge { head: i, tail: j, weight: w });
        edges.push(Edge { head: j, tail: i, weight: w });
    }
    edges
}

/// Fits `a`, `b` so that `1 / (1 + a x^(2b))` approximates the target
/// curve: 1 below `min_dist`, then `exp(-(x - min_dist) / spread)`.
///
/// Least squares over 300 samples on `[0, 3 * spread]`, solved by a
/// coarse log-spaced grid followed by successive local refinement.
pub(crate) fn fit_ab(spread: f64, min_dist: f64) -> (f64, f64) {
    const SAMPLES: usize = 300;
    let xs: Vec<f64> = (0..SAMPLES)
        .map(|i| 3.0 * spread * i as f64 / (SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();

    let loss = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let f = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (f - y) * (f - y)
            })
            .sum()
    };

    // Coarse grid in log space
    let (mut best_a, mut best_b, mut best) = (1.0, 1.0, f64::INFINITY);
    for i in 0..=60 {
        let a = 10f64.powf(-2.0 + 4.0 * i as f64 / 60.0);
        for j in 0..=60 {
            let b = 0.1 + 2.9 * j as f64 / 60.0;
            let l = loss(a, b);
            if l < best {
                (best_a, best_b, best) = (a, b, l);
            }
        }
    }

    // Shrinking local refinement
    let (mut step_a, mut step_b) = (best_a * 0.2, 0.05);
    for _ in 0..40 {
        let mut improved = false;
        for da in [-1.0, 0.0, 1.0] {
            for db in [-1.0, 0.0, 1.0] {
                let a = (best_a + da * step_a).max(1e-6);
                let b = (best_b + db * step_b).max(1e-3);
                let l = loss(a, b);
                if l < best {
                    (best_a, best_b, best) = (a, b, l);
                    improved = true;
                }
            }
        }
        if !improved {
            step_a *= 0.5;
            step_b *= 0.5;
        }
    }

    (best_a, best_b)
}

/// PCA layout scaled so the largest coordinate is [`INIT_EXTENT`], plus a
/// little noise so coincident points can separate.
fn initialize(
    data: &Array2<f64>,
    target_dim: usize,
    seed: u64,
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    let n = data.nrows();
    let mut init = if n >= target_dim {
        Pca::new(seed).reduce(data, target_dim)?
    } else {
        Array2::zeros((n, target_dim))
    };

    let max_abs = init.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if max_abs > 0.0 {
        let scale = INIT_EXTENT / max_abs;
        init.mapv_inplace(|v| v * scale + rng.gen_range(-1e-4..1e-4));
    } else {
        init.mapv_inplace(|_| rng.gen_range(-INIT_EXTENT..INIT_EXTENT));
    }

    Ok(init)
}
