//! Principal component analysis by orthogonal subspace iteration.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{ReductionError, Result};

use super::{canonicalize_signs, ReductionMethod, Reducer};

const MAX_ITERATIONS: usize = 300;
/// Residual bound, relative to the trace.
const TOLERANCE: f64 = 1e-6;
/// Extra basis vectors iterated alongside the wanted ones.
const OVERSAMPLE: usize = 4;

/// Linear projection onto the top principal components.
///
/// The eigenproblem is solved on whichever of the Gram matrix (`n x n`) and
/// the covariance matrix (`d x d`) is smaller, so a few dozen chunks of a
/// 768-dimensional model cost a few dozen-square matrix, not a 768-square
/// one. Output columns are ordered by decreasing variance and each has its
/// largest-magnitude coordinate positive.
#[derive(Clone, Debug)]
pub struct Pca {
    seed: u64,
}

impl Pca {
    /// Creates a reducer; `seed` only picks the starting subspace.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Top `r` eigenpairs of the symmetric positive semi-definite matrix
    /// `a`, eigenvalues descending, plus the iterations spent.
    fn top_eigenpairs(&self, a: &Array2<f64>, r: usize) -> (Array1<f64>, Array2<f64>, usize) {
        let m = a.nrows();
        let block = (r + OVERSAMPLE).min(m);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut q = Array2::from_shape_fn((m, block), |_| rng.gen_range(-1.0..1.0));
        orthonormalize(&mut q);

        let trace = a.diag().sum();
        let threshold = TOLERANCE * trace.max(f64::MIN_POSITIVE);
        let mut iterations = 0;

        while iterations < MAX_ITERATIONS {
            iterations += 1;
            let mut z = a.dot(&q);
            orthonormalize(&mut z);

            let (values, rotated) = rayleigh_ritz(a, &z);
            q = rotated;

            let wanted = q.slice(ndarray::s![.., ..r]);
            let residual = a.dot(&wanted) - &wanted * &values.slice(ndarray::s![..r]);
            let worst = residual
                .columns()
                .into_iter()
                .map(|c| c.dot(&c).sqrt())
                .fold(0.0f64, f64::max);
            if worst <= threshold {
                break;
            }
        }

        let (values, q) = rayleigh_ritz(a, &q);
        debug!(iterations, eigenvalues = ?values.to_vec(), "PCA eigensolve finished");
        (
            values.slice(ndarray::s![..r]).to_owned(),
            q.slice(ndarray::s![.., ..r]).to_owned(),
            iterations,
        )
    }
}

impl Default for Pca {
    fn default() -> Self {
        Self::new(42)
    }
}

impl Reducer for Pca {
    fn method(&self) -> ReductionMethod {
        ReductionMethod::Linear
    }

    fn reduce(&self, data: &Array2<f64>, target_dim: usize) -> Result<Array2<f64>> {
        let (n, d) = data.dim();
        if n < target_dim {
            return Err(ReductionError::InsufficientSamples {
                method: ReductionMethod::Linear.as_str(),
                required: target_dim,
                got: n,
            }
            .into());
        }

        let mean = data.mean_axis(Axis(0)).ok_or(ReductionError::EmptyInput)?;
        let centered = data - &mean;

        // Components beyond d do not exist; they stay zero columns
        let r = target_dim.min(d);

        let directions = if n <= d {
            let gram = centered.dot(&centered.t());
            let (_, v, _) = self.top_eigenpairs(&gram, r);
            // Map sample-space eigenvectors back to feature space
            let mut w = centered.t().dot(&v);
            normalize_columns(&mut w);
            w
        } else {
            let covariance = centered.t().dot(&centered);
            let (_, w, _) = self.top_eigenpairs(&covariance, r);
            w
        };

        let mut coords = Array2::zeros((n, target_dim));
        coords
            .slice_mut(ndarray::s![.., ..r])
            .assign(&centered.dot(&directions));
        canonicalize_signs(&mut coords);

        Ok(coords)
    }
}

/// Modified Gram-Schmidt on the columns of `m`.
///
/// Columns that collapse to (numerically) zero are set to exactly zero.
fn orthonormalize(m: &mut Array2<f64>) {
    let cols = m.ncols();
    for j in 0..cols {
        for i in 0..j {
            let prev = m.column(i).to_owned();
            let proj = prev.dot(&m.column(j));
            m.column_mut(j).scaled_add(-proj, &prev);
        }
        let norm = m.column(j).dot(&m.column(j)).sqrt();
        if norm > 1e-12 {
            m.column_mut(j).mapv_inplace(|v| v / norm);
        } else {
            m.column_mut(j).fill(0.0);
        }
    }
}

fn normalize_columns(m: &mut Array2<f64>) {
    for mut col in m.columns_mut() {
        let norm = col.dot(&col).sqrt();
        if norm > 1e-12 {
            col.mapv_inplace(|v| v / norm);
        } else {
            col.fill(0.0);
        }
    }
}

/// Rotates the basis `q` to the eigenvectors of `qᵀ a q`, sorted by
/// decreasing eigenvalue.
fn rayleigh_ritz(a: &Array2<f64>, q: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let t = q.t().dot(&a.dot(q));
    let (values, vectors) = jacobi_eigen(&t);

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].total_cmp(&values[i]).then(i.cmp(&j)));

    let sorted_values = Array1::from_iter(order.iter().map(|&i| values[i]));
    let sorted_vectors = vectors.select(Axis(1), &order);

    (sorted_values, q.dot(&sorted_vectors))
}

/// Eigen-decomposition of a small symmetric matrix by cyclic Jacobi
/// rotations. Returns unsorted eigenvalues and eigenvectors as columns.
fn jacobi_eigen(m: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = m.nrows();
    let mut a = m.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..100 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off < 1e-30 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
