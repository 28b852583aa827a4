//! Multivariate normal sampling through a regularized Cholesky factor.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{ADAPTIVE_JITTER_SCALE, BASE_JITTER, JITTER_GROWTH};
use crate::error::{Result, SimilarityError};
use crate::types::{Matrix, Vector};

/// Diagonal jitter that had to be added before a covariance factorised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regularization {
    /// Number of jittered attempts, including the successful one.
    pub attempts: u32,
    /// Jitter added to every diagonal entry on the successful attempt.
    pub jitter: f64,
}

/// Cholesky factorisation with escalating diagonal jitter.
///
/// The unmodified matrix is tried first. On failure, attempt `k` (from 0)
/// adds `(1e-10 + mean_diag·1e-8)·10^k` to the diagonal, up to
/// `max_attempts` times. A factor whose diagonal is not strictly positive
/// counts as a failure, so singular positive semi-definite matrices are
/// regularized rather than silently accepted.
///
/// Returns the lower-triangular factor and, if jitter was needed, how much.
pub fn regularized_cholesky(
    matrix: &Matrix,
    max_attempts: u32,
) -> Result<(Matrix, Option<Regularization>)> {
    if let Some(lower) = try_factor(matrix.clone()) {
        return Ok((lower, None));
    }

    let n = matrix.nrows();
    let mean_diag = if n == 0 {
        0.0
    } else {
        (matrix.trace() / n as f64).max(0.0)
    };
    let base = BASE_JITTER + mean_diag * ADAPTIVE_JITTER_SCALE;

    let mut tried = Vec::with_capacity(max_attempts as usize);
    for k in 0..max_attempts {
        let jitter = base * JITTER_GROWTH.powi(k as i32);
        tried.push(jitter);
        let mut jittered = matrix.clone();
        for i in 0..n {
            jittered[(i, i)] += jitter;
        }
        if let Some(lower) = try_factor(jittered) {
            let regularization = Regularization {
                attempts: k + 1,
                jitter,
            };
            warn!(
                dimension = n,
                attempts = regularization.attempts,
                jitter,
                "covariance was not positive definite; regularized with diagonal jitter"
            );
            return Ok((lower, Some(regularization)));
        }
    }

    Err(SimilarityError::CovarianceSingular { attempts: tried })
}

fn try_factor(matrix: Matrix) -> Option<Matrix> {
    let lower = matrix.cholesky()?.unpack();
    lower
        .diagonal()
        .iter()
        .all(|d| d.is_finite() && *d > 0.0)
        .then_some(lower)
}

/// Sampler for `N(mean, Σ)`.
///
/// Components with an all-zero row and column in `Σ` are held at their mean
/// and left out of the factorisation.
#[derive(Debug, Clone)]
pub struct CorrelatedNormal {
    mean: Vector,
    active: Vec<usize>,
    lower: Matrix,
    regularization: Option<Regularization>,
}

impl CorrelatedNormal {
    /// Factorise `covariance` for sampling around `mean`.
    pub fn new(mean: Vector, covariance: &Matrix, max_attempts: u32) -> Result<Self> {
        let n = mean.len();
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(SimilarityError::invalid_input(format!(
                "covariance is {}x{}, expected {n}x{n}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        if covariance.iter().any(|x| !x.is_finite()) {
            return Err(SimilarityError::invalid_input(
                "covariance contains non-finite entries",
            ));
        }

        let active: Vec<usize> = (0..n)
            .filter(|&i| {
                covariance.row(i).iter().any(|x| *x != 0.0)
                    || covariance.column(i).iter().any(|x| *x != 0.0)
            })
            .collect();
        let m = active.len();
        let reduced = Matrix::from_fn(m, m, |r, c| covariance[(active[r], active[c])]);
        let (lower, regularization) = regularized_cholesky(&reduced, max_attempts)?;

        Ok(Self {
            mean,
            active,
            lower,
            regularization,
        })
    }

    /// Draw one sample.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector {
        let m = self.active.len();
        let z = Vector::from_iterator(m, (0..m).map(|_| rng.sample::<f64, _>(StandardNormal)));
        let perturbation = &self.lower * z;
        let mut x = self.mean.clone();
        for (k, &i) in self.active.iter().enumerate() {
            x[i] += perturbation[k];
        }
        x
    }

    /// Jitter that was needed to factorise, if any.
    pub fn regularization(&self) -> Option<Regularization> {
        self.regularization
    }

    /// Number of components that actually vary.
    pub fn active_dimension(&self) -> usize {
        self.active.len()
    }
}
