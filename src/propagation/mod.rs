//! Uncertainty of similarity indices.
//!
//! Two independent methods are provided so their outputs can be cross-checked:
//!
//! - [`propagate_linear`]: first-order Taylor expansion, `σ² = gᵀ Σx g`
//! - [`propagate_sampling`]: Monte Carlo over `x = [Sa; Sb] ~ N(x0, Σx)`
//!
//! Both take the uncertainty of the stacked sensitivity vector as a
//! [`SensitivityCovariance`].

mod linear;
mod sampling;

pub use linear::propagate_linear;
pub use sampling::{propagate_sampling, SampleBudget, SamplingConfig, SamplingSummary};

use serde::{Deserialize, Serialize};

use crate::align::AlignedPair;
use crate::error::{Result, SimilarityError};
use crate::types::Matrix;

/// Covariance of the stacked sensitivity vector `[Sa; Sb]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SensitivityCovariance {
    /// Every component independent: `diag(σa²) ⊕ diag(σb²)`.
    #[default]
    Independent,
    /// Matching components of `Sa` and `Sb` fully correlated, as when both
    /// profiles come from the same calculation.
    FullyCorrelated,
    /// Caller-supplied `2n × 2n` matrix over the aligned index.
    Explicit(Matrix),
}

impl SensitivityCovariance {
    /// Materialise `Σx` for `pair`.
    pub fn build(&self, pair: &AlignedPair) -> Result<Matrix> {
        let n = pair.len();
        let sa = pair.application_std();
        let sb = pair.benchmark_std();
        match self {
            Self::Independent | Self::FullyCorrelated => {
                let mut m = Matrix::zeros(2 * n, 2 * n);
                for i in 0..n {
                    m[(i, i)] = sa[i] * sa[i];
                    m[(n + i, n + i)] = sb[i] * sb[i];
                    if matches!(self, Self::FullyCorrelated) {
                        m[(i, n + i)] = sa[i] * sb[i];
                        m[(n + i, i)] = sa[i] * sb[i];
                    }
                }
                Ok(m)
            }
            Self::Explicit(m) => {
                if m.nrows() != 2 * n || m.ncols() != 2 * n {
                    return Err(SimilarityError::invalid_input(format!(
                        "sensitivity covariance is {}x{}, expected {}x{}",
                        m.nrows(),
                        m.ncols(),
                        2 * n,
                        2 * n
                    )));
                }
                if m.iter().any(|x| !x.is_finite()) {
                    return Err(SimilarityError::invalid_input(
                        "sensitivity covariance contains non-finite entries",
                    ));
                }
                Ok(m.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;
    use crate::profile::{EnergyGrid, GroupSensitivities, SensitivityProfile};
    use crate::types::NuclideReaction;

    fn pair() -> AlignedPair {
        let grid = EnergyGrid::new(vec![2.0e7, 1.0, 1.0e-5]).unwrap();
        let p = |name: &str, v: Vec<f64>, s: Vec<f64>| {
            SensitivityProfile::new(
                name,
                grid.clone(),
                [(NuclideReaction::new("u-235", "fission"), GroupSensitivities::new(v, s).unwrap())],
            )
            .unwrap()
        };
        align(&p("a", vec![0.5, 0.3], vec![0.1, 0.2]), &p("b", vec![0.4, 0.2], vec![0.3, 0.4])).unwrap()
    }

    #[test]
    fn independent_is_block_diagonal() {
        let m = SensitivityCovariance::Independent.build(&pair()).unwrap();
        assert_eq!(m.nrows(), 4);
        let diag: Vec<f64> = m.diagonal().iter().copied().collect();
        for (got, want) in diag.iter().zip([0.01, 0.04, 0.09, 0.16]) {
            assert!((got - want).abs() < 1e-15);
        }
        assert_eq!(m[(0, 2)], 0.0);
    }

    #[test]
    fn fully_correlated_couples_matching_components() {
        let m = SensitivityCovariance::FullyCorrelated.build(&pair()).unwrap();
        assert!((m[(0, 2)] - 0.03).abs() < 1e-15);
        assert!((m[(3, 1)] - 0.08).abs() < 1e-15);
        assert_eq!(m[(0, 3)], 0.0);
    }

    #[test]
    fn explicit_shape_is_checked() {
        let err = SensitivityCovariance::Explicit(Matrix::identity(3, 3))
            .build(&pair())
            .unwrap_err();
        assert!(matches!(err, SimilarityError::InvalidInput { .. }));
        assert!(SensitivityCovariance::Explicit(Matrix::identity(4, 4)).build(&pair()).is_ok());
    }
}
