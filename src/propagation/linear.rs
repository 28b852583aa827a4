//! First-order (sandwich) propagation of sensitivity uncertainty.

use tracing::debug;

use crate::align::AlignedPair;
use crate::error::{Result, SimilarityError};
use crate::result::SimilarityIndex;
use crate::similarity;
use crate::types::{IndexKind, Matrix};

use super::SensitivityCovariance;

/// Linearized standard deviation of each requested index.
///
/// `σ² = gᵀ Σx g` with the stacked gradient `g = [∂/∂Sa; ∂/∂Sb]`. A
/// negative quadratic form (non-PSD explicit `Σx`) is floored at zero.
///
/// Exact only to first order: at a self-comparison the gradient of every
/// index vanishes and so does the reported uncertainty.
pub fn propagate_linear(
    kinds: &[IndexKind],
    pair: &AlignedPair,
    covariance: &Matrix,
    sensitivity: &SensitivityCovariance,
) -> Result<Vec<SimilarityIndex>> {
    let sigma = sensitivity.build(pair)?;
    kinds
        .iter()
        .map(|&kind| {
            let value = similarity::compute(kind, pair, covariance)?;
            let g = similarity::gradient(kind, pair, covariance)?.stacked();
            let variance = g.dot(&(&sigma * &g));
            if !variance.is_finite() {
                return Err(SimilarityError::invalid_input(format!(
                    "non-finite variance for {kind}"
                )));
            }
            let uncertainty = variance.max(0.0).sqrt();
            debug!(%kind, value, uncertainty, "linear propagation");
            Ok(SimilarityIndex {
                kind,
                value,
                uncertainty,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;
    use crate::profile::{EnergyGrid, GroupSensitivities, SensitivityProfile};
    use crate::types::{NuclideReaction, Vector};

    fn grid() -> EnergyGrid {
        EnergyGrid::new(vec![2.0e7, 1.0, 1.0e-5]).unwrap()
    }

    fn profile(name: &str, v: Vec<f64>, rel: f64) -> SensitivityProfile {
        let sd = v.iter().map(|x| x.abs() * rel).collect();
        SensitivityProfile::new(
            name,
            grid(),
            [(NuclideReaction::new("u-235", "fission"), GroupSensitivities::new(v, sd).unwrap())],
        )
        .unwrap()
    }

    #[test]
    fn self_comparison_has_zero_uncertainty() {
        let a = profile("a", vec![0.5, 0.3], 0.05);
        let pair = align(&a, &a).unwrap();
        let cov = Matrix::from_diagonal_element(2, 2, 0.01);
        let out = propagate_linear(
            &[IndexKind::Ck, IndexKind::E],
            &pair,
            &cov,
            &SensitivityCovariance::Independent,
        )
        .unwrap();
        for index in out {
            assert!((index.value - 1.0).abs() < 1e-12);
            assert!(index.uncertainty.abs() < 1e-12, "{index:?}");
        }
    }

    #[test]
    fn matches_explicit_quadratic_form() {
        let a = profile("a", vec![0.5, 0.3], 0.1);
        let b = profile("b", vec![0.2, 0.6], 0.2);
        let pair = align(&a, &b).unwrap();
        let cov = Matrix::identity(2, 2);
        let out = propagate_linear(&[IndexKind::E], &pair, &cov, &SensitivityCovariance::Independent)
            .unwrap();

        let g = similarity::gradient(IndexKind::E, &pair, &cov).unwrap();
        let var_a: f64 = g
            .application
            .iter()
            .zip(pair.application_std().iter())
            .map(|(d, s)| d * d * s * s)
            .sum();
        let var_b: f64 = g
            .benchmark
            .iter()
            .zip(pair.benchmark_std().iter())
            .map(|(d, s)| d * d * s * s)
            .sum();
        assert!((out[0].uncertainty - (var_a + var_b).sqrt()).abs() < 1e-14);
        assert!(out[0].uncertainty > 0.0);
    }

    #[test]
    fn explicit_zero_covariance_gives_zero() {
        let a = profile("a", vec![0.5, 0.3], 0.1);
        let b = profile("b", vec![0.2, 0.6], 0.2);
        let pair = align(&a, &b).unwrap();
        let out = propagate_linear(
            &[IndexKind::Ck],
            &pair,
            &Matrix::from_diagonal(&Vector::from_vec(vec![0.01, 0.02])),
            &SensitivityCovariance::Explicit(Matrix::zeros(4, 4)),
        )
        .unwrap();
        assert_eq!(out[0].uncertainty, 0.0);
    }
}
