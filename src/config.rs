//! Configuration for similarity assessment.

use serde::{Deserialize, Serialize};

use crate::propagation::{SamplingConfig, SensitivityCovariance};
use crate::types::IndexKind;

/// Configuration options for `SimilarityEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Indices to compute, in output order (default: `ck`, `E`).
    pub indices: Vec<IndexKind>,

    /// How index uncertainties are obtained (default: `Linear`).
    pub propagation: PropagationMethod,

    /// Sampling settings, used when `propagation` is `Sampling`.
    pub sampling: SamplingConfig,

    /// Covariance of the stacked sensitivities `[Sa; Sb]` (default: independent).
    pub sensitivity_covariance: SensitivityCovariance,
}

/// Uncertainty propagation method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationMethod {
    /// First-order Taylor expansion. Fast, exact to first order.
    #[default]
    Linear,

    /// Monte Carlo over the sensitivity distribution.
    ///
    /// Captures the nonlinearity of the index near its extremes, at the cost
    /// of thousands of index evaluations per comparison.
    Sampling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indices: vec![IndexKind::Ck, IndexKind::E],
            propagation: PropagationMethod::Linear,
            sampling: SamplingConfig::default(),
            sensitivity_covariance: SensitivityCovariance::Independent,
        }
    }
}
