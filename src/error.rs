//! Error types for similarity and uncertainty computations.
//!
//! Every failure is surfaced as a distinct variant so the calling layer can
//! decide whether to retry with a different configuration (switch the
//! propagation method, loosen the tolerance, raise the budget) or report the
//! problem to the analyst. Nothing here is recovered silently.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::EnergyGrid;
use crate::types::IndexKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimilarityError>;

/// Which side of a comparison a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The application (target system) profile.
    Application,
    /// The benchmark experiment profile.
    Benchmark,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Application => write!(f, "application"),
            Side::Benchmark => write!(f, "benchmark"),
        }
    }
}

/// Which budget stopped a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetLimit {
    /// The maximum number of draws was reached.
    Samples,
    /// The wall-clock allowance elapsed.
    Duration,
}

/// Per-index statistics gathered before a sampling run was stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialEstimate {
    /// Index the statistics refer to.
    pub kind: IndexKind,
    /// Mean of the draws completed so far.
    pub mean: f64,
    /// Standard deviation of the draws completed so far.
    pub std_dev: f64,
}

/// Statistics of a sampling run that did not converge.
///
/// Always carries `converged: false`; it is never a final result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSampling {
    /// Number of draws completed before the run stopped.
    pub samples_drawn: usize,
    /// The budget that tripped.
    pub limit: BudgetLimit,
    /// Per-index partial statistics.
    pub estimates: Vec<PartialEstimate>,
    /// Always `false`.
    pub converged: bool,
}

/// Errors raised by the similarity engine.
#[derive(Debug, Clone, Error)]
pub enum SimilarityError {
    /// Two compared structures use incompatible energy-group boundaries.
    #[error(
        "energy grid mismatch: {} groups vs {} groups",
        .left.num_groups(),
        .right.num_groups()
    )]
    GridMismatch {
        /// Grid of the left-hand operand.
        left: EnergyGrid,
        /// Grid of the right-hand operand.
        right: EnergyGrid,
    },

    /// A profile has a zero or negative self-weighted norm.
    #[error("degenerate {which} profile for {kind}: self-weighted norm {norm:e}")]
    DegenerateProfile {
        /// Index being computed.
        kind: IndexKind,
        /// Offending side.
        which: Side,
        /// The self-weighted norm that was found (`Sᵀ C S` or `S·S`).
        norm: f64,
    },

    /// The sampling covariance stayed non-positive-definite after every
    /// regularization attempt.
    #[error("covariance not positive definite after {} regularization attempts", .attempts.len())]
    CovarianceSingular {
        /// Diagonal jitter tried on each attempt, in order.
        attempts: Vec<f64>,
    },

    /// Sampling propagation hit its budget before converging.
    #[error(
        "sampling budget exceeded ({:?}) after {} draws without convergence",
        .partial.limit,
        .partial.samples_drawn
    )]
    SampleBudgetExceeded {
        /// Statistics gathered so far, marked as non-converged.
        partial: PartialSampling,
    },

    /// Input arrays are malformed (shape, symmetry, non-finite values).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// Ranking asked for an index kind that was not computed.
    #[error("index {kind} was not computed for benchmark {benchmark_id}")]
    IndexNotComputed {
        /// Requested kind.
        kind: IndexKind,
        /// Benchmark lacking the index.
        benchmark_id: String,
    },
}

impl SimilarityError {
    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether a different configuration could make the computation succeed.
    ///
    /// Grid mismatches, degenerate profiles and malformed input are properties
    /// of the data; singular covariance and budget exhaustion depend on the
    /// propagation settings.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CovarianceSingular { .. } | Self::SampleBudgetExceeded { .. }
        )
    }
}
