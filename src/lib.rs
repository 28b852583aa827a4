//! # benchmark-similarity
//!
//! Judge how applicable benchmark critical experiments are to a target
//! application, from energy- and nuclide/reaction-resolved sensitivity
//! profiles and nuclear-data covariance.
//!
//! The crate computes:
//! - Similarity indices between an application and each benchmark
//!   (`ck`, `E`, and partial `E` per reaction class)
//! - Their uncertainties, by linear or Monte Carlo propagation
//! - A ranked, filtered view of a benchmark library
//!
//! Parsing of sensitivity and covariance files, plotting and reporting are
//! left to the caller: inputs arrive as already-parsed numeric arrays and
//! outputs are plain (serializable) values.
//!
//! ## Quick Start
//!
//! ```ignore
//! use benchmark_similarity::{IndexKind, RankingCriteria, SimilarityEngine};
//!
//! let engine = SimilarityEngine::new();
//! let batch = engine.assess(&application, &benchmarks, &covariance);
//! let ranked = engine.rank(&batch, &RankingCriteria::by(IndexKind::Ck).min_similarity(0.9))?;
//! ```
//!
//! ## Logging
//!
//! Diagnostics are emitted as `tracing` events (regularization and budget
//! warnings, per-batch summaries). The library never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod constants;
mod engine;
mod error;
mod result;
mod thread_pool;
mod types;

// Functional modules
pub mod align;
pub mod profile;
pub mod propagation;
pub mod rank;
pub mod similarity;
pub mod statistics;

// Re-exports for public API
pub use align::{align, align_with_covariance, AlignedIndex, AlignedPair};
pub use config::{Config, PropagationMethod};
pub use engine::SimilarityEngine;
pub use error::{BudgetLimit, PartialEstimate, PartialSampling, Result, Side, SimilarityError};
pub use profile::{BenchmarkEntry, CovarianceMatrix, EnergyGrid, GroupSensitivities, SensitivityProfile};
pub use propagation::{
    propagate_linear, propagate_sampling, SampleBudget, SamplingConfig, SamplingSummary,
    SensitivityCovariance,
};
pub use rank::{rank, RankedEntry, RankedResult, RankingCriteria};
pub use result::{Assessment, BatchAssessment, BenchmarkFailure, Comparison, SimilarityIndex};
pub use statistics::Regularization;
pub use types::{IndexKind, Matrix, NuclideReaction, ReactionClass, Vector};

/// Convenience function: `ck` and `E` with linearly propagated uncertainty.
///
/// Equivalent to `SimilarityEngine::new().compare(application, benchmark, covariance)`.
pub fn compare(
    application: &SensitivityProfile,
    benchmark: &SensitivityProfile,
    covariance: &CovarianceMatrix,
) -> Result<Comparison> {
    SimilarityEngine::new().compare(application, benchmark, covariance)
}
