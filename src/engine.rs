//! Main `SimilarityEngine` entry point and builder.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::align::{align, align_with_covariance};
use crate::config::{Config, PropagationMethod};
use crate::error::{Result, SimilarityError};
use crate::profile::{BenchmarkEntry, CovarianceMatrix, SensitivityProfile};
use crate::propagation::{propagate_linear, propagate_sampling, SensitivityCovariance};
use crate::rank::{self, RankedResult, RankingCriteria};
use crate::result::{Assessment, BatchAssessment, BenchmarkFailure, Comparison, SimilarityIndex};
use crate::similarity::{self, BlockContribution, EContributions, SandwichResult};
use crate::thread_pool;
use crate::types::IndexKind;

/// Main entry point for benchmark similarity assessment.
///
/// Use the builder pattern to configure, then compare an application against
/// one benchmark or a whole library.
///
/// # Example
///
/// ```ignore
/// use benchmark_similarity::{RankingCriteria, SimilarityEngine, IndexKind};
///
/// let engine = SimilarityEngine::new().seed(42);
/// let batch = engine.assess(&application, &benchmarks, &covariance);
/// let ranked = engine.rank(&batch, &RankingCriteria::by(IndexKind::Ck).min_similarity(0.9))?;
/// for entry in &ranked.entries {
///     println!("{} {} {:.4} ± {:.4}", entry.rank, entry.benchmark.id(), entry.index.value, entry.index.uncertainty);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    config: Config,
}

impl SimilarityEngine {
    /// Create with default configuration: `ck` and `E`, linear propagation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Sampling propagation with a small sample count.
    ///
    /// Settings:
    /// - 2,000 samples in batches of 500
    /// - 5% convergence tolerance
    /// - at most 50,000 draws
    pub fn quick() -> Self {
        let mut config = Config {
            propagation: PropagationMethod::Sampling,
            ..Config::default()
        };
        config.sampling.samples = 2_000;
        config.sampling.batch_size = 500;
        config.sampling.tolerance = 0.05;
        config.sampling.budget.max_samples = Some(50_000);
        Self { config }
    }

    /// Sampling propagation for final reporting, all index kinds.
    ///
    /// Settings:
    /// - 50,000 samples in batches of 5,000
    /// - 0.5% convergence tolerance
    pub fn thorough() -> Self {
        let mut config = Config {
            indices: IndexKind::ALL.to_vec(),
            propagation: PropagationMethod::Sampling,
            ..Config::default()
        };
        config.sampling.samples = 50_000;
        config.sampling.batch_size = 5_000;
        config.sampling.tolerance = 0.005;
        Self { config }
    }

    /// Set the indices to compute.
    pub fn indices(mut self, kinds: &[IndexKind]) -> Self {
        self.config.indices = kinds.to_vec();
        self
    }

    /// Set the propagation method.
    pub fn propagation(mut self, method: PropagationMethod) -> Self {
        self.config.propagation = method;
        self
    }

    /// Set the minimum number of sampling draws.
    pub fn samples(mut self, n: usize) -> Self {
        self.config.sampling.samples = n;
        self
    }

    /// Set the sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.sampling.seed = seed;
        self
    }

    /// Set the sampling convergence tolerance.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.sampling.tolerance = tolerance;
        self
    }

    /// Set the number of draws between convergence checks.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.sampling.batch_size = n;
        self
    }

    /// Cap the number of sampling draws.
    pub fn max_samples(mut self, n: usize) -> Self {
        self.config.sampling.budget.max_samples = Some(n);
        self
    }

    /// Cap the wall-clock time of each sampling run.
    pub fn max_duration_ms(mut self, ms: u64) -> Self {
        self.config.sampling.budget.max_duration_ms = Some(ms);
        self
    }

    /// Set the number of jittered factorisation attempts.
    pub fn max_regularization_attempts(mut self, n: u32) -> Self {
        self.config.sampling.max_regularization_attempts = n;
        self
    }

    /// Set the covariance of the stacked sensitivities.
    pub fn sensitivity_covariance(mut self, covariance: SensitivityCovariance) -> Self {
        self.config.sensitivity_covariance = covariance;
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        let kinds = &self.config.indices;
        if kinds.is_empty() {
            return Err(SimilarityError::invalid_input("no similarity indices requested"));
        }
        let unique: HashSet<_> = kinds.iter().collect();
        if unique.len() != kinds.len() {
            return Err(SimilarityError::invalid_input("similarity indices requested twice"));
        }
        Ok(())
    }

    /// Compare an application against one benchmark profile.
    ///
    /// Aligns the profiles, computes every configured index and its
    /// uncertainty with the configured propagation method.
    pub fn compare(
        &self,
        application: &SensitivityProfile,
        benchmark: &SensitivityProfile,
        covariance: &CovarianceMatrix,
    ) -> Result<Comparison> {
        self.validate()?;
        let (pair, c) = align_with_covariance(application, benchmark, covariance)?;
        let kinds = &self.config.indices;
        let sensitivity = &self.config.sensitivity_covariance;

        let (indices, sampling) = match self.config.propagation {
            PropagationMethod::Linear => (propagate_linear(kinds, &pair, &c, sensitivity)?, None),
            PropagationMethod::Sampling => {
                let nominal = similarity::compute_all(kinds, &pair, &c)?;
                let summaries = thread_pool::install(|| {
                    propagate_sampling(kinds, &pair, &c, sensitivity, &self.config.sampling)
                })?;
                let indices = nominal
                    .iter()
                    .zip(&summaries)
                    .map(|(&(kind, value), s)| SimilarityIndex {
                        kind,
                        value,
                        uncertainty: s.std_dev,
                    })
                    .collect();
                (indices, Some(summaries))
            }
        };

        debug!(
            application = pair.application_name(),
            benchmark = pair.benchmark_name(),
            components = pair.len(),
            method = ?self.config.propagation,
            "compared profiles"
        );

        Ok(Comparison {
            application: pair.application_name().to_string(),
            benchmark: pair.benchmark_name().to_string(),
            method: self.config.propagation,
            indices,
            sampling,
        })
    }

    /// Compare an application against every benchmark of a library.
    ///
    /// Benchmarks are processed in parallel with shared read-only inputs.
    /// A failing benchmark does not abort the batch; it is recorded in
    /// `failures` with its error.
    pub fn assess<'a>(
        &self,
        application: &SensitivityProfile,
        benchmarks: &'a [BenchmarkEntry],
        covariance: &CovarianceMatrix,
    ) -> BatchAssessment<'a> {
        let start = Instant::now();
        let compare = |b: &'a BenchmarkEntry| (b, self.compare(application, b.profile(), covariance));

        #[cfg(feature = "parallel")]
        let outcomes: Vec<_> = thread_pool::install(|| benchmarks.par_iter().map(compare).collect());

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<_> = benchmarks.iter().map(compare).collect();

        let mut assessments = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (benchmark, outcome) in outcomes {
            match outcome {
                Ok(comparison) => assessments.push(Assessment {
                    benchmark,
                    comparison,
                }),
                Err(error) => {
                    warn!(benchmark = benchmark.id(), %error, "benchmark comparison failed");
                    failures.push(BenchmarkFailure {
                        benchmark_id: benchmark.id().to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            application = application.name(),
            benchmarks = benchmarks.len(),
            assessed = assessments.len(),
            failed = failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch assessment complete"
        );

        BatchAssessment {
            application: application.name().to_string(),
            assessments,
            failures,
        }
    }

    /// Assess several applications against the same library.
    ///
    /// One batch per application, in input order; each batch is an
    /// experiment column of the application-by-benchmark similarity table.
    pub fn assess_all<'a>(
        &self,
        applications: &[SensitivityProfile],
        benchmarks: &'a [BenchmarkEntry],
        covariance: &CovarianceMatrix,
    ) -> Vec<BatchAssessment<'a>> {
        applications
            .iter()
            .map(|application| self.assess(application, benchmarks, covariance))
            .collect()
    }

    /// Rank the successful assessments of a batch.
    pub fn rank<'a>(
        &self,
        batch: &BatchAssessment<'a>,
        criteria: &RankingCriteria,
    ) -> Result<RankedResult<'a>> {
        rank::rank(&batch.assessments, criteria)
    }

    /// Nuclear-data-induced uncertainty of a profile's response, with its
    /// breakdown by covariance block.
    pub fn uncertainty_contributions(
        &self,
        profile: &SensitivityProfile,
        covariance: &CovarianceMatrix,
    ) -> Result<SandwichResult> {
        similarity::sandwich(profile, covariance)
    }

    /// Per-nuclide and per-reaction contributions to `E`.
    pub fn e_contributions(
        &self,
        application: &SensitivityProfile,
        benchmark: &SensitivityProfile,
    ) -> Result<EContributions> {
        similarity::e_contributions(&align(application, benchmark)?)
    }

    /// Covariance-block contributions to `ck`.
    pub fn ck_contributions(
        &self,
        application: &SensitivityProfile,
        benchmark: &SensitivityProfile,
        covariance: &CovarianceMatrix,
    ) -> Result<Vec<BlockContribution>> {
        let (pair, c) = align_with_covariance(application, benchmark, covariance)?;
        similarity::ck_contributions(&pair, &c)
    }
}
