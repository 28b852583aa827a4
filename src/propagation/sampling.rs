//! Monte Carlo propagation of sensitivity uncertainty.
//!
//! Draw `i` uses its own RNG seeded from `(seed, i)`, draws are processed in
//! fixed-size chunks, and chunk accumulators are merged in chunk order. The
//! result is therefore bit-identical for a given seed whatever the number of
//! worker threads.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::align::AlignedPair;
use crate::constants::{SAMPLE_INTERVAL, SAMPLING_CHUNK};
use crate::error::{BudgetLimit, PartialEstimate, PartialSampling, Result, SimilarityError};
use crate::similarity;
use crate::statistics::{draw_rng, quantile_interval, CorrelatedNormal, Regularization, SampleMoments};
use crate::types::{IndexKind, Matrix, Vector};

use super::SensitivityCovariance;

/// Hard limits on a sampling run.
///
/// With a sample cap every draw of every index is retained to report the
/// percentile interval, costing `max_samples × kinds × 8` bytes per running
/// comparison (and `assess` runs comparisons side by side). Without a cap
/// nothing is retained and `SamplingSummary::interval` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBudget {
    /// Maximum number of draws (`None` for no cap).
    pub max_samples: Option<usize>,
    /// Wall-clock allowance in milliseconds (`None` for no limit).
    pub max_duration_ms: Option<u64>,
}

impl Default for SampleBudget {
    fn default() -> Self {
        Self {
            max_samples: Some(1_000_000),
            max_duration_ms: None,
        }
    }
}

/// Configuration of sampling propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Minimum number of draws before convergence is considered (default: 10,000).
    pub samples: usize,

    /// Base seed; the same seed reproduces the same draws (default: 0).
    pub seed: u64,

    /// Largest relative change of every index's standard deviation over the
    /// last batch that still counts as converged (default: 0.01).
    pub tolerance: f64,

    /// Draws between convergence checks (default: 1,000).
    pub batch_size: usize,

    /// Jittered factorisation attempts before giving up (default: 8).
    pub max_regularization_attempts: u32,

    /// Sample and time caps.
    pub budget: SampleBudget,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 10_000,
            seed: 0,
            tolerance: 0.01,
            batch_size: 1_000,
            max_regularization_attempts: 8,
            budget: SampleBudget::default(),
        }
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<()> {
        if self.samples < 2 {
            return Err(SimilarityError::invalid_input("sampling needs at least 2 samples"));
        }
        if self.batch_size == 0 {
            return Err(SimilarityError::invalid_input("batch size must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(SimilarityError::invalid_input(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Sampled distribution of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingSummary {
    /// Index the statistics refer to.
    pub kind: IndexKind,
    /// Mean over draws.
    pub mean: f64,
    /// Standard deviation over draws.
    pub std_dev: f64,
    /// Number of draws.
    pub samples: usize,
    /// Central 95% interval (2.5th and 97.5th percentiles); `None` when the
    /// run had no sample cap and draws were not retained.
    pub interval: Option<(f64, f64)>,
    /// Jitter needed to factorise the sensitivity covariance, if any.
    pub regularization: Option<Regularization>,
}

/// Accumulated draws of one chunk.
struct Chunk {
    moments: Vec<SampleMoments>,
    values: Vec<Vec<f64>>,
    drawn: usize,
}

struct Run<'a> {
    kinds: &'a [IndexKind],
    pair: &'a AlignedPair,
    covariance: &'a Matrix,
    sampler: CorrelatedNormal,
    seed: u64,
    deadline: Option<Instant>,
    cancel: AtomicBool,
    retain: bool,
}

impl Run<'_> {
    fn draw_chunk(&self, range: Range<u64>) -> Result<Chunk> {
        let n = self.pair.len();
        let capacity = if self.retain {
            (range.end - range.start) as usize
        } else {
            0
        };
        let mut chunk = Chunk {
            moments: vec![SampleMoments::new(); self.kinds.len()],
            values: vec![Vec::with_capacity(capacity); self.kinds.len()],
            drawn: 0,
        };
        for i in range {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.cancel.store(true, Ordering::Relaxed);
                break;
            }

            let x = self.sampler.sample(&mut draw_rng(self.seed, i));
            let sa = x.rows(0, n).into_owned();
            let sb = x.rows(n, n).into_owned();
            for (k, &kind) in self.kinds.iter().enumerate() {
                let value = similarity::evaluate(kind, self.pair, self.covariance, &sa, &sb)?;
                chunk.moments[k].update(value);
                if self.retain {
                    chunk.values[k].push(value);
                }
            }
            chunk.drawn += 1;
        }
        Ok(chunk)
    }

    fn draw_batch(&self, start: usize, len: usize) -> Result<Vec<Chunk>> {
        let ranges: Vec<Range<u64>> = (0..len)
            .step_by(SAMPLING_CHUNK)
            .map(|offset| {
                let end = (offset + SAMPLING_CHUNK).min(len);
                (start + offset) as u64..(start + end) as u64
            })
            .collect();

        #[cfg(feature = "parallel")]
        let chunks = ranges.into_par_iter().map(|r| self.draw_chunk(r)).collect();

        #[cfg(not(feature = "parallel"))]
        let chunks = ranges.into_iter().map(|r| self.draw_chunk(r)).collect();

        chunks
    }
}

fn relative_change(previous: f64, current: f64) -> f64 {
    if previous == current {
        0.0
    } else if previous == 0.0 {
        f64::INFINITY
    } else {
        ((current - previous) / previous).abs()
    }
}

/// Monte Carlo standard deviation of each requested index.
///
/// Draws `x = [Sa; Sb] ~ N(x0, Σx)` and recomputes every index per draw.
/// Components with zero variance are held at their nominal value. Draws
/// continue in batches of `batch_size` until at least `samples` draws are
/// in and every index's standard deviation moved by at most `tolerance`
/// (relative) over the last batch.
///
/// Runs on the current rayon pool when the `parallel` feature is enabled.
///
/// # Errors
///
/// - `CovarianceSingular` when `Σx` cannot be factorised even with jitter
/// - `SampleBudgetExceeded` when a cap is hit first; the partial statistics
///   are attached and marked non-converged
/// - `DegenerateProfile` when the nominal pair or any draw is degenerate
pub fn propagate_sampling(
    kinds: &[IndexKind],
    pair: &AlignedPair,
    covariance: &Matrix,
    sensitivity: &SensitivityCovariance,
    config: &SamplingConfig,
) -> Result<Vec<SamplingSummary>> {
    config.validate()?;
    similarity::compute_all(kinds, pair, covariance)?;

    let n = pair.len();
    let sigma = sensitivity.build(pair)?;
    let mut x0 = Vector::zeros(2 * n);
    x0.rows_mut(0, n).copy_from(pair.application());
    x0.rows_mut(n, n).copy_from(pair.benchmark());
    let sampler = CorrelatedNormal::new(x0, &sigma, config.max_regularization_attempts)?;
    let regularization = sampler.regularization();

    let start = Instant::now();
    let run = Run {
        kinds,
        pair,
        covariance,
        sampler,
        seed: config.seed,
        deadline: config
            .budget
            .max_duration_ms
            .map(|ms| start + Duration::from_millis(ms)),
        cancel: AtomicBool::new(false),
        retain: config.budget.max_samples.is_some(),
    };

    let mut totals = vec![SampleMoments::new(); kinds.len()];
    let mut draws: Vec<Vec<f64>> = vec![Vec::new(); kinds.len()];
    let mut drawn = 0usize;
    let mut previous: Option<Vec<f64>> = None;

    let exceeded = |limit: BudgetLimit, drawn: usize, totals: &[SampleMoments]| {
        warn!(
            ?limit,
            drawn,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sampling budget exceeded before convergence"
        );
        SimilarityError::SampleBudgetExceeded {
            partial: PartialSampling {
                samples_drawn: drawn,
                limit,
                estimates: kinds
                    .iter()
                    .zip(totals)
                    .map(|(&kind, m)| PartialEstimate {
                        kind,
                        mean: m.mean(),
                        std_dev: m.std_dev(),
                    })
                    .collect(),
                converged: false,
            },
        }
    };

    loop {
        let remaining = config
            .budget
            .max_samples
            .map_or(config.batch_size, |max| max.saturating_sub(drawn));
        let batch = config.batch_size.min(remaining);
        if batch == 0 {
            return Err(exceeded(BudgetLimit::Samples, drawn, &totals));
        }

        for chunk in run.draw_batch(drawn, batch)? {
            for (k, m) in chunk.moments.iter().enumerate() {
                totals[k].merge(m);
            }
            for (all, part) in draws.iter_mut().zip(chunk.values) {
                all.extend(part);
            }
            drawn += chunk.drawn;
        }
        if run.cancel.load(Ordering::Relaxed) {
            return Err(exceeded(BudgetLimit::Duration, drawn, &totals));
        }

        let current: Vec<f64> = totals.iter().map(SampleMoments::std_dev).collect();
        let stable = previous.as_ref().is_some_and(|prev| {
            prev.iter()
                .zip(&current)
                .all(|(&p, &c)| relative_change(p, c) <= config.tolerance)
        });
        debug!(drawn, stable, "sampling batch complete");
        if stable && drawn >= config.samples {
            break;
        }
        previous = Some(current);
    }

    Ok(kinds
        .iter()
        .zip(totals)
        .zip(draws.iter_mut())
        .map(|((&kind, m), values)| SamplingSummary {
            kind,
            mean: m.mean(),
            std_dev: m.std_dev(),
            samples: m.count(),
            interval: quantile_interval(values, SAMPLE_INTERVAL),
            regularization,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;
    use crate::profile::{EnergyGrid, GroupSensitivities, SensitivityProfile};
    use crate::types::NuclideReaction;

    fn grid() -> EnergyGrid {
        EnergyGrid::new(vec![2.0e7, 1.0e5, 1.0, 1.0e-5]).unwrap()
    }

    fn profile(name: &str, v: Vec<f64>, sd: Vec<f64>) -> SensitivityProfile {
        SensitivityProfile::new(
            name,
            grid(),
            [(NuclideReaction::new("u-235", "fission"), GroupSensitivities::new(v, sd).unwrap())],
        )
        .unwrap()
    }

    fn pair() -> AlignedPair {
        align(
            &profile("a", vec![0.5, 0.3, 0.1], vec![0.005, 0.003, 0.001]),
            &profile("b", vec![0.2, 0.4, -0.1], vec![0.002, 0.004, 0.001]),
        )
        .unwrap()
    }

    fn small() -> SamplingConfig {
        SamplingConfig {
            samples: 2_000,
            batch_size: 500,
            tolerance: 0.05,
            seed: 7,
            ..SamplingConfig::default()
        }
    }

    #[test]
    fn same_seed_reproduces_exactly() {
        let p = pair();
        let cov = Matrix::identity(3, 3);
        let kinds = [IndexKind::E];
        let a = propagate_sampling(&kinds, &p, &cov, &SensitivityCovariance::Independent, &small()).unwrap();
        let b = propagate_sampling(&kinds, &p, &cov, &SensitivityCovariance::Independent, &small()).unwrap();
        assert_eq!(a, b);
        assert!(a[0].samples >= 2_000);
        let (lo, hi) = a[0].interval.unwrap();
        assert!(lo < a[0].mean && a[0].mean < hi);
        assert!(a[0].regularization.is_none());
    }

    #[test]
    fn uncapped_run_keeps_no_draws() {
        let p = pair();
        let cov = Matrix::identity(3, 3);
        let kinds = [IndexKind::Ck, IndexKind::E];
        let uncapped = SamplingConfig {
            budget: SampleBudget {
                max_samples: None,
                max_duration_ms: None,
            },
            ..small()
        };
        let capped = propagate_sampling(&kinds, &p, &cov, &SensitivityCovariance::Independent, &small()).unwrap();
        let free = propagate_sampling(&kinds, &p, &cov, &SensitivityCovariance::Independent, &uncapped).unwrap();
        for (c, f) in capped.iter().zip(&free) {
            assert!(c.interval.is_some());
            assert!(f.interval.is_none());
            assert_eq!(c.mean, f.mean);
            assert_eq!(c.std_dev, f.std_dev);
            assert_eq!(c.samples, f.samples);
        }
    }

    #[test]
    fn sample_cap_reports_partial_statistics() {
        let config = SamplingConfig {
            budget: SampleBudget {
                max_samples: Some(100),
                max_duration_ms: None,
            },
            ..small()
        };
        let err = propagate_sampling(
            &[IndexKind::Ck, IndexKind::E],
            &pair(),
            &Matrix::identity(3, 3),
            &SensitivityCovariance::Independent,
            &config,
        )
        .unwrap_err();
        match err {
            SimilarityError::SampleBudgetExceeded { partial } => {
                assert_eq!(partial.samples_drawn, 100);
                assert_eq!(partial.limit, BudgetLimit::Samples);
                assert!(!partial.converged);
                assert_eq!(partial.estimates.len(), 2);
                assert!(partial.estimates[0].std_dev > 0.0);
            }
            other => panic!("expected SampleBudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn zero_duration_stops_immediately() {
        let config = SamplingConfig {
            budget: SampleBudget {
                max_samples: None,
                max_duration_ms: Some(0),
            },
            ..small()
        };
        let err = propagate_sampling(
            &[IndexKind::E],
            &pair(),
            &Matrix::identity(3, 3),
            &SensitivityCovariance::Independent,
            &config,
        )
        .unwrap_err();
        match err {
            SimilarityError::SampleBudgetExceeded { partial } => {
                assert_eq!(partial.limit, BudgetLimit::Duration);
                assert!(!partial.converged);
            }
            other => panic!("expected SampleBudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn fully_correlated_inputs_are_regularized() {
        // Powers of two keep the singular factorisation exact.
        let a = profile("a", vec![0.5, 0.25, 0.125], vec![0.5, 0.25, 0.125]);
        let b = profile("b", vec![0.25, 0.5, 0.125], vec![0.25, 0.5, 0.125]);
        let p = align(&a, &b).unwrap();
        let out = propagate_sampling(
            &[IndexKind::E],
            &p,
            &Matrix::identity(3, 3),
            &SensitivityCovariance::FullyCorrelated,
            &small(),
        )
        .unwrap();
        let reg = out[0].regularization.expect("regularization should be reported");
        assert!(reg.attempts >= 1);
        assert!(reg.jitter > 0.0);
    }

    #[test]
    fn exact_inputs_give_zero_spread() {
        let a = profile("a", vec![0.5, 0.3, 0.1], vec![0.0; 3]);
        let b = profile("b", vec![0.2, 0.4, -0.1], vec![0.0; 3]);
        let p = align(&a, &b).unwrap();
        let cov = Matrix::identity(3, 3);
        let out = propagate_sampling(&[IndexKind::E], &p, &cov, &SensitivityCovariance::Independent, &small())
            .unwrap();
        let nominal = similarity::compute(IndexKind::E, &p, &cov).unwrap();
        assert_eq!(out[0].std_dev, 0.0);
        assert!((out[0].mean - nominal).abs() < 1e-15);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = SamplingConfig {
            batch_size: 0,
            ..small()
        };
        let err = propagate_sampling(
            &[IndexKind::E],
            &pair(),
            &Matrix::identity(3, 3),
            &SensitivityCovariance::Independent,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, SimilarityError::InvalidInput { .. }));
    }
}
