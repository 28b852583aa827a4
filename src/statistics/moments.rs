//! Streaming mean and variance.

use serde::{Deserialize, Serialize};

/// Online mean/variance accumulator using Welford's algorithm.
///
/// Accumulators from disjoint sample sets combine with Chan's parallel
/// update, so work can be split into chunks and reduced afterwards. Merging
/// is not associative in floating point; callers that need reproducible
/// results merge in a fixed order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMoments {
    n: usize,
    mean: f64,
    /// Σ(x - μ)²
    m2: f64,
}

impl SampleMoments {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    ///
    /// ```text
    /// δ = x - μₙ₋₁
    /// μₙ = μₙ₋₁ + δ/n
    /// M2ₙ = M2ₙ₋₁ + δ·(x - μₙ)
    /// ```
    pub fn update(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Fold another accumulator into this one.
    ///
    /// ```text
    /// n_AB = n_A + n_B
    /// δ = μ_B - μ_A
    /// μ_AB = μ_A + δ·n_B/n_AB
    /// M2_AB = M2_A + M2_B + δ²·n_A·n_B/n_AB
    /// ```
    pub fn merge(&mut self, other: &Self) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = *other;
            return;
        }
        let n_a = self.n as f64;
        let n_b = other.n as f64;
        let n_ab = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n_ab;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n_ab;
        self.n += other.n;
    }

    /// Number of observations.
    pub fn count(&self) -> usize {
        self.n
    }

    /// Sample mean (0 when empty).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance, `M2/(n-1)`; 0 for fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        (self.m2 / (self.n - 1) as f64).max(0.0)
    }

    /// Sample standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
