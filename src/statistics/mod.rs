//! Statistical primitives for uncertainty propagation.
//!
//! - Streaming moments with an order-stable parallel merge
//! - Counter-based per-draw RNG seeding
//! - Regularized Cholesky factorisation and correlated normal sampling
//! - Percentile intervals of sampled indices

mod cholesky;
mod moments;
mod quantile;
mod rng;

pub use cholesky::{regularized_cholesky, CorrelatedNormal, Regularization};
pub use moments::SampleMoments;
pub use quantile::{quantile_interval, quantile_sorted};
pub use rng::{counter_rng_seed, draw_rng};
