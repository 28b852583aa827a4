//! Numeric constants shared across modules.

/// Relative tolerance when comparing energy-group boundaries.
pub const GRID_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Relative tolerance for the symmetry check of covariance input.
pub const SYMMETRY_RELATIVE_TOLERANCE: f64 = 1e-8;

/// Base diagonal jitter for covariance regularization.
pub const BASE_JITTER: f64 = 1e-10;

/// Jitter scale relative to the mean diagonal entry.
pub const ADAPTIVE_JITTER_SCALE: f64 = 1e-8;

/// Growth factor of the jitter between regularization attempts.
pub const JITTER_GROWTH: f64 = 10.0;

/// Draws handled by one sequential chunk of sampling work.
///
/// Fixed so that chunk boundaries, and therefore the reduction order, do not
/// depend on the number of worker threads.
pub const SAMPLING_CHUNK: usize = 64;

/// Percentile bounds reported for sampled distributions (central 95%).
pub const SAMPLE_INTERVAL: (f64, f64) = (0.025, 0.975);

/// Summary reactions that double count partial reactions.
pub const REDUNDANT_REACTIONS: [&str; 4] = ["chi", "capture", "nubar", "total"];
