//! Percentile intervals of sampled distributions.
//!
//! Uses the R-7 definition (linear interpolation between order statistics).

/// Quantile `p` of data already sorted in ascending order, `None` when empty.
///
/// `p` is clamped to [0, 1]. Sortedness is not verified.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * p.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let frac = h - h.floor();

    if lower >= last || frac == 0.0 {
        return sorted.get(lower.min(last)).copied();
    }
    Some(sorted[lower] + frac * (sorted[lower + 1] - sorted[lower]))
}

/// Lower and upper quantiles `(p_lo, p_hi)` of `data`, sorting it in place.
///
/// Returns `None` for empty data.
pub fn quantile_interval(data: &mut [f64], (p_lo, p_hi): (f64, f64)) -> Option<(f64, f64)> {
    data.sort_unstable_by(|a, b| a.total_cmp(b));
    Some((quantile_sorted(data, p_lo)?, quantile_sorted(data, p_hi)?))
}
