//! Breakdowns of similarity indices and response uncertainty by nuclide and
//! reaction.
//!
//! These tables tell an analyst *why* a benchmark is (dis)similar: which
//! nuclide-reaction pairs carry the overlap, and which covariance blocks
//! dominate the nuclear-data uncertainty of the response.

use serde::{Deserialize, Serialize};

use crate::align::{align, AlignedPair};
use crate::error::{Result, SimilarityError, Side};
use crate::profile::{CovarianceMatrix, SensitivityProfile};
use crate::types::{IndexKind, Matrix, NuclideReaction, Vector};

/// Contribution of one nuclide (or nuclide-reaction pair) to `E`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EContribution {
    /// Nuclide.
    pub nuclide: String,
    /// Reaction, or `None` for a nuclide total.
    pub reaction: Option<String>,
    /// Contribution to `E`.
    pub value: f64,
    /// First-order standard deviation of the contribution.
    pub uncertainty: f64,
}

/// Nuclide-wise and nuclide-reaction-wise contributions to `E`.
///
/// Contributions are normalised by the norms of the *full* vectors, so each
/// table sums to `E`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EContributions {
    /// One entry per nuclide, in canonical order.
    pub by_nuclide: Vec<EContribution>,
    /// One entry per nuclide-reaction pair, in canonical order.
    pub by_nuclide_reaction: Vec<EContribution>,
}

/// Contribution of one pair of covariance blocks to a quadratic form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockContribution {
    /// Row block.
    pub row: NuclideReaction,
    /// Column block.
    pub column: NuclideReaction,
    /// Contribution; off-diagonal blocks may be negative.
    pub value: f64,
}

/// Nuclear-data-induced uncertainty of a profile's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandwichResult {
    /// Relative response variance `Sᵀ C S`.
    pub variance: f64,
    /// Relative response standard deviation (`Δk/k` for keff).
    pub std_dev: f64,
    /// Non-zero block contributions, largest magnitude first.
    pub contributions: Vec<BlockContribution>,
}

/// Standard deviations of the unit-vector components `û = u / |u|`.
///
/// With `∂û_i/∂u_j = (δ_ij |u|² − u_i u_j) / |u|³` and independent
/// components, the sum over `j` collapses to
/// `(|u|⁴ σ_i² − 2|u|² u_i² σ_i² + u_i² Σ_j u_j² σ_j²) / |u|⁶`.
fn unit_vector_std(u: &Vector, sigma: &Vector) -> Vector {
    let n2 = u.norm_squared();
    let t: f64 = u.iter().zip(sigma.iter()).map(|(x, s)| x * x * s * s).sum();
    Vector::from_iterator(
        u.len(),
        u.iter().zip(sigma.iter()).map(|(x, s)| {
            let var = (n2 * n2 * s * s - 2.0 * n2 * x * x * s * s + x * x * t) / (n2 * n2 * n2);
            var.max(0.0).sqrt()
        }),
    )
}

/// Per-nuclide and per-nuclide-reaction contributions to `E`.
pub fn e_contributions(pair: &AlignedPair) -> Result<EContributions> {
    let sa = pair.application();
    let sb = pair.benchmark();
    let na2 = sa.norm_squared();
    let nb2 = sb.norm_squared();
    for (which, norm) in [(Side::Application, na2), (Side::Benchmark, nb2)] {
        if !(norm.is_finite() && norm > 0.0) {
            return Err(SimilarityError::DegenerateProfile {
                kind: IndexKind::E,
                which,
                norm,
            });
        }
    }

    let ua = sa / na2.sqrt();
    let ub = sb / nb2.sqrt();
    let ua_sd = unit_vector_std(sa, pair.application_std());
    let ub_sd = unit_vector_std(sb, pair.benchmark_std());

    // (value, variance) of the dot product over a component range.
    let partial = |range: std::ops::Range<usize>| -> (f64, f64) {
        range.fold((0.0, 0.0), |(value, var), i| {
            let product = ua[i] * ub[i];
            let term_var = if ua[i] == 0.0 || ub[i] == 0.0 {
                0.0
            } else {
                (ub[i] * ua_sd[i]).powi(2) + (ua[i] * ub_sd[i]).powi(2)
            };
            (value + product, var + term_var)
        })
    };

    let index = pair.index();
    let mut by_nuclide: Vec<EContribution> = Vec::new();
    let mut by_nuclide_reaction = Vec::with_capacity(index.keys().len());
    for (key, range) in index.blocks() {
        let (value, var) = partial(range);
        by_nuclide_reaction.push(EContribution {
            nuclide: key.nuclide.clone(),
            reaction: Some(key.reaction.clone()),
            value,
            uncertainty: var.sqrt(),
        });

        // Blocks of one nuclide are contiguous in canonical order.
        match by_nuclide.last_mut() {
            Some(last) if last.nuclide == key.nuclide => {
                last.value += value;
                // Accumulates variance here; converted to a std dev below.
                last.uncertainty += var;
            }
            _ => by_nuclide.push(EContribution {
                nuclide: key.nuclide.clone(),
                reaction: None,
                value,
                uncertainty: var,
            }),
        }
    }
    for entry in &mut by_nuclide {
        entry.uncertainty = entry.uncertainty.sqrt();
    }

    Ok(EContributions {
        by_nuclide,
        by_nuclide_reaction,
    })
}

/// Block-pair contributions `Sa_iᵀ C_ij Sb_j / sqrt(ab)` to the unclamped `ck`.
///
/// Only non-zero contributions are returned, largest magnitude first.
pub fn ck_contributions(pair: &AlignedPair, covariance: &Matrix) -> Result<Vec<BlockContribution>> {
    let n = pair.len();
    if covariance.nrows() != n || covariance.ncols() != n {
        return Err(SimilarityError::invalid_input(format!(
            "covariance is {}x{}, aligned index has {n} components",
            covariance.nrows(),
            covariance.ncols()
        )));
    }
    let sa = pair.application();
    let sb = pair.benchmark();
    let a = sa.dot(&(covariance * sa));
    let b = sb.dot(&(covariance * sb));
    for (which, norm) in [(Side::Application, a), (Side::Benchmark, b)] {
        if !(norm.is_finite() && norm > 0.0) {
            return Err(SimilarityError::DegenerateProfile {
                kind: IndexKind::Ck,
                which,
                norm,
            });
        }
    }
    let denom = (a * b).sqrt();
    Ok(block_quadratic_form(pair, covariance, sa, sb, denom))
}

/// Sandwich-rule uncertainty of a profile's response, `Sᵀ C S`, with its
/// block-pair breakdown.
///
/// Fails with `InvalidInput` when the covariance yields a negative variance
/// along the profile (the covariance is not positive semi-definite there).
pub fn sandwich(profile: &SensitivityProfile, covariance: &CovarianceMatrix) -> Result<SandwichResult> {
    let pair = align(profile, profile)?;
    let c = pair.covariance(covariance)?;
    let s = pair.application();
    let variance = s.dot(&(&c * s));
    if !variance.is_finite() || variance < 0.0 {
        return Err(SimilarityError::invalid_input(format!(
            "negative response variance {variance:e} for {}: covariance not positive semi-definite",
            profile.name()
        )));
    }
    let contributions = block_quadratic_form(&pair, &c, s, s, 1.0);
    Ok(SandwichResult {
        variance,
        std_dev: variance.sqrt(),
        contributions,
    })
}

fn block_quadratic_form(
    pair: &AlignedPair,
    covariance: &Matrix,
    left: &Vector,
    right: &Vector,
    denom: f64,
) -> Vec<BlockContribution> {
    let index = pair.index();
    let mut out = Vec::new();
    for (row, rows) in index.blocks() {
        let l = left.rows(rows.start, rows.len());
        if l.iter().all(|x| *x == 0.0) {
            continue;
        }
        for (column, cols) in index.blocks() {
            let r = right.rows(cols.start, cols.len());
            let block = covariance.view((rows.start, cols.start), (rows.len(), cols.len()));
            let value = l.dot(&(block * r)) / denom;
            if value != 0.0 {
                out.push(BlockContribution {
                    row: row.clone(),
                    column: column.clone(),
                    value,
                });
            }
        }
    }
    out.sort_by(|x, y| y.value.abs().total_cmp(&x.value.abs()));
    out
}
