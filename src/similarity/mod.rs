//! Similarity indices between an application and a benchmark profile.
//!
//! Every index is a normalized overlap `⟨Sa, Sb⟩_W / sqrt(⟨Sa, Sa⟩_W ⟨Sb, Sb⟩_W)`
//! under a kind-specific metric `W`:
//!
//! - [`IndexKind::Ck`]: `W = C`, the nuclear-data covariance
//! - [`IndexKind::E`]: `W = I`, the plain Euclidean overlap
//! - partial `E` kinds: `W = diag(mask)`, restricted to one reaction class
//!
//! Results are clamped into [-1, 1]; a non-positive self-weighted norm fails
//! with `DegenerateProfile` rather than producing NaN.

mod contributions;

pub use contributions::{
    ck_contributions, e_contributions, sandwich, BlockContribution, EContribution, EContributions,
    SandwichResult,
};

use crate::align::AlignedPair;
use crate::error::{Result, SimilarityError, Side};
use crate::types::{IndexKind, Matrix, ReactionClass, Vector};

/// First-order sensitivity of an index to each input component.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// `∂index / ∂Sa`.
    pub application: Vector,
    /// `∂index / ∂Sb`.
    pub benchmark: Vector,
}

impl Gradient {
    /// Stacked gradient `[∂/∂Sa; ∂/∂Sb]`.
    pub fn stacked(&self) -> Vector {
        let n = self.application.len();
        let mut out = Vector::zeros(2 * n);
        out.rows_mut(0, n).copy_from(&self.application);
        out.rows_mut(n, n).copy_from(&self.benchmark);
        out
    }
}

/// Inner-product metric for one index kind.
enum Metric<'a> {
    Covariance(&'a Matrix),
    Identity,
    Masked(Vector),
}

impl<'a> Metric<'a> {
    fn for_kind(kind: IndexKind, pair: &AlignedPair, covariance: &'a Matrix) -> Self {
        let masked = |class| Metric::Masked(pair.index().class_mask(class));
        match kind {
            IndexKind::Ck => Metric::Covariance(covariance),
            IndexKind::E => Metric::Identity,
            IndexKind::EFission => masked(ReactionClass::Fission),
            IndexKind::ECapture => masked(ReactionClass::Capture),
            IndexKind::EScatter => masked(ReactionClass::Scatter),
        }
    }

    fn apply(&self, v: &Vector) -> Vector {
        match self {
            Metric::Covariance(c) => *c * v,
            Metric::Identity => v.clone(),
            Metric::Masked(mask) => v.component_mul(mask),
        }
    }
}

/// Intermediate quantities of one normalized overlap.
struct Overlap {
    /// `W Sa`.
    wa: Vector,
    /// `W Sb`.
    wb: Vector,
    /// `Saᵀ W Sa`.
    norm_a: f64,
    /// `Sbᵀ W Sb`.
    norm_b: f64,
    /// `sqrt(norm_a · norm_b)`.
    denom: f64,
    /// Unclamped index value.
    raw: f64,
}

fn overlap(kind: IndexKind, metric: &Metric<'_>, sa: &Vector, sb: &Vector) -> Result<Overlap> {
    let wa = metric.apply(sa);
    let wb = metric.apply(sb);
    let norm_a = sa.dot(&wa);
    let norm_b = sb.dot(&wb);

    for (which, norm) in [(Side::Application, norm_a), (Side::Benchmark, norm_b)] {
        if !(norm.is_finite() && norm > 0.0) {
            return Err(SimilarityError::DegenerateProfile { kind, which, norm });
        }
    }

    let cross = sa.dot(&wb);
    let denom = (norm_a * norm_b).sqrt();
    Ok(Overlap {
        wa,
        wb,
        norm_a,
        norm_b,
        denom,
        raw: cross / denom,
    })
}

fn check_dimensions(pair: &AlignedPair, covariance: &Matrix) -> Result<()> {
    let n = pair.len();
    if covariance.nrows() != n || covariance.ncols() != n {
        return Err(SimilarityError::invalid_input(format!(
            "covariance is {}x{}, aligned index has {n} components",
            covariance.nrows(),
            covariance.ncols()
        )));
    }
    Ok(())
}

/// Evaluate one index on explicit vectors over `pair`'s index.
pub(crate) fn evaluate(
    kind: IndexKind,
    pair: &AlignedPair,
    covariance: &Matrix,
    sa: &Vector,
    sb: &Vector,
) -> Result<f64> {
    let metric = Metric::for_kind(kind, pair, covariance);
    let o = overlap(kind, &metric, sa, sb)?;
    Ok(o.raw.clamp(-1.0, 1.0))
}

/// Compute one similarity index.
///
/// `covariance` is the nuclear-data covariance over the aligned index (see
/// [`AlignedPair::covariance`]); it is only read by [`IndexKind::Ck`] but its
/// shape is always checked.
pub fn compute(kind: IndexKind, pair: &AlignedPair, covariance: &Matrix) -> Result<f64> {
    check_dimensions(pair, covariance)?;
    evaluate(kind, pair, covariance, pair.application(), pair.benchmark())
}

/// Compute several similarity indices, in the order requested.
pub fn compute_all(
    kinds: &[IndexKind],
    pair: &AlignedPair,
    covariance: &Matrix,
) -> Result<Vec<(IndexKind, f64)>> {
    check_dimensions(pair, covariance)?;
    kinds
        .iter()
        .map(|&kind| {
            evaluate(kind, pair, covariance, pair.application(), pair.benchmark())
                .map(|value| (kind, value))
        })
        .collect()
}

/// Gradient of an index with respect to both sensitivity vectors.
///
/// For `r = u / sqrt(ab)` with `u = Saᵀ W Sb`, `a = Saᵀ W Sa`, `b = Sbᵀ W Sb`:
///
/// ```text
/// ∂r/∂Sa = W Sb / sqrt(ab) − r · W Sa / a
/// ∂r/∂Sb = W Sa / sqrt(ab) − r · W Sb / b
/// ```
///
/// At a self-comparison both terms cancel exactly.
pub fn gradient(kind: IndexKind, pair: &AlignedPair, covariance: &Matrix) -> Result<Gradient> {
    check_dimensions(pair, covariance)?;
    let metric = Metric::for_kind(kind, pair, covariance);
    let o = overlap(kind, &metric, pair.application(), pair.benchmark())?;

    let application = &o.wb / o.denom - &o.wa * (o.raw / o.norm_a);
    let benchmark = &o.wa / o.denom - &o.wb * (o.raw / o.norm_b);
    Ok(Gradient {
        application,
        benchmark,
    })
}
