//! Type aliases and common types.

use std::cmp::Ordering;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Dense vector over an aligned (nuclide, reaction, group) index space.
pub type Vector = DVector<f64>;

/// Dense matrix over an aligned (nuclide, reaction, group) index space.
pub type Matrix = DMatrix<f64>;

/// Similarity index kinds.
///
/// Closed set: every computation over index kinds matches exhaustively, so a
/// new metric cannot be added without every formula site being revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexKind {
    /// Covariance-weighted correlation coefficient, bounded to [-1, 1].
    Ck,
    /// Normalized overlap of the full sensitivity vectors (1 for identical profiles).
    E,
    /// `E` restricted to fission sensitivities.
    EFission,
    /// `E` restricted to capture-type sensitivities.
    ECapture,
    /// `E` restricted to scattering sensitivities.
    EScatter,
}

impl IndexKind {
    /// All kinds, in reporting order.
    pub const ALL: [IndexKind; 5] = [
        IndexKind::Ck,
        IndexKind::E,
        IndexKind::EFission,
        IndexKind::ECapture,
        IndexKind::EScatter,
    ];

    /// Reaction class a partial `E` index is restricted to.
    pub fn reaction_class(self) -> Option<ReactionClass> {
        match self {
            IndexKind::Ck | IndexKind::E => None,
            IndexKind::EFission => Some(ReactionClass::Fission),
            IndexKind::ECapture => Some(ReactionClass::Capture),
            IndexKind::EScatter => Some(ReactionClass::Scatter),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::Ck => "ck",
            IndexKind::E => "E",
            IndexKind::EFission => "E(fis)",
            IndexKind::ECapture => "E(cap)",
            IndexKind::EScatter => "E(sct)",
        };
        f.write_str(name)
    }
}

/// Reaction families used by the partial `E` indices.
///
/// Each family is a single reaction. Sensitivity data carries summary
/// reactions (`capture`) next to their partial ones (`n,gamma`, `n,p`), so
/// taking more than one would count the same physics twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionClass {
    /// `fission`.
    Fission,
    /// `capture`, the summed non-fission absorption.
    Capture,
    /// `elastic`.
    Scatter,
}

impl ReactionClass {
    /// Classify a reaction name; `None` for reactions outside every class
    /// (e.g. `n,gamma`, `n,n'`, `nubar`).
    pub fn of(reaction: &str) -> Option<Self> {
        match reaction.trim().to_ascii_lowercase().as_str() {
            "fission" => Some(ReactionClass::Fission),
            "capture" => Some(ReactionClass::Capture),
            "elastic" => Some(ReactionClass::Scatter),
            _ => None,
        }
    }
}

/// A (nuclide, reaction) block key.
///
/// Ordering is canonical: nuclides by the first number in their name (mass
/// number for names like `u-235`, names without digits last), then by name,
/// then by reaction name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NuclideReaction {
    /// Nuclide name, e.g. `u-235`.
    pub nuclide: String,
    /// Reaction name, e.g. `fission`.
    pub reaction: String,
}

impl NuclideReaction {
    /// Create a key.
    pub fn new(nuclide: impl Into<String>, reaction: impl Into<String>) -> Self {
        Self {
            nuclide: nuclide.into(),
            reaction: reaction.into(),
        }
    }
}

impl fmt::Display for NuclideReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.nuclide, self.reaction)
    }
}

impl Ord for NuclideReaction {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_nuclides(&self.nuclide, &other.nuclide)
            .then_with(|| self.reaction.cmp(&other.reaction))
    }
}

impl PartialOrd for NuclideReaction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// First run of ASCII digits in a nuclide name.
fn nuclide_number(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Canonical nuclide ordering.
pub(crate) fn compare_nuclides(a: &str, b: &str) -> Ordering {
    match (nuclide_number(a), nuclide_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
