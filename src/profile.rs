//! Sensitivity profiles, covariance data and benchmark records.
//!
//! These are constructed once per analysis run from numeric arrays handed
//! over by the data-ingestion collaborator and are read-only afterwards.
//! Constructors validate shapes and finiteness; compatibility *between* two
//! structures is checked where they meet (alignment, covariance restriction).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::align::AlignedIndex;
use crate::constants::{GRID_RELATIVE_TOLERANCE, REDUNDANT_REACTIONS, SYMMETRY_RELATIVE_TOLERANCE};
use crate::error::{Result, SimilarityError};
use crate::types::{compare_nuclides, Matrix, NuclideReaction};

/// Energy-group boundary structure.
///
/// `G + 1` strictly monotonic boundaries define `G` groups. Transport codes
/// commonly list boundaries from high to low energy; either direction is
/// accepted, but two grids only match if they list the same boundaries in
/// the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyGrid {
    boundaries: Vec<f64>,
}

impl EnergyGrid {
    /// Create a grid from its boundaries.
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(SimilarityError::invalid_input(format!(
                "energy grid needs at least 2 boundaries, got {}",
                boundaries.len()
            )));
        }
        if boundaries.iter().any(|b| !b.is_finite()) {
            return Err(SimilarityError::invalid_input(
                "energy grid boundaries must be finite",
            ));
        }
        let increasing = boundaries.windows(2).all(|w| w[0] < w[1]);
        let decreasing = boundaries.windows(2).all(|w| w[0] > w[1]);
        if !increasing && !decreasing {
            return Err(SimilarityError::invalid_input(
                "energy grid boundaries must be strictly monotonic",
            ));
        }
        Ok(Self { boundaries })
    }

    /// Boundaries as supplied.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Number of energy groups.
    pub fn num_groups(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Whether two grids describe the same group structure.
    pub fn is_compatible(&self, other: &EnergyGrid) -> bool {
        self.boundaries.len() == other.boundaries.len()
            && self
                .boundaries
                .iter()
                .zip(&other.boundaries)
                .all(|(a, b)| {
                    let scale = a.abs().max(b.abs());
                    (a - b).abs() <= GRID_RELATIVE_TOLERANCE * scale
                })
    }

    /// Fail with `GridMismatch` unless the grids are compatible.
    pub fn ensure_compatible(&self, other: &EnergyGrid) -> Result<()> {
        if self.is_compatible(other) {
            Ok(())
        } else {
            Err(SimilarityError::GridMismatch {
                left: self.clone(),
                right: other.clone(),
            })
        }
    }
}

/// Group-wise sensitivities of one (nuclide, reaction) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSensitivities {
    values: Vec<f64>,
    std_devs: Vec<f64>,
}

impl GroupSensitivities {
    /// Create from sensitivities and their absolute standard deviations.
    pub fn new(values: Vec<f64>, std_devs: Vec<f64>) -> Result<Self> {
        if values.len() != std_devs.len() {
            return Err(SimilarityError::invalid_input(format!(
                "{} sensitivities but {} uncertainties",
                values.len(),
                std_devs.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SimilarityError::invalid_input("sensitivities must be finite"));
        }
        if std_devs.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(SimilarityError::invalid_input(
                "sensitivity uncertainties must be finite and non-negative",
            ));
        }
        Ok(Self { values, std_devs })
    }

    /// Create from sensitivities and relative uncertainties (`σ / |S|`).
    pub fn from_relative(values: Vec<f64>, relative: Vec<f64>) -> Result<Self> {
        if values.len() != relative.len() {
            return Err(SimilarityError::invalid_input(format!(
                "{} sensitivities but {} relative uncertainties",
                values.len(),
                relative.len()
            )));
        }
        let std_devs = values
            .iter()
            .zip(&relative)
            .map(|(v, r)| v.abs() * r)
            .collect();
        Self::new(values, std_devs)
    }

    /// Sensitivities with no statistical uncertainty.
    pub fn exact(values: Vec<f64>) -> Result<Self> {
        let std_devs = vec![0.0; values.len()];
        Self::new(values, std_devs)
    }

    /// Group-wise sensitivities.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Group-wise absolute standard deviations.
    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }

    /// Relative uncertainty of group `g`; 0 when the sensitivity is 0,
    /// `None` when `g` is out of range.
    pub fn relative_uncertainty(&self, g: usize) -> Option<f64> {
        let v = *self.values.get(g)?;
        let sd = *self.std_devs.get(g)?;
        Some(if v == 0.0 { 0.0 } else { sd / v.abs() })
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Energy- and nuclide/reaction-resolved sensitivity profile of one system.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityProfile {
    name: String,
    grid: EnergyGrid,
    entries: BTreeMap<NuclideReaction, GroupSensitivities>,
}

impl SensitivityProfile {
    /// Create a profile from its entries.
    ///
    /// Every entry must have exactly one value per group of `grid`, and keys
    /// must be unique.
    pub fn new(
        name: impl Into<String>,
        grid: EnergyGrid,
        entries: impl IntoIterator<Item = (NuclideReaction, GroupSensitivities)>,
    ) -> Result<Self> {
        let mut profile = Self {
            name: name.into(),
            grid,
            entries: BTreeMap::new(),
        };
        for (key, sens) in entries {
            profile.insert(key, sens)?;
        }
        Ok(profile)
    }

    /// Add one entry, consuming and returning the profile.
    pub fn with_entry(mut self, key: NuclideReaction, sens: GroupSensitivities) -> Result<Self> {
        self.insert(key, sens)?;
        Ok(self)
    }

    fn insert(&mut self, key: NuclideReaction, sens: GroupSensitivities) -> Result<()> {
        if sens.len() != self.grid.num_groups() {
            return Err(SimilarityError::invalid_input(format!(
                "{key}: {} groups supplied, grid has {}",
                sens.len(),
                self.grid.num_groups()
            )));
        }
        if self.entries.contains_key(&key) {
            return Err(SimilarityError::invalid_input(format!(
                "duplicate entry {key} in profile {}",
                self.name
            )));
        }
        self.entries.insert(key, sens);
        Ok(())
    }

    /// Profile name (application or benchmark identifier).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Energy-group structure shared by all entries.
    pub fn grid(&self) -> &EnergyGrid {
        &self.grid
    }

    /// Number of energy groups.
    pub fn num_groups(&self) -> usize {
        self.grid.num_groups()
    }

    /// Number of (nuclide, reaction) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the profile has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for one key.
    pub fn get(&self, key: &NuclideReaction) -> Option<&GroupSensitivities> {
        self.entries.get(key)
    }

    /// Entries in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = (&NuclideReaction, &GroupSensitivities)> {
        self.entries.iter()
    }

    /// Keys in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &NuclideReaction> {
        self.entries.keys()
    }

    /// Distinct nuclides in canonical order.
    pub fn nuclides(&self) -> Vec<&str> {
        let mut nuclides: Vec<&str> = self.entries.keys().map(|k| k.nuclide.as_str()).collect();
        nuclides.sort_by(|a, b| compare_nuclides(a, b));
        nuclides.dedup();
        nuclides
    }

    /// Energy-integrated sensitivity of one entry with its uncertainty
    /// (group uncertainties combined in quadrature).
    pub fn energy_integrated(&self, key: &NuclideReaction) -> Option<(f64, f64)> {
        self.entries.get(key).map(|sens| {
            let total = sens.values.iter().sum();
            let var: f64 = sens.std_devs.iter().map(|s| s * s).sum();
            (total, var.sqrt())
        })
    }

    /// Profile keeping only the listed reaction types.
    pub fn restrict_reactions(&self, reactions: &[&str]) -> Self {
        self.filter(|key| reactions.contains(&key.reaction.as_str()))
    }

    /// Profile without the summary reactions `total`, `capture`, `nubar` and
    /// `chi`, which would double count their partial reactions.
    pub fn without_redundant_reactions(&self) -> Self {
        self.filter(|key| !REDUNDANT_REACTIONS.contains(&key.reaction.as_str()))
    }

    fn filter(&self, keep: impl Fn(&NuclideReaction) -> bool) -> Self {
        Self {
            name: self.name.clone(),
            grid: self.grid.clone(),
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Nuclear-data covariance over (nuclide, reaction) blocks of energy groups.
///
/// Row/column `b * G + g` is group `g` of block `b`. Symmetry and a
/// non-negative diagonal are checked at construction; positive
/// semi-definiteness is not assumed.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    grid: EnergyGrid,
    blocks: Vec<NuclideReaction>,
    positions: HashMap<NuclideReaction, usize>,
    matrix: Matrix,
}

impl CovarianceMatrix {
    /// Create from a block list and the dense matrix.
    pub fn new(grid: EnergyGrid, blocks: Vec<NuclideReaction>, matrix: Matrix) -> Result<Self> {
        let g = grid.num_groups();
        let dim = blocks.len() * g;
        if matrix.nrows() != dim || matrix.ncols() != dim {
            return Err(SimilarityError::invalid_input(format!(
                "covariance is {}x{}, expected {dim}x{dim} for {} blocks of {g} groups",
                matrix.nrows(),
                matrix.ncols(),
                blocks.len()
            )));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(SimilarityError::invalid_input("covariance entries must be finite"));
        }

        let mut positions = HashMap::with_capacity(blocks.len());
        for (i, key) in blocks.iter().enumerate() {
            if positions.insert(key.clone(), i).is_some() {
                return Err(SimilarityError::invalid_input(format!(
                    "duplicate covariance block {key}"
                )));
            }
        }

        let scale = matrix.amax();
        for i in 0..dim {
            if matrix[(i, i)] < 0.0 {
                return Err(SimilarityError::invalid_input(format!(
                    "negative variance {} at diagonal {i}",
                    matrix[(i, i)]
                )));
            }
            for j in (i + 1)..dim {
                if (matrix[(i, j)] - matrix[(j, i)]).abs() > SYMMETRY_RELATIVE_TOLERANCE * scale {
                    return Err(SimilarityError::invalid_input(format!(
                        "covariance not symmetric at ({i}, {j})"
                    )));
                }
            }
        }

        // Remove rounding asymmetry so downstream quadratic forms are exact.
        let matrix = (&matrix + matrix.transpose()) * 0.5;

        Ok(Self {
            grid,
            blocks,
            positions,
            matrix,
        })
    }

    /// Block-diagonal covariance with independent groups.
    ///
    /// Each block lists one variance per group.
    pub fn diagonal(
        grid: EnergyGrid,
        variances: impl IntoIterator<Item = (NuclideReaction, Vec<f64>)>,
    ) -> Result<Self> {
        let g = grid.num_groups();
        let (blocks, vars): (Vec<_>, Vec<_>) = variances.into_iter().unzip();
        let mut diag = Vec::with_capacity(blocks.len() * g);
        for (key, v) in blocks.iter().zip(&vars) {
            if v.len() != g {
                return Err(SimilarityError::invalid_input(format!(
                    "{key}: {} variances supplied, grid has {g}",
                    v.len()
                )));
            }
            diag.extend_from_slice(v);
        }
        let matrix = Matrix::from_diagonal(&nalgebra::DVector::from_vec(diag));
        Self::new(grid, blocks, matrix)
    }

    /// Energy-group structure.
    pub fn grid(&self) -> &EnergyGrid {
        &self.grid
    }

    /// Blocks in row order.
    pub fn blocks(&self) -> &[NuclideReaction] {
        &self.blocks
    }

    /// The dense matrix.
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Re-express the covariance over an aligned index.
    ///
    /// Blocks missing from this covariance contribute zero rows and columns.
    pub fn restrict_to(&self, index: &AlignedIndex) -> Result<Matrix> {
        self.grid.ensure_compatible(index.grid())?;
        let g = self.grid.num_groups();
        let keys = index.keys();
        let mut out = Matrix::zeros(index.len(), index.len());

        let sources: Vec<Option<usize>> =
            keys.iter().map(|k| self.positions.get(k).copied()).collect();
        for (i, src_i) in sources.iter().enumerate() {
            let Some(src_i) = src_i else { continue };
            for (j, src_j) in sources.iter().enumerate() {
                let Some(src_j) = src_j else { continue };
                out.view_mut((i * g, j * g), (g, g))
                    .copy_from(&self.matrix.view((src_i * g, src_j * g), (g, g)));
            }
        }
        Ok(out)
    }
}

/// One benchmark critical experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkEntry {
    id: String,
    profile: SensitivityProfile,
    keff: f64,
    keff_uncertainty: f64,
}

impl BenchmarkEntry {
    /// Create a benchmark record.
    pub fn new(
        id: impl Into<String>,
        profile: SensitivityProfile,
        keff: f64,
        keff_uncertainty: f64,
    ) -> Result<Self> {
        if !keff.is_finite() || keff <= 0.0 {
            return Err(SimilarityError::invalid_input(format!(
                "benchmark keff must be positive and finite, got {keff}"
            )));
        }
        if !keff_uncertainty.is_finite() || keff_uncertainty < 0.0 {
            return Err(SimilarityError::invalid_input(format!(
                "benchmark keff uncertainty must be non-negative, got {keff_uncertainty}"
            )));
        }
        Ok(Self {
            id: id.into(),
            profile,
            keff,
            keff_uncertainty,
        })
    }

    /// Benchmark identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sensitivity profile of the experiment.
    pub fn profile(&self) -> &SensitivityProfile {
        &self.profile
    }

    /// Reference eigenvalue.
    pub fn keff(&self) -> f64 {
        self.keff
    }

    /// Uncertainty of the reference eigenvalue.
    pub fn keff_uncertainty(&self) -> f64 {
        self.keff_uncertainty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid2() -> EnergyGrid {
        EnergyGrid::new(vec![2.0e7, 1.0, 1.0e-5]).unwrap()
    }

    #[test]
    fn grid_requires_monotonic_boundaries() {
        assert!(EnergyGrid::new(vec![1.0]).is_err());
        assert!(EnergyGrid::new(vec![1.0, 3.0, 2.0]).is_err());
        assert!(EnergyGrid::new(vec![1.0, f64::NAN]).is_err());
        assert_eq!(grid2().num_groups(), 2);
    }

    #[test]
    fn grid_compatibility_tolerates_rounding_only() {
        let a = grid2();
        let b = EnergyGrid::new(vec![2.0e7 * (1.0 + 1e-12), 1.0, 1.0e-5]).unwrap();
        let c = EnergyGrid::new(vec![2.0e7, 0.5, 1.0e-5]).unwrap();
        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&c));
        assert!(matches!(
            a.ensure_compatible(&c),
            Err(SimilarityError::GridMismatch { .. })
        ));
    }

    #[test]
    fn profile_rejects_wrong_group_count_and_duplicates() {
        let key = NuclideReaction::new("u-235", "fission");
        let bad = GroupSensitivities::exact(vec![0.1, 0.2, 0.3]).unwrap();
        assert!(SensitivityProfile::new("app", grid2(), [(key.clone(), bad)]).is_err());

        let ok = GroupSensitivities::exact(vec![0.1, 0.2]).unwrap();
        let dup = SensitivityProfile::new("app", grid2(), [(key.clone(), ok.clone()), (key, ok)]);
        assert!(dup.is_err());
    }

    #[test]
    fn relative_uncertainty_round_trips_through_absolute() {
        let sens = GroupSensitivities::from_relative(vec![0.5, -0.2, 0.0], vec![0.02, 0.1, 0.3]).unwrap();
        assert!((sens.std_devs()[0] - 0.01).abs() < 1e-15);
        assert!((sens.std_devs()[1] - 0.02).abs() < 1e-15);
        assert!((sens.relative_uncertainty(1).unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(sens.relative_uncertainty(2), Some(0.0));
        assert_eq!(sens.relative_uncertainty(3), None);
    }

    #[test]
    fn energy_integrated_sums_groups() {
        let key = NuclideReaction::new("u-235", "fission");
        let profile = SensitivityProfile::new(
            "app",
            grid2(),
            [(key.clone(), GroupSensitivities::new(vec![0.3, 0.1], vec![0.03, 0.04]).unwrap())],
        )
        .unwrap();
        let (total, sd) = profile.energy_integrated(&key).unwrap();
        assert!((total - 0.4).abs() < 1e-15);
        assert!((sd - 0.05).abs() < 1e-15);
    }

    #[test]
    fn redundant_reactions_are_filtered() {
        let sens = GroupSensitivities::exact(vec![0.1, 0.1]).unwrap();
        let profile = SensitivityProfile::new(
            "app",
            grid2(),
            ["total", "capture", "nubar", "chi", "fission", "n,gamma"]
                .iter()
                .map(|r| (NuclideReaction::new("u-235", *r), sens.clone())),
        )
        .unwrap();
        let filtered = profile.without_redundant_reactions();
        let reactions: Vec<&str> = filtered.keys().map(|k| k.reaction.as_str()).collect();
        assert_eq!(reactions, vec!["fission", "n,gamma"]);

        let fission_only = profile.restrict_reactions(&["fission"]);
        assert_eq!(fission_only.len(), 1);
    }

    #[test]
    fn nuclides_are_canonical_and_unique() {
        let sens = GroupSensitivities::exact(vec![0.1, 0.1]).unwrap();
        let profile = SensitivityProfile::new(
            "app",
            grid2(),
            [("u-238", "fission"), ("h-1", "elastic"), ("u-238", "n,gamma"), ("o-16", "elastic")]
                .iter()
                .map(|(n, r)| (NuclideReaction::new(*n, *r), sens.clone())),
        )
        .unwrap();
        assert_eq!(profile.nuclides(), vec!["h-1", "o-16", "u-238"]);
    }

    #[test]
    fn covariance_validation() {
        let blocks = vec![NuclideReaction::new("u-235", "fission")];
        let asym = Matrix::from_row_slice(2, 2, &[1.0, 0.5, 0.4, 1.0]);
        assert!(CovarianceMatrix::new(grid2(), blocks.clone(), asym).is_err());

        let neg = Matrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.0, 1.0]);
        assert!(CovarianceMatrix::new(grid2(), blocks.clone(), neg).is_err());

        let wrong = Matrix::identity(3, 3);
        assert!(CovarianceMatrix::new(grid2(), blocks.clone(), wrong).is_err());

        let ok = Matrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        assert!(CovarianceMatrix::new(grid2(), blocks, ok).is_ok());
    }

    #[test]
    fn benchmark_requires_positive_keff() {
        let profile = SensitivityProfile::new("b", grid2(), Vec::new()).unwrap();
        assert!(BenchmarkEntry::new("b", profile.clone(), 0.0, 0.001).is_err());
        assert!(BenchmarkEntry::new("b", profile.clone(), 1.0, -0.1).is_err());
        let entry = BenchmarkEntry::new("b", profile, 0.9998, 0.0012).unwrap();
        assert_eq!(entry.id(), "b");
        assert!((entry.keff() - 0.9998).abs() < 1e-15);
    }
}
