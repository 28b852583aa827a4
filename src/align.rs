//! Profile alignment onto a common (nuclide, reaction, group) index space.
//!
//! The union of both profiles' keys is laid out canonically (nuclide, then
//! reaction, then ascending group) as dense vectors so the weighted inner
//! products downstream run over contiguous memory instead of key lookups.
//! Keys present in only one profile contribute exactly zero sensitivity and
//! zero uncertainty on the other side.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::error::Result;
use crate::profile::{CovarianceMatrix, EnergyGrid, SensitivityProfile};
use crate::types::{Matrix, NuclideReaction, ReactionClass, Vector};

/// Canonically ordered union index of two profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedIndex {
    grid: EnergyGrid,
    keys: Vec<NuclideReaction>,
}

impl AlignedIndex {
    /// Energy-group structure shared by both profiles.
    pub fn grid(&self) -> &EnergyGrid {
        &self.grid
    }

    /// Block keys in canonical order.
    pub fn keys(&self) -> &[NuclideReaction] {
        &self.keys
    }

    /// Number of groups per block.
    pub fn num_groups(&self) -> usize {
        self.grid.num_groups()
    }

    /// Total number of components (`blocks × groups`).
    pub fn len(&self) -> usize {
        self.keys.len() * self.grid.num_groups()
    }

    /// Whether the index has no components.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Component range of each block, in order.
    pub fn blocks(&self) -> impl Iterator<Item = (&NuclideReaction, Range<usize>)> {
        let g = self.grid.num_groups();
        self.keys
            .iter()
            .enumerate()
            .map(move |(i, key)| (key, i * g..(i + 1) * g))
    }

    /// Block key owning component `component`.
    pub fn key_of(&self, component: usize) -> &NuclideReaction {
        &self.keys[component / self.grid.num_groups()]
    }

    /// 1.0 for components whose reaction belongs to `class`, 0.0 otherwise.
    pub fn class_mask(&self, class: ReactionClass) -> Vector {
        let g = self.grid.num_groups();
        Vector::from_iterator(
            self.len(),
            self.keys.iter().flat_map(|key| {
                let hit = if ReactionClass::of(&key.reaction) == Some(class) {
                    1.0
                } else {
                    0.0
                };
                std::iter::repeat(hit).take(g)
            }),
        )
    }
}

/// Two profiles re-expressed over an identical ordered index.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    index: AlignedIndex,
    application_name: String,
    benchmark_name: String,
    application: Vector,
    benchmark: Vector,
    application_std: Vector,
    benchmark_std: Vector,
}

impl AlignedPair {
    /// The shared index.
    pub fn index(&self) -> &AlignedIndex {
        &self.index
    }

    /// Name of the application profile.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Name of the benchmark profile.
    pub fn benchmark_name(&self) -> &str {
        &self.benchmark_name
    }

    /// Application sensitivities (`Sa`).
    pub fn application(&self) -> &Vector {
        &self.application
    }

    /// Benchmark sensitivities (`Sb`).
    pub fn benchmark(&self) -> &Vector {
        &self.benchmark
    }

    /// Absolute standard deviations of `Sa`.
    pub fn application_std(&self) -> &Vector {
        &self.application_std
    }

    /// Absolute standard deviations of `Sb`.
    pub fn benchmark_std(&self) -> &Vector {
        &self.benchmark_std
    }

    /// Number of aligned components.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no aligned components.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Copy with both sides replaced, keeping the index.
    ///
    /// Used by sampling propagation to evaluate indices on perturbed draws.
    pub(crate) fn with_vectors(&self, application: Vector, benchmark: Vector) -> Self {
        Self {
            application,
            benchmark,
            ..self.clone()
        }
    }

    /// Nuclear-data covariance restricted to this pair's index.
    pub fn covariance(&self, covariance: &CovarianceMatrix) -> Result<Matrix> {
        covariance.restrict_to(&self.index)
    }
}

/// Align two profiles over the union of their keys.
///
/// Fails with `GridMismatch` when the energy-group structures differ; no
/// reindexing or truncation is attempted.
pub fn align(application: &SensitivityProfile, benchmark: &SensitivityProfile) -> Result<AlignedPair> {
    application.grid().ensure_compatible(benchmark.grid())?;

    let keys: Vec<NuclideReaction> = application
        .keys()
        .chain(benchmark.keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index = AlignedIndex {
        grid: application.grid().clone(),
        keys,
    };

    let (app, app_std) = densify(application, &index);
    let (bench, bench_std) = densify(benchmark, &index);

    Ok(AlignedPair {
        index,
        application_name: application.name().to_string(),
        benchmark_name: benchmark.name().to_string(),
        application: app,
        benchmark: bench,
        application_std: app_std,
        benchmark_std: bench_std,
    })
}

/// Align two profiles and restrict a nuclear-data covariance onto the result.
pub fn align_with_covariance(
    application: &SensitivityProfile,
    benchmark: &SensitivityProfile,
    covariance: &CovarianceMatrix,
) -> Result<(AlignedPair, Matrix)> {
    let pair = align(application, benchmark)?;
    let cov = pair.covariance(covariance)?;
    Ok((pair, cov))
}

fn densify(profile: &SensitivityProfile, index: &AlignedIndex) -> (Vector, Vector) {
    let mut values = Vector::zeros(index.len());
    let mut std_devs = Vector::zeros(index.len());
    for (key, range) in index.blocks() {
        if let Some(sens) = profile.get(key) {
            values.rows_mut(range.start, range.len()).copy_from_slice(sens.values());
            std_devs.rows_mut(range.start, range.len()).copy_from_slice(sens.std_devs());
        }
    }
    (values, std_devs)
}
