//! Benchmark ranking and filtering.
//!
//! Benchmarks are ordered by descending similarity. Values within
//! `tie_tolerance` of a tie group's leader are treated as equal and ordered
//! by ascending uncertainty, then identifier, so the result does not depend
//! on the order benchmarks were supplied in.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimilarityError};
use crate::profile::BenchmarkEntry;
use crate::result::{serialize_benchmark, Assessment, SimilarityIndex};
use crate::types::IndexKind;

/// Ordering and filter criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingCriteria {
    /// Index to sort by (default: `ck`).
    pub kind: IndexKind,

    /// Values this close to a group leader are ties (default: 1e-6).
    pub tie_tolerance: f64,

    /// Keep only entries with `value >= min_similarity`.
    pub min_similarity: Option<f64>,

    /// Keep only entries with `uncertainty <= max_uncertainty`.
    pub max_uncertainty: Option<f64>,
}

impl Default for RankingCriteria {
    fn default() -> Self {
        Self {
            kind: IndexKind::Ck,
            tie_tolerance: 1e-6,
            min_similarity: None,
            max_uncertainty: None,
        }
    }
}

impl RankingCriteria {
    /// Criteria sorting by `kind` with default tolerance and no filters.
    pub fn by(kind: IndexKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Set the minimum similarity filter.
    pub fn min_similarity(mut self, value: f64) -> Self {
        self.min_similarity = Some(value);
        self
    }

    /// Set the maximum uncertainty filter.
    pub fn max_uncertainty(mut self, value: f64) -> Self {
        self.max_uncertainty = Some(value);
        self
    }

    /// Set the tie tolerance.
    pub fn tie_tolerance(mut self, value: f64) -> Self {
        self.tie_tolerance = value;
        self
    }

    fn admits(&self, index: &SimilarityIndex) -> bool {
        self.min_similarity.map_or(true, |v| index.value >= v)
            && self.max_uncertainty.map_or(true, |u| index.uncertainty <= u)
    }
}

/// One ranked benchmark.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry<'a> {
    /// 1-based position.
    pub rank: usize,

    /// The benchmark.
    #[serde(serialize_with = "serialize_benchmark")]
    pub benchmark: &'a BenchmarkEntry,

    /// Its index of the ranking kind.
    pub index: SimilarityIndex,
}

/// Benchmarks in ranked order.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult<'a> {
    /// Criteria the ranking was produced with.
    pub criteria: RankingCriteria,

    /// Qualifying entries, best first.
    pub entries: Vec<RankedEntry<'a>>,

    /// Number of entries removed by the filters.
    pub excluded: usize,
}

impl RankedResult<'_> {
    /// Identifiers in ranked order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.benchmark.id()).collect()
    }

    /// Number of qualifying entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry qualified.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rank assessed benchmarks by `criteria.kind`.
///
/// # Errors
///
/// - `IndexNotComputed` if any assessment lacks the ranking kind
/// - `InvalidInput` for a negative or non-finite tie tolerance, or duplicate
///   benchmark identifiers (which would make the order input-dependent)
pub fn rank<'a>(assessments: &[Assessment<'a>], criteria: &RankingCriteria) -> Result<RankedResult<'a>> {
    if !(criteria.tie_tolerance.is_finite() && criteria.tie_tolerance >= 0.0) {
        return Err(SimilarityError::invalid_input(format!(
            "tie tolerance must be finite and non-negative, got {}",
            criteria.tie_tolerance
        )));
    }

    let mut seen = HashSet::with_capacity(assessments.len());
    let mut candidates = Vec::with_capacity(assessments.len());
    for a in assessments {
        let id = a.benchmark.id();
        if !seen.insert(id) {
            return Err(SimilarityError::invalid_input(format!(
                "duplicate benchmark identifier {id}"
            )));
        }
        let index = a.index(criteria.kind).ok_or_else(|| SimilarityError::IndexNotComputed {
            kind: criteria.kind,
            benchmark_id: id.to_string(),
        })?;
        candidates.push((a.benchmark, *index));
    }

    let total = candidates.len();
    candidates.retain(|(_, index)| criteria.admits(index));
    let excluded = total - candidates.len();

    candidates.sort_by(|(ba, ia), (bb, ib)| {
        ib.value
            .total_cmp(&ia.value)
            .then_with(|| ba.id().cmp(bb.id()))
    });

    let mut ordered = Vec::with_capacity(candidates.len());
    let mut rest = candidates.as_slice();
    while let Some((_, leader)) = rest.first() {
        let len = rest
            .iter()
            .take_while(|(_, i)| leader.value - i.value <= criteria.tie_tolerance)
            .count();
        let mut group = rest[..len].to_vec();
        group.sort_by(by_confidence);
        ordered.extend(group);
        rest = &rest[len..];
    }

    Ok(RankedResult {
        criteria: *criteria,
        entries: ordered
            .into_iter()
            .enumerate()
            .map(|(i, (benchmark, index))| RankedEntry {
                rank: i + 1,
                benchmark,
                index,
            })
            .collect(),
        excluded,
    })
}

fn by_confidence(
    (ba, ia): &(&BenchmarkEntry, SimilarityIndex),
    (bb, ib): &(&BenchmarkEntry, SimilarityIndex),
) -> Ordering {
    ia.uncertainty
        .total_cmp(&ib.uncertainty)
        .then_with(|| ba.id().cmp(bb.id()))
}
