//! Result types and related structures.

use serde::{Deserialize, Serialize, Serializer};

use crate::config::PropagationMethod;
use crate::error::SimilarityError;
use crate::profile::BenchmarkEntry;
use crate::propagation::SamplingSummary;
use crate::types::IndexKind;

/// One similarity index with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityIndex {
    /// Which index.
    pub kind: IndexKind,

    /// Nominal value, in [-1, 1].
    pub value: f64,

    /// Standard deviation from the configured propagation method.
    pub uncertainty: f64,
}

/// All requested indices for one application-benchmark comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Application profile name.
    pub application: String,

    /// Benchmark profile name.
    pub benchmark: String,

    /// How `uncertainty` was obtained.
    pub method: PropagationMethod,

    /// Indices in the order requested.
    pub indices: Vec<SimilarityIndex>,

    /// Full sampled distributions (sampling propagation only).
    pub sampling: Option<Vec<SamplingSummary>>,
}

impl Comparison {
    /// The index of kind `kind`, if it was computed.
    pub fn get(&self, kind: IndexKind) -> Option<&SimilarityIndex> {
        self.indices.iter().find(|i| i.kind == kind)
    }
}

/// A benchmark together with its comparison against the application.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment<'a> {
    /// The benchmark that was compared.
    #[serde(serialize_with = "serialize_benchmark")]
    pub benchmark: &'a BenchmarkEntry,

    /// Its indices against the application.
    pub comparison: Comparison,
}

impl Assessment<'_> {
    /// Shorthand for `self.comparison.get(kind)`.
    pub fn index(&self, kind: IndexKind) -> Option<&SimilarityIndex> {
        self.comparison.get(kind)
    }
}

/// A benchmark whose comparison failed.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkFailure {
    /// Identifier of the failed benchmark.
    pub benchmark_id: String,

    /// Why it failed.
    #[serde(serialize_with = "serialize_error")]
    pub error: SimilarityError,
}

/// Outcome of comparing one application against a benchmark library.
///
/// Failures are kept next to the successes; none are dropped.
#[derive(Debug, Clone, Serialize)]
pub struct BatchAssessment<'a> {
    /// Application profile name.
    pub application: String,

    /// Successful comparisons, in input order.
    pub assessments: Vec<Assessment<'a>>,

    /// Failed comparisons, in input order.
    pub failures: Vec<BenchmarkFailure>,
}

impl BatchAssessment<'_> {
    /// Whether every benchmark was assessed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Serialize)]
struct BenchmarkSummary<'a> {
    id: &'a str,
    keff: f64,
    keff_uncertainty: f64,
}

/// Benchmarks serialize as their identification only; profiles stay with the
/// caller that supplied them.
pub(crate) fn serialize_benchmark<S: Serializer>(
    entry: &&BenchmarkEntry,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    BenchmarkSummary {
        id: entry.id(),
        keff: entry.keff(),
        keff_uncertainty: entry.keff_uncertainty(),
    }
    .serialize(serializer)
}

fn serialize_error<S: Serializer>(error: &SimilarityError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
