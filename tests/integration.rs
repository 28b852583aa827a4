//! End-to-end integration tests.

use benchmark_similarity::{
    compare, BenchmarkEntry, CovarianceMatrix, EnergyGrid, GroupSensitivities, IndexKind,
    NuclideReaction, RankingCriteria, SensitivityProfile, SimilarityEngine, SimilarityError,
};

fn grid() -> EnergyGrid {
    EnergyGrid::new(vec![2.0e7, 1.0e5, 1.0e2, 1.0, 1.0e-5]).unwrap()
}

fn key(nuclide: &str, reaction: &str) -> NuclideReaction {
    NuclideReaction::new(nuclide, reaction)
}

fn profile(name: &str, fission: [f64; 4], capture: [f64; 4], scatter: [f64; 4]) -> SensitivityProfile {
    let sens = |v: [f64; 4]| GroupSensitivities::from_relative(v.to_vec(), vec![0.02; 4]).unwrap();
    SensitivityProfile::new(
        name,
        grid(),
        [
            (key("u-235", "fission"), sens(fission)),
            (key("u-238", "n,gamma"), sens(capture)),
            (key("h-1", "elastic"), sens(scatter)),
        ],
    )
    .unwrap()
}

fn covariance() -> CovarianceMatrix {
    CovarianceMatrix::diagonal(
        grid(),
        [
            (key("u-235", "fission"), vec![0.0004, 0.0002, 0.0001, 0.0001]),
            (key("u-238", "n,gamma"), vec![0.0025, 0.0016, 0.0009, 0.0004]),
            (key("h-1", "elastic"), vec![0.0001, 0.0001, 0.0001, 0.0001]),
        ],
    )
    .unwrap()
}

fn application() -> SensitivityProfile {
    profile(
        "app",
        [0.05, 0.10, 0.15, 0.30],
        [-0.01, -0.03, -0.04, -0.06],
        [0.01, 0.04, 0.03, 0.02],
    )
}

fn library() -> Vec<BenchmarkEntry> {
    let b = |id: &str, f: [f64; 4], c: [f64; 4], s: [f64; 4], keff: f64| {
        BenchmarkEntry::new(id, profile(id, f, c, s), keff, 0.002).unwrap()
    };
    vec![
        b("heu-sol-therm-001", [0.05, 0.11, 0.14, 0.31], [-0.01, -0.03, -0.04, -0.05], [0.01, 0.04, 0.03, 0.02], 0.9998),
        b("leu-comp-therm-008", [0.04, 0.08, 0.16, 0.25], [-0.03, -0.06, -0.05, -0.08], [0.02, 0.05, 0.03, 0.02], 1.0007),
        b("heu-met-fast-001", [0.40, 0.20, 0.01, 0.00], [-0.02, -0.01, 0.00, 0.00], [0.03, 0.01, 0.00, 0.00], 1.0000),
        b("pu-sol-therm-011", [0.02, 0.06, 0.12, 0.35], [-0.01, -0.02, -0.05, -0.07], [0.01, 0.03, 0.04, 0.03], 1.0012),
    ]
}

/// Basic smoke test that the API works.
#[test]
fn smoke_test() {
    let app = application();
    let lib = library();
    let comparison = compare(&app, lib[0].profile(), &covariance()).unwrap();
    assert_eq!(comparison.indices.len(), 2);
    for index in &comparison.indices {
        assert!((-1.0..=1.0).contains(&index.value));
        assert!(index.uncertainty >= 0.0);
    }
}

#[test]
fn library_assessment_and_ranking() {
    let app = application();
    let lib = library();
    let engine = SimilarityEngine::new();
    let batch = engine.assess(&app, &lib, &covariance());
    assert!(batch.is_complete());
    assert_eq!(batch.assessments.len(), lib.len());

    let ranked = engine.rank(&batch, &RankingCriteria::by(IndexKind::Ck)).unwrap();
    assert_eq!(ranked.len(), 4);
    assert_eq!(ranked.ids()[0], "heu-sol-therm-001");
    assert_eq!(*ranked.ids().last().unwrap(), "heu-met-fast-001");
    assert!(ranked
        .entries
        .windows(2)
        .all(|w| w[0].index.value + ranked.criteria.tie_tolerance >= w[1].index.value));
}

#[test]
fn ranking_ignores_library_order() {
    let app = application();
    let lib = library();
    let mut reversed = library();
    reversed.reverse();
    let engine = SimilarityEngine::new();
    let criteria = RankingCriteria::by(IndexKind::E);

    let forward = engine.assess(&app, &lib, &covariance());
    let backward = engine.assess(&app, &reversed, &covariance());
    let r1 = engine.rank(&forward, &criteria).unwrap();
    let r2 = engine.rank(&backward, &criteria).unwrap();
    assert_eq!(r1.ids(), r2.ids());

    // Repeated runs give the same order.
    let again = engine.rank(&engine.assess(&app, &lib, &covariance()), &criteria).unwrap();
    assert_eq!(r1.ids(), again.ids());
}

#[test]
fn minimum_similarity_filter_excludes_entries() {
    let app = application();
    let lib = library();
    let engine = SimilarityEngine::new();
    let batch = engine.assess(&app, &lib, &covariance());

    for threshold in [0.5, 0.9, 0.99] {
        let ranked = engine
            .rank(&batch, &RankingCriteria::by(IndexKind::Ck).min_similarity(threshold))
            .unwrap();
        assert!(ranked.entries.iter().all(|e| e.index.value >= threshold));
        assert_eq!(ranked.len() + ranked.excluded, lib.len());
    }
}

#[test]
fn ranking_by_uncomputed_kind_fails() {
    let app = application();
    let lib = library();
    let engine = SimilarityEngine::new().indices(&[IndexKind::E]);
    let batch = engine.assess(&app, &lib, &covariance());
    assert!(matches!(
        engine.rank(&batch, &RankingCriteria::by(IndexKind::Ck)),
        Err(SimilarityError::IndexNotComputed { kind: IndexKind::Ck, .. })
    ));
}

#[test]
fn mismatched_grid_is_reported_per_benchmark() {
    let app = application();
    let mut lib = library();
    let coarse = EnergyGrid::new(vec![2.0e7, 1.0, 1.0e-5]).unwrap();
    let odd = SensitivityProfile::new(
        "coarse",
        coarse,
        [(key("u-235", "fission"), GroupSensitivities::exact(vec![0.2, 0.3]).unwrap())],
    )
    .unwrap();
    lib.push(BenchmarkEntry::new("coarse", odd, 1.0, 0.001).unwrap());

    let batch = SimilarityEngine::new().assess(&app, &lib, &covariance());
    assert_eq!(batch.assessments.len(), 4);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].benchmark_id, "coarse");
    assert!(matches!(batch.failures[0].error, SimilarityError::GridMismatch { .. }));
}

#[test]
fn contribution_tables() {
    let app = application();
    let lib = library();
    let engine = SimilarityEngine::new();

    let sandwich = engine.uncertainty_contributions(&app, &covariance()).unwrap();
    assert!(sandwich.std_dev > 0.0);
    assert_eq!(sandwich.contributions.len(), 3);

    let e = engine.e_contributions(&app, lib[1].profile()).unwrap();
    assert_eq!(e.by_nuclide.len(), 3);
    assert_eq!(e.by_nuclide_reaction.len(), 3);

    let ck = engine.ck_contributions(&app, lib[1].profile(), &covariance()).unwrap();
    assert!(!ck.is_empty());
}

/// Test result serialization.
#[test]
fn result_serialization() {
    let app = application();
    let lib = library();
    let engine = SimilarityEngine::new();
    let batch = engine.assess(&app, &lib, &covariance());
    let ranked = engine.rank(&batch, &RankingCriteria::default()).unwrap();

    let json = serde_json::to_string(&ranked).expect("Should serialize");
    assert!(json.contains("heu-sol-therm-001"));
    assert!(json.contains("keff_uncertainty"));
    assert!(json.contains("tie_tolerance"));

    let comparison = &batch.assessments[0].comparison;
    let json = serde_json::to_string(comparison).unwrap();
    let back: benchmark_similarity::Comparison = serde_json::from_str(&json).unwrap();
    assert_eq!(back.benchmark, comparison.benchmark);
    assert_eq!(back.method, comparison.method);
    for (x, y) in back.indices.iter().zip(&comparison.indices) {
        assert_eq!(x.kind, y.kind);
        assert!((x.value - y.value).abs() < 1e-12);
    }

    let config = serde_json::to_string(SimilarityEngine::thorough().config()).unwrap();
    assert!(config.contains("Sampling"));
}
