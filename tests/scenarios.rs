use simgroup::core::embedding::NormalizedBatch;
use simgroup::{
    BruteForceClusteringService, ClusteringService, ConfigError, EngineConfig, GroupingError,
    LshClusteringService, OversizedBucketPolicy, group_embeddings, similar_sets,
};

#[test]
fn test_near_identical_pair_in_two_dimensions() {
    let a = vec![1.0, 0.0];
    let b = vec![0.999, 0.001];
    let c = vec![0.0, 1.0];
    let d = vec![-1.0, 0.0];

    let groups = group_embeddings(&[a, b, c, d], 0.95).unwrap();
    assert_eq!(groups, vec![vec![0, 1], vec![2], vec![3]]);
    assert_eq!(similar_sets(&groups), vec![vec![0, 1]]);
}

#[test]
fn test_dimension_mismatch_is_rejected() {
    let err = group_embeddings(&[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]], 0.9).unwrap_err();
    assert!(matches!(
        err,
        GroupingError::DimensionMismatch {
            index: 1,
            expected: 2,
            found: 3
        }
    ));
}

#[test]
fn test_empty_input_is_distinguishable_from_no_groups() {
    let err = group_embeddings(&[], 0.9).unwrap_err();
    assert!(err.is_empty_input());

    let groups = group_embeddings(&[vec![1.0, 0.0], vec![0.0, 1.0]], 0.9).unwrap();
    assert!(similar_sets(&groups).is_empty());
    assert_eq!(groups.len(), 2);
}

#[test]
fn test_exact_duplicates_grouped_at_threshold_one() {
    let v = vec![0.12, -0.7, 0.33, 0.05, 0.9];
    let groups = group_embeddings(&[v.clone(), vec![0.5, 0.5, 0.5, 0.5, 0.5], v], 1.0).unwrap();
    assert_eq!(groups, vec![vec![0, 2], vec![1]]);
}

#[test]
fn test_scaled_copies_are_duplicates() {
    let groups = group_embeddings(
        &[vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0], vec![-3.0, 0.0, 1.0]],
        0.999,
    )
    .unwrap();
    assert_eq!(groups, vec![vec![0, 1], vec![2]]);
}

#[test]
fn test_large_magnitude_duplicates_are_grouped() {
    let groups = group_embeddings(&[vec![1e20; 3], vec![1e20; 3]], 0.9).unwrap();
    assert_eq!(groups, vec![vec![0, 1]]);

    let groups = group_embeddings(
        &[vec![f32::MAX, -f32::MAX], vec![1.0, -1.0], vec![-3e30, 3e30]],
        1.0,
    )
    .unwrap();
    assert_eq!(groups, vec![vec![0, 1], vec![2]]);
}

// ---------------------------------------------------------------------------
// Threshold boundary: a pair at exactly the threshold links, one ulp above
// does not, and a pair just under the threshold never links.
// ---------------------------------------------------------------------------

fn pair_at_cosine(cosine: f32) -> Vec<Vec<f32>> {
    vec![vec![1.0, 0.0], vec![cosine, (1.0 - cosine * cosine).sqrt()]]
}

fn boundary_services() -> Vec<Box<dyn ClusteringService>> {
    vec![
        Box::new(BruteForceClusteringService::new()),
        // Two planes per table keep a pair ~18 degrees apart colliding.
        Box::new(LshClusteringService::new(EngineConfig::default().with_planes(2)).unwrap()),
    ]
}

#[test]
fn test_pair_at_threshold_is_linked() {
    let items = pair_at_cosine(0.95);
    let similarity = NormalizedBatch::from_embeddings(&items)
        .unwrap()
        .similarity(0, 1);
    let just_above = f32::from_bits(similarity.to_bits() + 1);

    for service in boundary_services() {
        assert_eq!(
            service.group_embeddings(&items, similarity).unwrap(),
            vec![vec![0, 1]]
        );
        assert_eq!(
            service.group_embeddings(&items, just_above).unwrap(),
            vec![vec![0], vec![1]]
        );
    }
}

#[test]
fn test_pair_just_below_threshold_is_not_linked() {
    let items = pair_at_cosine(0.949_999_5);
    let similarity = NormalizedBatch::from_embeddings(&items)
        .unwrap()
        .similarity(0, 1);
    assert!(similarity < 0.95);

    for service in boundary_services() {
        assert_eq!(
            service.group_embeddings(&items, 0.95).unwrap(),
            vec![vec![0], vec![1]]
        );
        assert_eq!(
            service.group_embeddings(&items, 0.9499).unwrap(),
            vec![vec![0, 1]]
        );
    }
}

#[test]
fn test_zero_vectors_have_zero_similarity() {
    let zeros = vec![vec![0.0; 3], vec![0.0; 3]];
    let apart = group_embeddings(&zeros, 0.5).unwrap();
    assert_eq!(apart, vec![vec![0], vec![1]]);

    let together = group_embeddings(&zeros, 0.0).unwrap();
    assert_eq!(together, vec![vec![0, 1]]);
}

#[test]
fn test_non_finite_values_reject_the_call() {
    let err = group_embeddings(&[vec![1.0, 0.0], vec![f32::INFINITY, 0.0]], 0.9).unwrap_err();
    assert!(matches!(
        err,
        GroupingError::NonFiniteValue {
            index: 1,
            position: 0
        }
    ));
}

#[test]
fn test_too_many_planes_rejected_at_construction() {
    let err = LshClusteringService::new(EngineConfig::default().with_planes(65)).unwrap_err();
    assert!(matches!(
        err,
        GroupingError::Config(ConfigError::TooManyPlanes { planes: 65, max: 64 })
    ));
}

#[test]
fn test_transitive_chain_is_one_group() {
    // Consecutive items are ~5 degrees apart; the ends are ~20 degrees apart.
    let items: Vec<Vec<f32>> = (0..5)
        .map(|i| {
            let angle = (i as f32 * 5.0).to_radians();
            vec![angle.cos(), angle.sin()]
        })
        .collect();
    let cos_5_deg = 5.0f32.to_radians().cos();
    let report = LshClusteringService::default()
        .group_with_report(&items, cos_5_deg - 1e-4)
        .unwrap();

    assert_eq!(report.groups, vec![vec![0, 1, 2, 3, 4]]);
    assert!(report.stats.matches >= 4);
}

// ---------------------------------------------------------------------------
// Oversized buckets: identical vectors collide in every table.
// ---------------------------------------------------------------------------

fn identical(count: usize) -> Vec<Vec<f32>> {
    vec![vec![0.25, -0.5, 0.75, 0.1, 0.3, -0.2, 0.05, 0.9]; count]
}

#[test]
fn test_bucket_at_limit_is_scored() {
    let report = LshClusteringService::default()
        .group_with_report(&identical(1000), 0.99)
        .unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 1000);
    assert_eq!(report.stats.oversized_buckets, 0);
    assert_eq!(report.stats.pairs_scored, 1000 * 999 / 2);
}

#[test]
fn test_bucket_over_limit_is_never_scored() {
    let report = LshClusteringService::default()
        .group_with_report(&identical(1001), 0.99)
        .unwrap();

    assert_eq!(report.largest_bucket, Some(1001));
    assert_eq!(report.stats.oversized_buckets, 10);
    assert_eq!(report.stats.oversized_buckets_skipped, 10);
    assert_eq!(report.stats.pairs_scored, 0);
    assert_eq!(report.groups.len(), 1001);
    assert!(report.similar_sets().is_empty());
}

#[test]
fn test_exhaustive_policy_recovers_oversized_bucket() {
    let service = LshClusteringService::new(
        EngineConfig::default()
            .with_max_bucket_size(50)
            .with_oversized_policy(OversizedBucketPolicy::Exhaustive),
    )
    .unwrap();
    let report = service.group_with_report(&identical(60), 0.99).unwrap();

    assert_eq!(report.stats.oversized_buckets, 10);
    assert_eq!(report.stats.oversized_buckets_skipped, 0);
    assert_eq!(report.groups, vec![(0..60).collect::<Vec<_>>()]);
}
