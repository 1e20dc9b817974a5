use crate::config::EngineConfig;
use crate::core::bucket::BucketIndex;
use crate::core::candidate::{CandidatePairGenerator, CandidateStats};
use crate::core::embedding::{NormalizedBatch, meets_threshold};
use crate::core::hyperplane::HyperplaneBank;
use crate::core::signature::SignatureHasher;
use crate::core::union_find::DisjointSet;
use crate::error::GroupingError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Partition of `0..N` plus the counters gathered while building it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingReport {
    /// Members ascending; groups ordered by their smallest member.
    pub groups: Vec<Vec<usize>>,
    pub item_count: usize,
    pub dim: usize,
    /// `None` for strategies that never bucket.
    pub largest_bucket: Option<usize>,
    pub stats: CandidateStats,
}

impl GroupingReport {
    /// Groups with at least two members.
    pub fn similar_sets(&self) -> Vec<Vec<usize>> {
        similar_sets(&self.groups)
    }
}

/// Drop singleton groups, keeping only sets of similar items.
pub fn similar_sets(groups: &[Vec<usize>]) -> Vec<Vec<usize>> {
    groups.iter().filter(|g| g.len() > 1).cloned().collect()
}

/// A strategy that partitions embeddings into groups of similar items.
///
/// Implementors only provide [`ClusteringService::group_with_report`];
/// callers that just want the partition use
/// [`ClusteringService::group_embeddings`].
pub trait ClusteringService: Send + Sync {
    fn group_with_report(
        &self,
        embeddings: &[Vec<f32>],
        threshold: f32,
    ) -> Result<GroupingReport, GroupingError>;

    /// Every index `0..embeddings.len()` appears in exactly one returned group.
    fn group_embeddings(
        &self,
        embeddings: &[Vec<f32>],
        threshold: f32,
    ) -> Result<Vec<Vec<usize>>, GroupingError> {
        self.group_with_report(embeddings, threshold).map(|report| report.groups)
    }
}

fn check_threshold(threshold: f32) -> Result<(), GroupingError> {
    if threshold.is_nan() {
        return Err(GroupingError::InvalidThreshold(threshold));
    }
    Ok(())
}

/// Random-hyperplane LSH grouping.
///
/// Holds only configuration; the bank, buckets, seen-pairs set and forest
/// are rebuilt on every call, so calls are independent and idempotent.
#[derive(Debug, Clone, Default)]
pub struct LshClusteringService {
    config: EngineConfig,
}

impl LshClusteringService {
    pub fn new(config: EngineConfig) -> Result<Self, GroupingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl ClusteringService for LshClusteringService {
    fn group_with_report(
        &self,
        embeddings: &[Vec<f32>],
        threshold: f32,
    ) -> Result<GroupingReport, GroupingError> {
        self.config.validate()?;
        check_threshold(threshold)?;
        let batch = NormalizedBatch::from_embeddings(embeddings)?;

        let bank = HyperplaneBank::build(
            self.config.num_tables,
            self.config.planes_per_table,
            batch.dim(),
            self.config.seed,
        )?;
        let signatures = SignatureHasher::new(&bank).hash_batch(&batch);
        let index = BucketIndex::build(&signatures);
        let largest_bucket = index.largest_bucket();
        log::debug!("Bucketed {} items, largest bucket holds {}", batch.len(), largest_bucket);

        let mut forest = DisjointSet::new(batch.len());
        let generator = CandidatePairGenerator::new(
            &batch,
            threshold,
            self.config.max_bucket_size,
            self.config.oversized_bucket_policy,
        );
        let stats = generator.consolidate(&index, &mut forest);
        let groups = forest.groups();

        log::info!(
            "Grouped {} items into {} groups ({} pairs scored, {} matches)",
            batch.len(),
            groups.len(),
            stats.pairs_scored,
            stats.matches
        );

        Ok(GroupingReport {
            groups,
            item_count: batch.len(),
            dim: batch.dim(),
            largest_bucket: Some(largest_bucket),
            stats,
        })
    }
}

/// Exact all-pairs grouping. Quadratic in N; meant for small inputs and as a
/// reference for what the LSH strategy can at best recover.
#[derive(Debug, Clone, Default)]
pub struct BruteForceClusteringService;

impl BruteForceClusteringService {
    pub fn new() -> Self {
        Self
    }
}

impl ClusteringService for BruteForceClusteringService {
    fn group_with_report(
        &self,
        embeddings: &[Vec<f32>],
        threshold: f32,
    ) -> Result<GroupingReport, GroupingError> {
        check_threshold(threshold)?;
        let batch = NormalizedBatch::from_embeddings(embeddings)?;
        let n = batch.len();

        // Rows are scored in parallel; unions happen afterwards on this thread.
        let matches: Vec<(usize, usize)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|a| {
                let batch = &batch;
                (a + 1..n)
                    .filter(move |&b| meets_threshold(batch.similarity(a, b), threshold))
                    .map(move |b| (a, b))
            })
            .collect();

        let mut forest = DisjointSet::new(n);
        for &(a, b) in &matches {
            forest.union(a, b);
        }
        let groups = forest.groups();

        let stats = CandidateStats {
            pairs_scored: n * n.saturating_sub(1) / 2,
            matches: matches.len(),
            ..CandidateStats::default()
        };
        log::info!("Exact grouping of {} items produced {} groups", n, groups.len());

        Ok(GroupingReport {
            groups,
            item_count: n,
            dim: batch.dim(),
            largest_bucket: None,
            stats,
        })
    }
}
