//! Candidate pair generation and scoring.
//!
//! Two items are candidates when some table puts them in the same bucket.
//! Every candidate pair is scored at most once per call, no matter how many
//! tables bring it up, by remembering its packed [`pair_key`].

use crate::config::OversizedBucketPolicy;
use crate::core::bucket::{Bucket, BucketIndex};
use crate::core::embedding::{NormalizedBatch, meets_threshold};
use crate::core::union_find::DisjointSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pack the unordered pair `{a, b}` as `min << 32 | max`.
#[inline]
pub fn pair_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

/// Counters collected while walking the buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateStats {
    /// Buckets with at least two members.
    pub buckets_examined: usize,
    /// Buckets over the size limit, whatever the policy did with them.
    pub oversized_buckets: usize,
    /// Oversized buckets whose pairs were never scored.
    pub oversized_buckets_skipped: usize,
    pub pairs_scored: usize,
    /// Pairs seen again in a later bucket and not rescored.
    pub duplicate_pairs: usize,
    pub matches: usize,
}

pub struct CandidatePairGenerator<'a> {
    batch: &'a NormalizedBatch,
    threshold: f32,
    max_bucket_size: usize,
    policy: OversizedBucketPolicy,
}

impl<'a> CandidatePairGenerator<'a> {
    pub fn new(
        batch: &'a NormalizedBatch,
        threshold: f32,
        max_bucket_size: usize,
        policy: OversizedBucketPolicy,
    ) -> Self {
        Self {
            batch,
            threshold,
            max_bucket_size,
            policy,
        }
    }

    /// Walk every table's buckets, score each new pair, and hand pairs at or
    /// above the threshold to `on_match` as `(a, b, similarity)` with `a < b`.
    pub fn scan<F>(&self, index: &BucketIndex, mut on_match: F) -> CandidateStats
    where
        F: FnMut(usize, usize, f32),
    {
        let mut stats = CandidateStats::default();
        let mut seen: HashSet<u64> = HashSet::new();

        for (table, buckets) in index.tables().enumerate() {
            for bucket in buckets.iter().filter(|b| b.len() >= 2) {
                stats.buckets_examined += 1;

                if bucket.len() > self.max_bucket_size {
                    stats.oversized_buckets += 1;
                    if self.policy == OversizedBucketPolicy::Skip {
                        stats.oversized_buckets_skipped += 1;
                        log::warn!(
                            "Skipping bucket {:#x} in table {} with {} items (limit {})",
                            bucket.key,
                            table,
                            bucket.len(),
                            self.max_bucket_size
                        );
                        continue;
                    }
                }

                self.score_bucket(bucket, &mut seen, &mut stats, &mut on_match);
            }
        }

        stats
    }

    /// Run [`CandidatePairGenerator::scan`] and union every match into `forest`.
    pub fn consolidate(&self, index: &BucketIndex, forest: &mut DisjointSet) -> CandidateStats {
        self.scan(index, |a, b, _| {
            forest.union(a, b);
        })
    }

    fn score_bucket<F>(
        &self,
        bucket: &Bucket,
        seen: &mut HashSet<u64>,
        stats: &mut CandidateStats,
        on_match: &mut F,
    ) where
        F: FnMut(usize, usize, f32),
    {
        // members are ascending, so a < b below
        let members = &bucket.members;
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if !seen.insert(pair_key(a, b)) {
                    stats.duplicate_pairs += 1;
                    continue;
                }

                stats.pairs_scored += 1;
                let (a, b) = (a as usize, b as usize);
                let similarity = self.batch.similarity(a, b);
                if meets_threshold(similarity, self.threshold) {
                    stats.matches += 1;
                    on_match(a, b, similarity);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hyperplane::HyperplaneBank;
    use crate::core::signature::SignatureHasher;

    fn build(
        embeddings: &[Vec<f32>],
        tables: usize,
        planes: usize,
    ) -> (NormalizedBatch, BucketIndex) {
        let batch = NormalizedBatch::from_embeddings(embeddings).unwrap();
        let bank = HyperplaneBank::build(tables, planes, batch.dim(), 42).unwrap();
        let index = BucketIndex::build(&SignatureHasher::new(&bank).hash_batch(&batch));
        (batch, index)
    }

    #[test]
    fn test_pair_key_is_canonical() {
        assert_eq!(pair_key(3, 7), pair_key(7, 3));
        assert_eq!(pair_key(3, 7), (3u64 << 32) | 7);
        assert_eq!(pair_key(9, 2), (2u64 << 32) | 9);
        assert_eq!(pair_key(u32::MAX, 0), u32::MAX as u64);
        assert_ne!(pair_key(0, 1), pair_key(1, 1));
    }

    #[test]
    fn test_pairs_scored_once_across_tables() {
        // Identical vectors share a bucket in every table.
        let embeddings = vec![vec![1.0, 2.0, 3.0]; 4];
        let (batch, index) = build(&embeddings, 5, 8);
        let generator =
            CandidatePairGenerator::new(&batch, 0.9, 1000, OversizedBucketPolicy::Skip);

        let mut matched = Vec::new();
        let stats = generator.scan(&index, |a, b, sim| matched.push((a, b, sim)));

        assert_eq!(stats.buckets_examined, 5);
        assert_eq!(stats.pairs_scored, 6);
        assert_eq!(stats.duplicate_pairs, 4 * 6);
        assert_eq!(stats.matches, 6);
        assert_eq!(matched.len(), 6);
        for (a, b, sim) in matched {
            assert!(a < b);
            assert!((sim - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_below_threshold_pairs_do_not_match() {
        // Everything collides with a single plane in one dimension.
        let embeddings = vec![vec![1.0], vec![2.0], vec![3.0]];
        let (batch, index) = build(&embeddings, 1, 1);
        let generator =
            CandidatePairGenerator::new(&batch, 1.5, 1000, OversizedBucketPolicy::Skip);
        let stats = generator.scan(&index, |_, _, _| panic!("nothing should match"));
        assert_eq!(stats.pairs_scored, 3);
        assert_eq!(stats.matches, 0);
    }

    #[test]
    fn test_oversized_bucket_skipped() {
        let embeddings = vec![vec![0.5, 0.5]; 5];
        let (batch, index) = build(&embeddings, 3, 4);
        let generator = CandidatePairGenerator::new(&batch, 0.5, 4, OversizedBucketPolicy::Skip);

        let mut forest = DisjointSet::new(batch.len());
        let stats = generator.consolidate(&index, &mut forest);

        assert_eq!(stats.oversized_buckets, 3);
        assert_eq!(stats.oversized_buckets_skipped, 3);
        assert_eq!(stats.pairs_scored, 0);
        assert_eq!(forest.component_count(), 5);
    }

    #[test]
    fn test_oversized_bucket_exhaustive() {
        let embeddings = vec![vec![0.5, 0.5]; 5];
        let (batch, index) = build(&embeddings, 3, 4);
        let generator =
            CandidatePairGenerator::new(&batch, 0.5, 4, OversizedBucketPolicy::Exhaustive);

        let mut forest = DisjointSet::new(batch.len());
        let stats = generator.consolidate(&index, &mut forest);

        assert_eq!(stats.oversized_buckets, 3);
        assert_eq!(stats.oversized_buckets_skipped, 0);
        assert_eq!(stats.pairs_scored, 10);
        assert_eq!(forest.component_count(), 1);
    }

    #[test]
    fn test_singleton_buckets_are_not_examined() {
        let embeddings = vec![vec![1.0, 0.0], vec![-1.0, 0.0]];
        let (batch, index) = build(&embeddings, 4, 16);
        let generator =
            CandidatePairGenerator::new(&batch, -2.0, 1000, OversizedBucketPolicy::Skip);
        let stats = generator.scan(&index, |_, _, _| {});
        // Opposite vectors never share a bucket.
        assert_eq!(stats.buckets_examined, 0);
        assert_eq!(stats.pairs_scored, 0);
    }
}
