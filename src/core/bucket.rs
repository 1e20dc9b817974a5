use crate::core::signature::SignatureMatrix;
use std::collections::HashMap;

/// Items sharing one signature key within one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: u64,
    pub members: Vec<u32>,
}

impl Bucket {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Per-table grouping of item indices by signature key.
///
/// Buckets of each table are ordered by key and members are in ascending item
/// order, so walking the index is deterministic for a fixed input.
#[derive(Debug, Clone)]
pub struct BucketIndex {
    tables: Vec<Vec<Bucket>>,
}

impl BucketIndex {
    pub fn build(signatures: &SignatureMatrix) -> Self {
        let num_items = signatures.num_items();
        let tables = (0..signatures.num_tables())
            .map(|table| {
                let mut by_key: HashMap<u64, Vec<u32>> = HashMap::new();
                for item in 0..num_items {
                    // item < 2^32 is checked when the batch is built
                    by_key
                        .entry(signatures.key(item, table))
                        .or_default()
                        .push(item as u32);
                }
                let mut buckets: Vec<Bucket> = by_key
                    .into_iter()
                    .map(|(key, members)| Bucket { key, members })
                    .collect();
                buckets.sort_unstable_by_key(|bucket| bucket.key);
                buckets
            })
            .collect();

        Self { tables }
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn tables(&self) -> impl Iterator<Item = &[Bucket]> {
        self.tables.iter().map(Vec::as_slice)
    }

    /// Size of the largest bucket over all tables.
    pub fn largest_bucket(&self) -> usize {
        self.tables
            .iter()
            .flatten()
            .map(Bucket::len)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::embedding::NormalizedBatch;
    use crate::core::hyperplane::HyperplaneBank;
    use crate::core::signature::SignatureHasher;

    fn index_for(
        embeddings: &[Vec<f32>],
        tables: usize,
        planes: usize,
    ) -> (SignatureMatrix, BucketIndex) {
        let batch = NormalizedBatch::from_embeddings(embeddings).unwrap();
        let bank = HyperplaneBank::build(tables, planes, batch.dim(), 42).unwrap();
        let signatures = SignatureHasher::new(&bank).hash_batch(&batch);
        let index = BucketIndex::build(&signatures);
        (signatures, index)
    }

    #[test]
    fn test_every_item_in_one_bucket_per_table() {
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![-1.0, 0.5, 0.2],
        ];
        let (signatures, index) = index_for(&embeddings, 4, 6);
        assert_eq!(index.num_tables(), 4);

        for (t, buckets) in index.tables().enumerate() {
            let mut seen: Vec<u32> = buckets.iter().flat_map(|b| b.members.clone()).collect();
            seen.sort_unstable();
            assert_eq!(seen, vec![0, 1, 2, 3, 4]);

            for bucket in buckets {
                assert!(!bucket.is_empty());
                for &member in &bucket.members {
                    assert_eq!(signatures.key(member as usize, t), bucket.key);
                }
            }
        }
    }

    #[test]
    fn test_buckets_sorted_by_key_and_members_ascending() {
        let embeddings: Vec<Vec<f32>> = (0..20)
            .map(|i| vec![(i as f32).sin(), (i as f32).cos(), 0.1 * i as f32])
            .collect();
        let (_, index) = index_for(&embeddings, 3, 4);
        for buckets in index.tables() {
            assert!(buckets.windows(2).all(|w| w[0].key < w[1].key));
            for bucket in buckets {
                assert!(bucket.members.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn test_identical_items_collide_everywhere() {
        let embeddings = vec![vec![0.3, 0.4]; 6];
        let (_, index) = index_for(&embeddings, 5, 10);
        for buckets in index.tables() {
            assert_eq!(buckets.len(), 1);
            assert_eq!(buckets[0].len(), 6);
        }
        assert_eq!(index.largest_bucket(), 6);
    }
}
