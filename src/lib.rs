//! Approximate near-duplicate grouping of embedding vectors.
//!
//! Items whose cosine similarity meets a threshold, directly or through a
//! chain of such pairs, end up in the same group. Candidate pairs come from
//! random-hyperplane LSH buckets instead of all-pairs comparison.

pub mod config;
pub mod core;
pub mod error;
pub mod services;

pub use config::{EngineConfig, OversizedBucketPolicy};
pub use error::{ConfigError, GroupingError};
pub use services::{
    BruteForceClusteringService, ClusteringService, GroupingReport, LshClusteringService,
    similar_sets,
};

/// Group `embeddings` with the default engine settings (10 tables of 10
/// planes, seed 42, buckets over 1000 items skipped).
pub fn group_embeddings(
    embeddings: &[Vec<f32>],
    threshold: f32,
) -> Result<Vec<Vec<usize>>, GroupingError> {
    LshClusteringService::default().group_embeddings(embeddings, threshold)
}
