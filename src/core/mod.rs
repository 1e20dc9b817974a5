pub mod bucket;
pub mod candidate;
pub mod embedding;
pub mod hyperplane;
pub mod rng;
pub mod signature;
pub mod union_find;

pub use bucket::{Bucket, BucketIndex};
pub use candidate::{CandidatePairGenerator, CandidateStats, pair_key};
pub use embedding::NormalizedBatch;
pub use hyperplane::{HyperplaneBank, HyperplaneTable};
pub use rng::DeterministicRng;
pub use signature::{SignatureHasher, SignatureMatrix};
pub use union_find::DisjointSet;
