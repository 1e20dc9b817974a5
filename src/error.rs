use std::path::PathBuf;
use thiserror::Error;

/// Largest number of hyperplanes a single table can hold; one bit per plane
/// in a `u64` signature key.
pub const MAX_PLANES_PER_TABLE: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("planes_per_table must be at most {max}, got {planes}")]
    TooManyPlanes { planes: usize, max: usize },

    #[error("planes_per_table must be at least 1")]
    ZeroPlanes,

    #[error("num_tables must be at least 1")]
    ZeroTables,

    #[error("embedding dimensionality must be at least 1")]
    ZeroDimension,

    #[error("max_bucket_size must be at least 2, got {0}")]
    BucketSizeTooSmall(usize),

    #[error("IO error reading config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("No embeddings supplied")]
    EmptyInput,

    #[error("Embedding {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Embedding {index} has a non-finite value at position {position}")]
    NonFiniteValue { index: usize, position: usize },

    #[error("Threshold must be a number, got {0}")]
    InvalidThreshold(f32),

    #[error("Too many embeddings ({count}); indices must fit in 32 bits")]
    TooManyItems { count: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GroupingError {
    /// Lets callers that treat "nothing to group" as an empty partition tell it
    /// apart from real failures.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, GroupingError::EmptyInput)
    }
}
