pub mod clustering;
pub mod history;
pub mod loader;

pub use clustering::{
    BruteForceClusteringService, ClusteringService, GroupingReport, LshClusteringService,
    similar_sets,
};
pub use history::{HistoryService, RunRecord};
pub use loader::{EmbeddingLoader, LoadedInput};
