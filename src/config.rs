use crate::error::{ConfigError, MAX_PLANES_PER_TABLE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_NUM_TABLES: usize = 10;
pub const DEFAULT_PLANES_PER_TABLE: usize = 10;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_BUCKET_SIZE: usize = 1000;

/// What to do with a bucket holding more than `max_bucket_size` items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizedBucketPolicy {
    /// Never score pairs from the bucket. Pairs that only ever collide in
    /// oversized buckets are not grouped.
    #[default]
    Skip,
    /// Score every pair in the bucket regardless of its size.
    Exhaustive,
}

/// Construction-time settings of the LSH grouping engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub num_tables: usize,
    pub planes_per_table: usize,
    pub seed: u64,
    pub max_bucket_size: usize,
    pub oversized_bucket_policy: OversizedBucketPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_tables: DEFAULT_NUM_TABLES,
            planes_per_table: DEFAULT_PLANES_PER_TABLE,
            seed: DEFAULT_SEED,
            max_bucket_size: DEFAULT_MAX_BUCKET_SIZE,
            oversized_bucket_policy: OversizedBucketPolicy::Skip,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(mut self, num_tables: usize) -> Self {
        self.num_tables = num_tables;
        self
    }

    pub fn with_planes(mut self, planes_per_table: usize) -> Self {
        self.planes_per_table = planes_per_table;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_bucket_size(mut self, max_bucket_size: usize) -> Self {
        self.max_bucket_size = max_bucket_size;
        self
    }

    pub fn with_oversized_policy(mut self, policy: OversizedBucketPolicy) -> Self {
        self.oversized_bucket_policy = policy;
        self
    }

    /// Reject settings the engine cannot run with, before any data is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_tables == 0 {
            return Err(ConfigError::ZeroTables);
        }
        if self.planes_per_table == 0 {
            return Err(ConfigError::ZeroPlanes);
        }
        if self.planes_per_table > MAX_PLANES_PER_TABLE {
            return Err(ConfigError::TooManyPlanes {
                planes: self.planes_per_table,
                max: MAX_PLANES_PER_TABLE,
            });
        }
        if self.max_bucket_size < 2 {
            return Err(ConfigError::BucketSizeTooSmall(self.max_bucket_size));
        }
        Ok(())
    }

    /// `<config_dir>/simgroup/config.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("simgroup").join("config.json"))
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but a file that does not exist yields the
    /// defaults instead of an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
