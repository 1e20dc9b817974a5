use crate::config::EngineConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HISTORY_FILE_NAME: &str = ".simgroup-history.jsonl";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error on history file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode history record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One grouping run, as appended to the history ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub input: String,
    pub input_digest: String,
    /// "lsh" or "exact"
    pub strategy: String,
    pub item_count: usize,
    pub threshold: f32,
    pub config: EngineConfig,
    /// Groups with two or more members.
    pub group_count: usize,
    /// Items that ended up in such a group.
    pub grouped_items: usize,
}

impl RunRecord {
    pub fn new(
        input: &Path,
        input_digest: &str,
        strategy: &str,
        threshold: f32,
        config: &EngineConfig,
        groups: &[Vec<usize>],
    ) -> Self {
        let similar: Vec<&Vec<usize>> = groups.iter().filter(|g| g.len() > 1).collect();
        Self {
            timestamp: Utc::now().to_rfc3339(),
            input: input.to_string_lossy().into_owned(),
            input_digest: input_digest.to_string(),
            strategy: strategy.to_string(),
            item_count: groups.iter().map(Vec::len).sum(),
            threshold,
            config: config.clone(),
            group_count: similar.len(),
            grouped_items: similar.iter().map(|g| g.len()).sum(),
        }
    }
}

/// JSON Lines ledger of past runs, kept next to the input.
pub struct HistoryService {
    path: PathBuf,
}

impl HistoryService {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Ledger stored as `<dir>/.simgroup-history.jsonl`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &RunRecord) -> Result<(), HistoryError> {
        let line = serde_json::to_string(record)?;
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        writeln!(out, "{}", line).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    /// All readable records, oldest first. Malformed lines are skipped.
    /// A missing ledger is an empty history.
    pub fn list(&self) -> Result<Vec<RunRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let f = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let reader = BufReader::new(f);

        let mut records = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => log::warn!("Skipping malformed history entry {}: {}", i, err),
            }
        }
        Ok(records)
    }

    /// Remove every record. Returns how many were dropped.
    pub fn clear(&self) -> Result<usize, HistoryError> {
        let count = self.list()?.len();
        if self.path.exists() {
            fs::write(&self.path, "").map_err(|source| self.io_error(source))?;
        }
        Ok(count)
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
