use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid JSON on line {line} of {path:?}: {source}")]
    JsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// One input item as written in a JSON or JSON Lines file.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "vector")]
    pub embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonInput {
    Vectors(Vec<Vec<f32>>),
    Records(Vec<EmbeddingRecord>),
}

/// Embeddings read from disk, with one label per item and a digest of the
/// bytes they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedInput {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    /// blake3 hex digest of the input bytes.
    pub digest: String,
}

impl LoadedInput {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Reads embeddings from a `.json` file, a `.jsonl` file, or a directory of
/// `.json` files holding one vector each.
pub struct EmbeddingLoader;

impl EmbeddingLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, path: &Path) -> Result<LoadedInput, LoadError> {
        if path.is_dir() {
            return self.load_directory(path);
        }
        let is_jsonl = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
        if is_jsonl {
            self.load_json_lines(path)
        } else {
            self.load_json(path)
        }
    }

    /// Either `[[f32, ...], ...]` or `[{"id": "...", "embedding": [...]}, ...]`.
    pub fn load_json(&self, path: &Path) -> Result<LoadedInput, LoadError> {
        let bytes = read(path)?;
        let parsed: JsonInput = serde_json::from_slice(&bytes).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let records = match parsed {
            JsonInput::Vectors(vectors) => vectors
                .into_iter()
                .map(|embedding| EmbeddingRecord {
                    id: None,
                    embedding,
                })
                .collect(),
            JsonInput::Records(records) => records,
        };
        Ok(from_records(records, blake3::hash(&bytes).to_hex().to_string()))
    }

    /// One `EmbeddingRecord` object per non-blank line.
    pub fn load_json_lines(&self, path: &Path) -> Result<LoadedInput, LoadError> {
        let bytes = read(path)?;
        let text = String::from_utf8_lossy(&bytes);

        let mut records = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: EmbeddingRecord =
                serde_json::from_str(line).map_err(|source| LoadError::JsonLine {
                    path: path.to_path_buf(),
                    line: i + 1,
                    source,
                })?;
            records.push(record);
        }
        Ok(from_records(records, blake3::hash(&bytes).to_hex().to_string()))
    }

    /// Every `.json` file under `dir`, sorted by path, each holding a bare
    /// array of numbers. Items are labelled by their path.
    pub fn load_directory(&self, dir: &Path) -> Result<LoadedInput, LoadError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry?;
            let path = entry.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if entry.file_type().is_file() && is_json {
                files.push(path.to_path_buf());
            }
        }
        files.sort();

        let mut hasher = blake3::Hasher::new();
        let mut ids = Vec::with_capacity(files.len());
        let mut embeddings = Vec::with_capacity(files.len());
        for file in files {
            let bytes = read(&file)?;
            let embedding: Vec<f32> =
                serde_json::from_slice(&bytes).map_err(|source| LoadError::Json {
                    path: file.clone(),
                    source,
                })?;
            hasher.update(file.to_string_lossy().as_bytes());
            hasher.update(&bytes);
            ids.push(file.to_string_lossy().into_owned());
            embeddings.push(embedding);
        }

        log::debug!("Loaded {} embedding files from {}", ids.len(), dir.display());
        Ok(LoadedInput {
            ids,
            embeddings,
            digest: hasher.finalize().to_hex().to_string(),
        })
    }
}

impl Default for EmbeddingLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn from_records(records: Vec<EmbeddingRecord>, digest: String) -> LoadedInput {
    let mut ids = Vec::with_capacity(records.len());
    let mut embeddings = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        ids.push(record.id.unwrap_or_else(|| i.to_string()));
        embeddings.push(record.embedding);
    }
    LoadedInput {
        ids,
        embeddings,
        digest,
    }
}
