//! Whole-document JSON persistence.
//!
//! Every mutation rewrites the full snapshot. Writes go to a temporary file in
//! the target directory which is then renamed over the old document, so a
//! crash mid-write leaves the previous snapshot intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting a snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A JSON document on disk, or nothing at all once persistence has failed
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: Option<PathBuf>,
}

impl JsonStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    /// Backing file, if still persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Read the snapshot. A missing, unreadable or corrupt file yields the default value.
    pub fn load<T: DeserializeOwned + Default>(&self) -> T {
        let Some(path) = &self.path else {
            return T::default();
        };
        if !path.exists() {
            return T::default();
        }

        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return T::default();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt history file {}: {}",
                    path.display(),
                    e
                );
                T::default()
            }
        }
    }

    /// Write the snapshot. On failure the store drops to in-memory mode for
    /// the rest of the process and the error is logged.
    pub fn save<T: Serialize>(&mut self, value: &T) {
        let Some(path) = self.path.clone() else {
            return;
        };

        if let Err(e) = write_atomic(&path, value) {
            tracing::warn!(
                "Failed to save {}: {}; keeping history in memory only",
                path.display(),
                e
            );
            self.path = None;
        }
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
