// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File-backed storage for the sealed state blob.
//!
//! ## Security Note
//!
//! This module uses **plain filesystem I/O** and performs no cryptography.
//! The blob is already sealed by the boundary; the host stores it verbatim
//! and hands it back verbatim. A tampered or rolled-back file is caught by
//! the boundary, not here.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::enclave::SealedStateStore;

use super::StoragePaths;

/// Error type for host storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Stores the last sealed blob in a single file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at the default location under `paths`.
    pub fn with_paths(paths: &StoragePaths) -> Self {
        Self::new(paths.state_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SealedStateStore for FileStateStore {
    /// Write via temp file and rename so a crash never leaves a torn blob.
    fn persist(&mut self, blob: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(blob)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        info!(path = %self.path.display(), bytes = blob.len(), "Saved state");
        Ok(())
    }

    fn retrieve(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No previous state, starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        debug!(path = %self.path.display(), bytes = data.len(), "Loaded state");
        Ok(Some(data))
    }
}

/// Read an arbitrary blob file named by a client.
pub fn read_blob(path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
    Ok(fs::read(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStateStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::with_paths(&StoragePaths::new(temp.path()));
        (temp, store)
    }

    #[test]
    fn missing_file_retrieves_none() {
        let (_temp, mut store) = setup();
        assert!(store.retrieve().unwrap().is_none());
    }

    #[test]
    fn persist_then_retrieve_returns_same_bytes() {
        let (_temp, mut store) = setup();
        let blob = b"opaque\x00\x01\x02bytes";
        store.persist(blob).unwrap();
        assert_eq!(store.retrieve().unwrap().unwrap(), blob);
    }

    #[test]
    fn persist_replaces_previous_blob() {
        let (_temp, mut store) = setup();
        store.persist(b"first-longer-blob").unwrap();
        store.persist(b"second").unwrap();
        assert_eq!(store.retrieve().unwrap().unwrap(), b"second");
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn persist_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStateStore::new(temp.path().join("nested/dir/state.bin"));
        store.persist(b"x").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn read_blob_reports_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = read_blob(temp.path().join("absent.bin"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
