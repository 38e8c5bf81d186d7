//! File-backed checkpoint persistence
//!
//! Saves go through a sibling temp file that is fsynced and then renamed
//! over the checkpoint path, so a reader polling the file only ever sees a
//! complete document (the old one or the new one).

use crate::error::{PantryError, Result};
use crate::types::IngestionCheckpoint;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and atomically writes an [`IngestionCheckpoint`] JSON file
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    /// Load the checkpoint. A missing file is `Ok(None)`, not an error.
    pub fn load(&self) -> Result<Option<IngestionCheckpoint>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PantryError::CheckpointRead {
                    path: self.path.clone(),
                    source,
                })
            },
        };

        let checkpoint =
            serde_json::from_str(&content).map_err(|source| PantryError::CorruptCheckpoint {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(checkpoint))
    }

    /// Atomically replace the checkpoint file
    pub fn save(&self, checkpoint: &IngestionCheckpoint) -> Result<()> {
        let json = serde_json::to_vec_pretty(checkpoint)?;
        let write_err = |source: std::io::Error| PantryError::CheckpointWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(&json).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        if let Err(source) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(source));
        }

        debug!(
            path = %self.path.display(),
            processed = checkpoint.processed_items,
            page = checkpoint.current_page,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Remove the checkpoint (and any stray temp file). Missing files are fine.
    pub fn clear(&self) -> Result<()> {
        for path in [self.path.clone(), self.temp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(source) => return Err(PantryError::CheckpointWrite { path, source }),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample() -> IngestionCheckpoint {
        let mut cp = IngestionCheckpoint::new(vec!["Foundation".to_string()], Utc::now());
        cp.record_partition_total("Foundation", 5);
        cp.record_processed(2);
        cp.complete_page(1);
        cp
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested/checkpoint.json"));
        let cp = sample();

        store.save(&cp).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, cp);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        fs::write(&path, "{\"totalItems\": 5, \"processedIt").unwrap();

        let store = CheckpointStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, PantryError::CorruptCheckpoint { .. }));
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        let mut cp = sample();
        store.save(&cp).unwrap();

        cp.record_processed(3);
        cp.complete_page(3);
        store.save(&cp).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.processed_items, 5);
        assert_eq!(loaded.current_page, 3);
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let store = CheckpointStore::new(blocker.join("checkpoint.json"));
        let err = store.save(&sample()).unwrap_err();
        assert!(err.is_persist_failure());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        store.save(&sample()).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
