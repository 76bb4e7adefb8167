//! Durable JSON record store.
//!
//! The hub persists exactly two records across restarts: the current token
//! set and the push-registration credential. Each lives in its own JSON
//! file under the config dir. File I/O is blocking, so it runs on the
//! blocking pool via `spawn_blocking`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// A single JSON-file-backed record.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record store rooted at the default data dir (e.g. `tokens.json`).
    pub fn in_data_dir(file_name: &str) -> Result<Self> {
        Ok(Self::new(crate::config::data_dir()?.join(file_name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, returning `None` when the file does not exist.
    pub async fn load<T: DeserializeOwned + Send + 'static>(&self) -> Result<Option<T>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<T>> {
            if !path.exists() {
                return Ok(None);
            }
            let raw = std::fs::read_to_string(&path)?;
            Ok(Some(serde_json::from_str(&raw)?))
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }

    /// Persist the record, creating parent directories as needed.
    pub async fn save<T: Serialize>(&self, record: &T) -> Result<()> {
        let path = self.path.clone();
        let raw = serde_json::to_string_pretty(record)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, raw)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))??;
        debug!(path = %self.path.display(), "record saved");
        Ok(())
    }

    /// Delete the record file. Missing files are not an error.
    pub async fn delete(&self) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn save_load_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested").join("record.json"));

        assert!(store.load::<Record>().await.unwrap().is_none());

        let record = Record {
            name: "door".into(),
            count: 3,
        };
        store.save(&record).await.unwrap();
        assert_eq!(store.load::<Record>().await.unwrap(), Some(record));

        store.delete().await.unwrap();
        assert!(store.load::<Record>().await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonStore::new(path);
        assert!(store.load::<Record>().await.is_err());
    }
}
