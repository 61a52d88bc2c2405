//! Watermark state persistence
//!
//! The monitor reads its [`PersistedState`] once at run start and writes it
//! back at most once at run end. The [`EventStore`] trait is the boundary;
//! the bundled implementation keeps the state as a small JSON document on
//! disk, in the user's data directory by default.

use crate::error::{KlaxonError, Result};
use crate::monitor::PersistedState;
use anyhow::Context;
use async_trait::async_trait;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Boundary for loading and saving the persisted watermark
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Load the persisted state; absence of prior state is not an error
    async fn load(&self) -> Result<PersistedState>;

    /// Persist the state, replacing whatever was stored before
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// File-backed JSON store for the watermark state
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store at the default location
    ///
    /// Honors the `KLAXON_STATE_FILE` environment variable so tests and
    /// alternate deployments can point the binary at another file.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("KLAXON_STATE_FILE") {
            return Ok(Self::with_path(override_path));
        }

        let proj_dirs = ProjectDirs::from("io", "klaxon-monitor", "klaxon")
            .ok_or_else(|| KlaxonError::Storage("Could not determine data directory".into()))?;
        Ok(Self::with_path(proj_dirs.data_dir().join("state.json")))
    }

    /// Create a store backed by the given file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl EventStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let state = serde_json::from_str(&raw)
                    .context("Failed to parse state file")
                    .map_err(|e| KlaxonError::Storage(e.to_string()))?;
                Ok(state)
            }
            // No file yet means no prior run
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(KlaxonError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
            .into()),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create state directory")
                .map_err(|e| KlaxonError::Storage(e.to_string()))?;
        }

        let raw = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.path, raw)
            .await
            .context("Failed to write state file")
            .map_err(|e| KlaxonError::Storage(e.to_string()))?;

        tracing::debug!("Persisted watermark to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveTimestamp;

    #[tokio::test]
    async fn test_load_missing_file_is_default_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::with_path(dir.path().join("state.json"));
        let state = store.load().await.unwrap();
        assert!(state.last_timestamp.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::with_path(dir.path().join("nested/state.json"));

        let ts: ArchiveTimestamp = "20240131120000".parse().unwrap();
        let state = PersistedState {
            last_timestamp: Some(ts.clone()),
        };
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.last_timestamp, Some(ts));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = JsonFileStore::with_path(&path);
        let err = store.load().await.unwrap_err();
        let err = err.downcast::<KlaxonError>().unwrap();
        assert!(matches!(err, KlaxonError::Storage(_)));
    }
}
