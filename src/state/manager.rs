//! State manager implementation
//!
//! Provides file-based checkpoint persistence with atomic writes.

use super::types::{Checkpoint, PartitionCheckpoint};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// State manager for persisting and loading checkpoints
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file
    path: PathBuf,
    /// Current state (cached)
    state: Arc<RwLock<Checkpoint>>,
    /// Whether to write the file on every update
    auto_save: bool,
}

impl StateManager {
    /// Create a new state manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(Checkpoint::new())),
            auto_save: true,
        }
    }

    /// Create a state manager with auto-save disabled
    pub fn without_auto_save(path: impl AsRef<Path>) -> Self {
        Self {
            auto_save: false,
            ..Self::new(path)
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(Checkpoint::new())),
            auto_save: false,
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| Error::State {
                message: format!("Failed to read state file: {e}"),
            })?;
            parse_checkpoint(&contents)?
        } else {
            Checkpoint::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save: true,
        })
    }

    /// Create an in-memory state manager from an inline JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(parse_checkpoint(json)?)),
            auto_save: false,
        })
    }

    /// Create an in-memory state manager from a checkpoint value
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(checkpoint)),
            auto_save: false,
        }
    }

    /// Load state from file
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to read state file: {e}"),
            })?;

        let loaded = parse_checkpoint(&contents)?;
        *self.state.write().await = loaded;

        Ok(())
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }
        self.save_to_file(&self.path).await
    }

    /// Save state to a specific file path
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_json_pretty().await?;

        // Write to temp file first, then rename for atomicity
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::Checkpoint {
                message: format!("Failed to write state file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::Checkpoint {
                message: format!("Failed to rename state file: {e}"),
            })?;

        tracing::debug!(path = %path.display(), "Checkpoint written");
        Ok(())
    }

    /// Get a read lock on the current state
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, Checkpoint> {
        self.state.read().await
    }

    /// Take an immutable copy of the current state
    pub async fn snapshot(&self) -> Checkpoint {
        self.state.read().await.clone()
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })
    }

    /// Get the checkpoint of one partition
    pub async fn get_partition(
        &self,
        stream: &str,
        partition: &str,
    ) -> Result<Option<PartitionCheckpoint>> {
        self.state.read().await.get_partition(stream, partition)
    }

    /// Store the checkpoint of one partition
    pub async fn set_partition(
        &self,
        stream: &str,
        partition: &str,
        checkpoint: &PartitionCheckpoint,
    ) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state
                .get_stream_mut(stream)
                .set_partition(partition, checkpoint)?;
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Clear all state
    pub async fn clear(&self) -> Result<()> {
        *self.state.write().await = Checkpoint::new();

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Clear state for a specific stream
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        self.state.write().await.streams.remove(stream);

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Create a checkpoint (alias for save)
    pub async fn checkpoint(&self) -> Result<()> {
        self.save().await
    }
}

fn parse_checkpoint(contents: &str) -> Result<Checkpoint> {
    if contents.trim().is_empty() {
        return Ok(Checkpoint::new());
    }
    serde_json::from_str(contents).map_err(|e| Error::State {
        message: format!("Failed to parse state document: {e}"),
    })
}
