//! File-backed state store.
//!
//! The whole state file is held in memory. It is read once when the store is
//! opened and rewritten atomically on [`StateStore::save`]. Concurrent use of
//! one state file by several processes is not supported.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, StateError};

use super::types::{ResourceState, StackState, StateFile, STATE_VERSION};

/// On-disk store of deployed resource identities.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    file: StateFile,
}

impl StateStore {
    /// Opens the store at `path`.
    ///
    /// A missing, unreadable, corrupted or version-mismatched file yields an
    /// empty state; opening never fails.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match Self::load(&path).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                debug!("State file does not exist: {}", path.display());
                StateFile::default()
            }
            Err(e) => {
                warn!("Discarding state file {}: {e}", path.display());
                StateFile::default()
            }
        };
        Self { path, file }
    }

    /// Creates an empty store that will save to `path`, ignoring any file
    /// already there.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: StateFile::default(),
        }
    }

    async fn load(path: &Path) -> Result<Option<StateFile>> {
        if !path.exists() {
            return Ok(None);
        }

        info!("Loading state from: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| StateError::Corrupted {
            message: format!("Failed to read state file: {e}"),
        })?;

        let raw: Value = serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
            message: format!("Failed to parse state file: {e}"),
        })?;

        match raw.get("version").and_then(Value::as_u64) {
            Some(version) if version == u64::from(STATE_VERSION) => {}
            Some(found) => {
                return Err(StateError::VersionMismatch {
                    expected: STATE_VERSION,
                    found,
                }
                .into());
            }
            None => {
                return Err(StateError::Corrupted {
                    message: String::from("State file has no numeric version"),
                }
                .into());
            }
        }

        let file = serde_json::from_value(raw).map_err(|e| StateError::Corrupted {
            message: format!("Invalid state file: {e}"),
        })?;

        Ok(Some(file))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory state file.
    #[must_use]
    pub const fn file(&self) -> &StateFile {
        &self.file
    }

    /// Tracked resources of a stack.
    #[must_use]
    pub fn stack(&self, stack_id: &str) -> Option<&StackState> {
        self.file.stacks.get(stack_id)
    }

    /// Looks up a tracked resource.
    #[must_use]
    pub fn get_resource(&self, stack_id: &str, logical_id: &str) -> Option<&ResourceState> {
        self.file
            .stacks
            .get(stack_id)
            .and_then(|stack| stack.resources.get(logical_id))
    }

    /// Records a resource, replacing any previous entry for its logical id.
    pub fn set_resource(&mut self, stack_id: &str, state: ResourceState) {
        self.file
            .stacks
            .entry(stack_id.to_string())
            .or_default()
            .resources
            .insert(state.logical_id.clone(), state);
    }

    /// Forgets a resource. The stack entry is pruned once it is empty.
    pub fn remove_resource(&mut self, stack_id: &str, logical_id: &str) -> Option<ResourceState> {
        let stack = self.file.stacks.get_mut(stack_id)?;
        let removed = stack.resources.remove(logical_id);
        if stack.resources.is_empty() {
            self.file.stacks.remove(stack_id);
        }
        removed
    }

    /// Forgets a whole stack.
    pub fn remove_stack(&mut self, stack_id: &str) -> Option<StackState> {
        self.file.stacks.remove(stack_id)
    }

    /// Writes the state file atomically (temp file, then rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            debug!("Creating state directory: {}", parent.display());
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::write(format!("Failed to create state directory: {e}")))?;
        }

        info!("Saving state to: {}", self.path.display());

        let content = serde_json::to_string_pretty(&self.file)
            .map_err(|e| StateError::serialization(format!("Failed to serialize state: {e}")))?;

        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to create temp state file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write(format!("Failed to write state file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| StateError::write(format!("Failed to sync state file: {e}")))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StateError::write(format!("Failed to rename state file: {e}")))?;

        debug!("State saved successfully");
        Ok(())
    }
}
