//! Flat deployment manifest.
//!
//! Declaration order in the manifest is the apply order; its reverse is the
//! teardown order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{ConfigError, Result, StateError};

use super::resource::{Properties, ResourceKind};

/// One resource at synth time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceManifestEntry {
    /// Logical id.
    pub id: String,
    /// Construct path.
    pub path: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Provider-facing property bag.
    pub properties: Properties,
    /// Known remote id for imported resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
}

/// A synthesized stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    /// Stack id.
    pub stack_id: String,
    /// Provider API version pin.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Stack tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Resources in declaration order.
    #[serde(default)]
    pub resources: Vec<ResourceManifestEntry>,
}

impl StackManifest {
    /// Looks up an entry by logical id.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&ResourceManifestEntry> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Entries in teardown order.
    pub fn teardown_order(&self) -> impl Iterator<Item = &ResourceManifestEntry> {
        self.resources.iter().rev()
    }

    /// Serializes the manifest as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StateError::serialization(format!("Failed to serialize manifest: {e}")).into())
    }

    /// Writes the manifest to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!("Wrote manifest to: {}", path.display());
        Ok(())
    }

    /// Reads a manifest from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or is not a valid manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                message: format!("Invalid manifest: {e}"),
                location: Some(path.display().to_string()),
            }
            .into()
        })
    }
}
