//! State file types.
//!
//! The state file maps `(stack id, logical id)` to the last known remote
//! identity of each deployed resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::construct::{ResourceKind, ResourceManifestEntry};

/// Current version of the state format. Any other value is discarded on load.
pub const STATE_VERSION: u32 = 1;

/// The complete state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    /// State format version.
    pub version: u32,
    /// Tracked stacks by id.
    #[serde(default)]
    pub stacks: BTreeMap<String, StackState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            stacks: BTreeMap::new(),
        }
    }
}

/// Tracked resources of one stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackState {
    /// Resources by logical id.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

/// Last known state of one deployed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Logical id.
    pub logical_id: String,
    /// Remote id.
    pub physical_id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Construct path at deploy time.
    pub path: String,
    /// When the resource was last deployed.
    pub last_deployed_at: DateTime<Utc>,
    /// Digest of the deployed property bag.
    pub properties_hash: String,
}

impl ResourceState {
    /// Records a successful deploy of `entry` as `physical_id`.
    #[must_use]
    pub fn deployed(entry: &ResourceManifestEntry, physical_id: &str, properties_hash: String) -> Self {
        Self {
            logical_id: entry.id.clone(),
            physical_id: physical_id.to_string(),
            kind: entry.kind,
            path: entry.path.clone(),
            last_deployed_at: Utc::now(),
            properties_hash,
        }
    }
}
