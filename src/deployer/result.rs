//! Outcome types of deploy and destroy runs.

use serde::Serialize;
use std::fmt;

use crate::construct::{ResourceKind, ResourceManifestEntry};
use crate::error::BillstackError;

/// Outcome of deploying one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    /// A new remote object was created.
    Created,
    /// The remote object was updated in place.
    Updated,
    /// The remote object already matched.
    Unchanged,
}

/// Outcome of destroying one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestroyStatus {
    /// The remote object was deleted.
    Deleted,
    /// The remote object was deactivated.
    Deactivated,
}

impl DestroyStatus {
    /// How `kind` is torn down.
    #[must_use]
    pub const fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Product | ResourceKind::Coupon => Self::Deleted,
            ResourceKind::Price | ResourceKind::EntitlementFeature | ResourceKind::BillingMeter => {
                Self::Deactivated
            }
        }
    }
}

/// A successfully deployed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedResource {
    /// Logical id.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Remote id after the deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    /// What happened.
    pub status: DeployStatus,
    /// Remote id of a price deactivated by a replacement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_physical_id: Option<String>,
}

/// A successfully destroyed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyedResource {
    /// Logical id.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Remote id that was torn down; `None` when nothing existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    /// What happened.
    pub status: DestroyStatus,
}

/// A failed manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceError {
    /// Logical id.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Error message.
    pub error: String,
}

impl ResourceError {
    /// Records `err` against `entry`.
    #[must_use]
    pub fn new(entry: &ResourceManifestEntry, err: &BillstackError) -> Self {
        Self {
            id: entry.id.clone(),
            kind: entry.kind,
            error: err.to_string(),
        }
    }
}

/// Result of a deploy run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    /// Stack id.
    pub stack_id: String,
    /// Entries that succeeded, in manifest order.
    pub deployed: Vec<DeployedResource>,
    /// Entries that failed.
    pub errors: Vec<ResourceError>,
    /// Problems that did not fail any entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of a destroy run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyResult {
    /// Stack id.
    pub stack_id: String,
    /// Entries that succeeded, in teardown order.
    pub destroyed: Vec<DestroyedResource>,
    /// Entries that failed.
    pub errors: Vec<ResourceError>,
    /// Problems that did not fail any entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DeployResult {
    pub(crate) fn new(stack_id: &str) -> Self {
        Self {
            stack_id: stack_id.to_string(),
            deployed: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns true when no entry failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of entries with `status`.
    #[must_use]
    pub fn count(&self, status: DeployStatus) -> usize {
        self.deployed.iter().filter(|d| d.status == status).count()
    }
}

impl DestroyResult {
    pub(crate) fn new(stack_id: &str) -> Self {
        Self {
            stack_id: stack_id.to_string(),
            destroyed: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns true when no entry failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for DestroyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deleted => "deleted",
            Self::Deactivated => "deactivated",
        };
        write!(f, "{s}")
    }
}
