//! Diff engine for comparing desired vs remote state.
//!
//! This module computes, for every manifest entry, whether the remote object
//! is missing, differs from the desired bag, or already matches it.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, error, info};

use crate::construct::{Properties, ResourceKind, ResourceManifestEntry, StackManifest};
use crate::deployer::{DeployContext, ResourceError};
use crate::state::StateStore;
use crate::stripe::{remote_id, BillingProvider};

use super::normalize::{comparable, normalize};
use super::patch::render_patch;
use super::resolver::Resolver;

/// Engine for computing diffs between a manifest and the remote account.
pub struct DiffEngine<'a> {
    provider: &'a dyn BillingProvider,
    state: &'a StateStore,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// Resource will be created.
    Create,
    /// Resource will change.
    Update,
    /// Resource is unchanged.
    NoChange,
}

/// Difference for a single resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDiff {
    /// Logical id.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Construct path.
    pub path: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Remote id of the existing object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    /// Serialized desired bag, in comparison form.
    pub desired: String,
    /// Serialized existing bag, in comparison form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<String>,
}

/// Complete diff result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Stack id.
    pub stack_id: String,
    /// One diff per successfully resolved entry, in manifest order.
    pub diffs: Vec<ResourceDiff>,
    /// Entries that could not be resolved.
    pub errors: Vec<ResourceError>,
    /// Number of resources to create.
    pub creates: usize,
    /// Number of resources to update.
    pub updates: usize,
    /// Number of unchanged resources.
    pub unchanged: usize,
}

impl<'a> DiffEngine<'a> {
    /// Creates a new diff engine.
    #[must_use]
    pub fn new(provider: &'a dyn BillingProvider, state: &'a StateStore) -> Self {
        Self { provider, state }
    }

    /// Diffs every entry of `manifest` in declaration order.
    ///
    /// References to logical ids found earlier in the same pass are replaced
    /// by their remote ids before comparison. Lookup failures are recorded
    /// per entry.
    pub async fn diff(&self, manifest: &StackManifest) -> DiffResult {
        let resolver = Resolver::new(self.provider, self.state, &manifest.stack_id);
        let mut context = DeployContext::new();
        let mut diffs = Vec::new();
        let mut errors = Vec::new();

        for entry in &manifest.resources {
            let desired = context.resolve(&entry.properties);
            let with_product = context.names_remote_product(&desired);
            match resolver.find_existing(entry).await {
                Ok(existing) => {
                    let physical_id = existing.as_ref().and_then(remote_id).map(str::to_string);
                    if let Some(id) = &physical_id {
                        context.record(&entry.id, id);
                    }
                    let existing = existing.map(|object| normalize(entry.kind, &object));
                    diffs.push(Self::compute_diff(
                        entry,
                        &desired,
                        existing.as_ref(),
                        physical_id,
                        with_product,
                    ));
                }
                Err(e) => {
                    error!("Failed to resolve {}: {e}", entry.id);
                    errors.push(ResourceError::new(entry, &e));
                }
            }
        }

        let count = |t: DiffType| diffs.iter().filter(|d: &&ResourceDiff| d.diff_type == t).count();
        let result = DiffResult {
            stack_id: manifest.stack_id.clone(),
            creates: count(DiffType::Create),
            updates: count(DiffType::Update),
            unchanged: count(DiffType::NoChange),
            diffs,
            errors,
        };

        info!(
            "Diff: {} creates, {} updates, {} unchanged",
            result.creates, result.updates, result.unchanged
        );
        result
    }

    /// Computes the diff for a single entry.
    fn compute_diff(
        entry: &ResourceManifestEntry,
        desired: &Properties,
        existing: Option<&Properties>,
        physical_id: Option<String>,
        with_product: bool,
    ) -> ResourceDiff {
        let desired = comparable(entry.kind, desired, with_product);
        let existing = existing.map(|bag| comparable(entry.kind, bag, with_product));

        let diff_type = match &existing {
            None => DiffType::Create,
            Some(bag) if *bag == desired => DiffType::NoChange,
            Some(_) => DiffType::Update,
        };
        debug!("{} {}: {diff_type}", entry.kind, entry.id);

        ResourceDiff {
            id: entry.id.clone(),
            kind: entry.kind,
            path: entry.path.clone(),
            diff_type,
            physical_id,
            desired: pretty(desired),
            existing: existing.map(pretty),
        }
    }
}

fn pretty(bag: Properties) -> String {
    serde_json::to_string_pretty(&Value::Object(bag)).unwrap_or_default()
}

impl ResourceDiff {
    /// Returns true if applying would change the remote account.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.diff_type != DiffType::NoChange
    }

    /// Textual patch from the existing to the desired snapshot.
    #[must_use]
    pub fn patch(&self) -> Option<String> {
        match (&self.existing, self.diff_type) {
            (Some(existing), DiffType::Update) => Some(render_patch(existing, &self.desired)),
            _ => None,
        }
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.creates > 0 || self.updates > 0
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.updates
    }

    /// Filters to only diffs that require action.
    #[must_use]
    pub fn actionable_diffs(&self) -> Vec<&ResourceDiff> {
        self.diffs.iter().filter(|d| d.is_changed()).collect()
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "will create",
            Self::Update => "will change",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.kind, self.diff_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{PriceProps, ProductProps, Resource, Stack, StackConfig};
    use crate::stripe::testing::FakeProvider;
    use serde_json::json;

    fn manifest(unit_amount: i64) -> StackManifest {
        let stack = Stack::new("Billing", StackConfig::default()).unwrap();
        let product = Resource::new(
            &stack,
            "MyProduct",
            ProductProps {
                name: String::from("Widget"),
                ..ProductProps::default()
            },
        )
        .unwrap();
        Resource::new(
            &stack,
            "Monthly",
            PriceProps {
                unit_amount: Some(unit_amount),
                ..PriceProps::for_product(&product, "usd")
            },
        )
        .unwrap();
        stack.synth()
    }

    fn seeded() -> FakeProvider {
        let provider = FakeProvider::new();
        provider.insert(
            ResourceKind::Product,
            json!({
                "id": "prod_1",
                "name": "Widget",
                "active": true,
                "images": [],
                "metadata": { "billstack_logical_id": "MyProduct" }
            }),
        );
        provider.insert(
            ResourceKind::Price,
            json!({
                "id": "price_1",
                "product": "prod_1",
                "currency": "usd",
                "unit_amount": 999,
                "active": true,
                "billing_scheme": "per_unit",
                "tax_behavior": "unspecified",
                "metadata": { "billstack_logical_id": "Monthly" }
            }),
        );
        provider
    }

    #[tokio::test]
    async fn test_everything_missing_is_create() {
        let provider = FakeProvider::new();
        let state = StateStore::empty("unused.json");

        let result = DiffEngine::new(&provider, &state).diff(&manifest(999)).await;

        assert_eq!(result.creates, 2);
        assert!(result.has_changes());
        assert!(result.diffs.iter().all(|d| d.existing.is_none() && d.patch().is_none()));
    }

    #[tokio::test]
    async fn test_matching_remote_is_no_change() {
        let provider = seeded();
        let state = StateStore::empty("unused.json");

        let result = DiffEngine::new(&provider, &state).diff(&manifest(999)).await;

        assert_eq!(result.unchanged, 2, "{:?}", result.diffs);
        assert!(!result.has_changes());
        assert_eq!(result.diffs[1].physical_id.as_deref(), Some("price_1"));
    }

    #[tokio::test]
    async fn test_changed_price_renders_patch() {
        let provider = seeded();
        let state = StateStore::empty("unused.json");

        let result = DiffEngine::new(&provider, &state).diff(&manifest(1299)).await;

        assert_eq!(result.updates, 1);
        let diff = &result.actionable_diffs()[0];
        assert_eq!(diff.id, "Monthly");
        let patch = diff.patch().expect("update should have a patch");
        assert!(patch.contains("-   \"unit_amount\": 999"));
        assert!(patch.contains("+   \"unit_amount\": 1299"));
        assert!(provider.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_price_under_other_product_is_update() {
        let provider = FakeProvider::new();
        provider.insert(
            ResourceKind::Product,
            json!({
                "id": "prod_1",
                "name": "Widget",
                "active": true,
                "metadata": { "billstack_logical_id": "MyProduct" }
            }),
        );
        provider.insert(
            ResourceKind::Price,
            json!({
                "id": "price_moved",
                "product": "prod_other",
                "currency": "usd",
                "unit_amount": 999,
                "active": true,
                "metadata": { "billstack_logical_id": "Monthly" }
            }),
        );
        let state = StateStore::empty("unused.json");

        let result = DiffEngine::new(&provider, &state).diff(&manifest(999)).await;

        assert_eq!(result.diffs[0].diff_type, DiffType::NoChange);
        assert_eq!(result.diffs[1].diff_type, DiffType::Update);
        assert_eq!(result.diffs[1].physical_id.as_deref(), Some("price_moved"));
    }
}
