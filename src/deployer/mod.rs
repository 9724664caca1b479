//! Deployer for reconciling a stack manifest against the remote account.
//!
//! Entries are processed one at a time: in manifest order for deploy, so
//! that earlier remote ids are available for reference substitution, and in
//! reverse order for destroy, so that prices go before their products. A
//! failure is recorded against its entry and never stops the run.

mod context;
mod result;

pub use context::DeployContext;
pub use result::{
    DeployResult, DeployStatus, DeployedResource, DestroyResult, DestroyStatus, DestroyedResource,
    ResourceError,
};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::construct::{Properties, ResourceKind, ResourceManifestEntry, StackManifest};
use crate::error::{ProviderError, Result};
use crate::planner::{
    bags_equal, is_active, normalize, DiffEngine, DiffResult, Resolver, LOGICAL_ID_TAG, PATH_TAG,
};
use crate::state::{PropertiesHasher, ResourceState, StateStore};
use crate::stripe::{remote_id, BillingProvider, RemoteObject};

/// Tunables for a deploy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    /// Skip the update call for a product whose tracked hash and remote id
    /// both match.
    pub skip_unchanged_products: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            skip_unchanged_products: true,
        }
    }
}

/// Outcome of applying one entry.
struct Applied {
    physical_id: String,
    status: DeployStatus,
    previous_physical_id: Option<String>,
}

impl Applied {
    const fn new(physical_id: String, status: DeployStatus) -> Self {
        Self {
            physical_id,
            status,
            previous_physical_id: None,
        }
    }
}

/// Reconciles manifests against a [`BillingProvider`], tracking identities in
/// a [`StateStore`].
pub struct Deployer<P: BillingProvider> {
    provider: P,
    state: StateStore,
    options: DeployOptions,
    hasher: PropertiesHasher,
}

impl<P: BillingProvider> Deployer<P> {
    /// Creates a deployer with default options.
    #[must_use]
    pub fn new(provider: P, state: StateStore) -> Self {
        Self {
            provider,
            state,
            options: DeployOptions::default(),
            hasher: PropertiesHasher::new(),
        }
    }

    /// Sets the deploy options.
    #[must_use]
    pub const fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    /// The provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The state store.
    #[must_use]
    pub const fn state(&self) -> &StateStore {
        &self.state
    }

    /// Consumes the deployer, returning its state store.
    #[must_use]
    pub fn into_state(self) -> StateStore {
        self.state
    }

    /// Computes the diff of `manifest` without changing anything.
    pub async fn diff(&self, manifest: &StackManifest) -> DiffResult {
        DiffEngine::new(&self.provider, &self.state).diff(manifest).await
    }

    /// Makes the remote account match `manifest`.
    ///
    /// Every entry yields exactly one deployed resource or one error. State
    /// is saved at the end; a save failure becomes a warning.
    pub async fn deploy(&mut self, manifest: &StackManifest) -> DeployResult {
        info!(
            "Deploying stack {} ({} resources)",
            manifest.stack_id,
            manifest.resources.len()
        );

        let mut context = DeployContext::new();
        let mut result = DeployResult::new(&manifest.stack_id);

        for entry in &manifest.resources {
            let desired = context.resolve(&entry.properties);
            let hash = self.hasher.hash(&desired);

            match self
                .apply(&manifest.stack_id, entry, &desired, &hash, &context)
                .await
            {
                Ok(applied) => {
                    info!("{} {}: {}", entry.kind, entry.id, applied.status);
                    context.record(&entry.id, &applied.physical_id);
                    self.state.set_resource(
                        &manifest.stack_id,
                        ResourceState::deployed(entry, &applied.physical_id, hash),
                    );
                    result.deployed.push(DeployedResource {
                        id: entry.id.clone(),
                        kind: entry.kind,
                        physical_id: Some(applied.physical_id),
                        status: applied.status,
                        previous_physical_id: applied.previous_physical_id,
                    });
                }
                Err(e) => {
                    error!("Failed to deploy {} {}: {e}", entry.kind, entry.id);
                    result.errors.push(ResourceError::new(entry, &e));
                }
            }
        }

        if let Err(e) = self.state.save().await {
            warn!("Failed to save state: {e}");
            result.warnings.push(format!("Failed to save state: {e}"));
        }

        info!(
            "Deploy finished: {} created, {} updated, {} unchanged, {} failed",
            result.count(DeployStatus::Created),
            result.count(DeployStatus::Updated),
            result.count(DeployStatus::Unchanged),
            result.errors.len()
        );
        result
    }

    /// Tears down every resource of `manifest` in reverse declaration order.
    ///
    /// A resource that no longer exists remotely counts as destroyed.
    pub async fn destroy(&mut self, manifest: &StackManifest) -> DestroyResult {
        info!(
            "Destroying stack {} ({} resources)",
            manifest.stack_id,
            manifest.resources.len()
        );

        let mut result = DestroyResult::new(&manifest.stack_id);

        for entry in manifest.teardown_order() {
            match self.teardown(&manifest.stack_id, entry).await {
                Ok(physical_id) => {
                    let status = DestroyStatus::for_kind(entry.kind);
                    match &physical_id {
                        Some(id) => info!("{} {} ({id}): {status}", entry.kind, entry.id),
                        None => info!("{} {} does not exist; nothing to do", entry.kind, entry.id),
                    }
                    self.state.remove_resource(&manifest.stack_id, &entry.id);
                    result.destroyed.push(DestroyedResource {
                        id: entry.id.clone(),
                        kind: entry.kind,
                        physical_id,
                        status,
                    });
                }
                Err(e) => {
                    error!("Failed to destroy {} {}: {e}", entry.kind, entry.id);
                    result.errors.push(ResourceError::new(entry, &e));
                }
            }
        }

        if let Err(e) = self.state.save().await {
            warn!("Failed to save state: {e}");
            result.warnings.push(format!("Failed to save state: {e}"));
        }

        result
    }

    async fn find_existing(
        &self,
        stack_id: &str,
        entry: &ResourceManifestEntry,
    ) -> Result<Option<RemoteObject>> {
        Resolver::new(&self.provider, &self.state, stack_id)
            .find_existing(entry)
            .await
    }

    /// Applies one entry with its references already resolved.
    async fn apply(
        &self,
        stack_id: &str,
        entry: &ResourceManifestEntry,
        desired: &Properties,
        hash: &str,
        context: &DeployContext,
    ) -> Result<Applied> {
        let existing = self.find_existing(stack_id, entry).await?;
        let existing_id = existing.as_ref().map(object_id).transpose()?;

        match entry.kind {
            ResourceKind::Product => {
                self.apply_product(stack_id, entry, desired, hash, existing_id)
                    .await
            }
            ResourceKind::Price => match (existing, existing_id) {
                (Some(object), Some(id)) => {
                    let with_product = context.names_remote_product(desired);
                    self.apply_price(entry, desired, &object, id, with_product)
                        .await
                }
                _ => self.create(entry, with_identity_tags(entry, desired)).await,
            },
            ResourceKind::Coupon => match existing_id {
                Some(id) => Ok(Applied::new(id, DeployStatus::Unchanged)),
                None => {
                    let mut params = desired.clone();
                    let id = entry.physical_id.as_deref().unwrap_or(&entry.id);
                    params.insert(String::from("id"), Value::from(id));
                    self.create(entry, params).await
                }
            },
            ResourceKind::EntitlementFeature | ResourceKind::BillingMeter => {
                match (existing, existing_id) {
                    (Some(object), Some(id)) => {
                        if !is_active(&object) {
                            warn!("{} {id} is inactive; reactivating", entry.kind);
                            self.provider.reactivate(entry.kind, &id).await?;
                        }
                        let params = mutable_fields(entry.kind, desired);
                        info!("Updating {} {id}", entry.kind);
                        self.provider.update(entry.kind, &id, &params).await?;
                        Ok(Applied::new(id, DeployStatus::Updated))
                    }
                    _ => self.create(entry, desired.clone()).await,
                }
            }
        }
    }

    async fn apply_product(
        &self,
        stack_id: &str,
        entry: &ResourceManifestEntry,
        desired: &Properties,
        hash: &str,
        existing_id: Option<String>,
    ) -> Result<Applied> {
        let params = with_identity_tags(entry, desired);
        let Some(id) = existing_id else {
            return self.create(entry, params).await;
        };

        if self.options.skip_unchanged_products
            && let Some(tracked) = self.state.get_resource(stack_id, &entry.id)
            && tracked.physical_id == id
            && tracked.path == entry.path
            && PropertiesHasher::hashes_match(&tracked.properties_hash, hash)
        {
            debug!(
                "Product {} unchanged since last deploy ({})",
                entry.id,
                self.hasher.short_hash(hash)
            );
            return Ok(Applied::new(id, DeployStatus::Unchanged));
        }

        info!("Updating product {id}");
        self.provider.update(entry.kind, &id, &params).await?;
        Ok(Applied::new(id, DeployStatus::Updated))
    }

    /// Reuses a matching price or replaces it: deactivate the old object,
    /// then create a new one.
    async fn apply_price(
        &self,
        entry: &ResourceManifestEntry,
        desired: &Properties,
        existing: &RemoteObject,
        id: String,
        with_product: bool,
    ) -> Result<Applied> {
        let existing = normalize(entry.kind, existing);
        if bags_equal(entry.kind, desired, &existing, with_product) {
            debug!("Price {} matches {id}", entry.id);
            return Ok(Applied::new(id, DeployStatus::Unchanged));
        }

        info!("Price {} changed; replacing {id}", entry.id);
        self.provider.deactivate(entry.kind, &id).await?;

        let mut params = with_identity_tags(entry, desired);
        if params.contains_key("lookup_key") {
            params.insert(String::from("transfer_lookup_key"), Value::Bool(true));
        }

        let mut applied = self.create(entry, params).await?;
        applied.previous_physical_id = Some(id);
        Ok(applied)
    }

    async fn create(&self, entry: &ResourceManifestEntry, params: Properties) -> Result<Applied> {
        info!("Creating {} {}", entry.kind, entry.id);
        let created = self.provider.create(entry.kind, &params).await?;
        Ok(Applied::new(object_id(&created)?, DeployStatus::Created))
    }

    /// Destroys one entry, returning the remote id that was torn down.
    async fn teardown(&self, stack_id: &str, entry: &ResourceManifestEntry) -> Result<Option<String>> {
        if entry.kind == ResourceKind::Coupon {
            let id = entry.physical_id.as_deref().unwrap_or(&entry.id);
            return match self.provider.delete(entry.kind, id).await {
                Ok(()) => Ok(Some(id.to_string())),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            };
        }

        let Some(existing) = self.find_existing(stack_id, entry).await? else {
            return Ok(None);
        };
        let id = object_id(&existing)?;

        match DestroyStatus::for_kind(entry.kind) {
            DestroyStatus::Deleted => self.provider.delete(entry.kind, &id).await?,
            DestroyStatus::Deactivated => {
                self.provider.deactivate(entry.kind, &id).await?;
            }
        }
        Ok(Some(id))
    }
}

fn object_id(object: &RemoteObject) -> Result<String> {
    remote_id(object)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::invalid_response("Remote object has no id").into())
}

/// Adds the logical id and path tags to the bag's metadata.
fn with_identity_tags(entry: &ResourceManifestEntry, desired: &Properties) -> Properties {
    let mut params = desired.clone();
    let mut metadata = match params.remove("metadata") {
        Some(Value::Object(map)) => map,
        _ => Properties::new(),
    };
    metadata.insert(LOGICAL_ID_TAG.to_string(), Value::from(entry.id.as_str()));
    metadata.insert(PATH_TAG.to_string(), Value::from(entry.path.as_str()));
    params.insert(String::from("metadata"), Value::Object(metadata));
    params
}

/// Fields that may be updated in place for kinds matched by business key.
fn mutable_fields(kind: ResourceKind, desired: &Properties) -> Properties {
    let field = match kind {
        ResourceKind::BillingMeter => "display_name",
        _ => "name",
    };
    desired
        .get(field)
        .map(|value| (field.to_string(), value.clone()))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{
        BillingMeterProps, CouponProps, DefaultAggregation, EntitlementFeatureProps, PriceProps,
        ProductProps, Resource, Stack, StackConfig,
    };
    use crate::state::HASH_LEN;
    use crate::stripe::testing::{Call, FakeProvider};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn stack() -> Stack {
        Stack::new("Billing", StackConfig::default()).unwrap()
    }

    fn product(stack: &Stack, id: &str) -> Resource {
        Resource::new(
            stack,
            id,
            ProductProps {
                name: String::from("Widget"),
                ..ProductProps::default()
            },
        )
        .unwrap()
    }

    fn price(stack: &Stack, product: &Resource, unit_amount: i64, lookup_key: Option<&str>) -> Resource {
        Resource::new(
            stack,
            "Monthly",
            PriceProps {
                unit_amount: Some(unit_amount),
                lookup_key: lookup_key.map(str::to_string),
                ..PriceProps::for_product(product, "usd")
            },
        )
        .unwrap()
    }

    fn coupon(stack: &Stack) -> Resource {
        Resource::new(
            stack,
            "LAUNCH20",
            CouponProps {
                percent_off: Some(20.0),
                ..CouponProps::default()
            },
        )
        .unwrap()
    }

    fn state_path(dir: &TempDir) -> PathBuf {
        dir.path().join("state.json")
    }

    fn deployer(provider: FakeProvider, dir: &TempDir) -> Deployer<FakeProvider> {
        Deployer::new(provider, StateStore::empty(state_path(dir)))
    }

    /// Remote product and price as a previous deploy would have left them.
    fn seeded(unit_amount: i64) -> FakeProvider {
        let provider = FakeProvider::new();
        provider.insert(
            ResourceKind::Product,
            json!({
                "id": "prod_seed",
                "name": "Widget",
                "active": true,
                "metadata": { "billstack_logical_id": "MyProduct" }
            }),
        );
        provider.insert(
            ResourceKind::Price,
            json!({
                "id": "price_old",
                "product": "prod_seed",
                "currency": "usd",
                "unit_amount": unit_amount,
                "active": true,
                "billing_scheme": "per_unit",
                "tax_behavior": "unspecified",
                "metadata": { "billstack_logical_id": "Monthly" }
            }),
        );
        provider
    }

    #[tokio::test]
    async fn test_new_product_is_created_with_identity_tags() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        let mut deployer = deployer(FakeProvider::new(), &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        assert_eq!(result.deployed.len(), 1);
        assert_eq!(result.deployed[0].status, DeployStatus::Created);
        assert_eq!(result.deployed[0].physical_id.as_deref(), Some("prod_1"));

        let mutations = deployer.provider().mutations();
        let Call::Create(ResourceKind::Product, params) = &mutations[0] else {
            panic!("expected a product create, got {mutations:?}");
        };
        assert_eq!(params["metadata"][LOGICAL_ID_TAG], json!("MyProduct"));
        assert_eq!(params["metadata"][PATH_TAG], json!("Billing/MyProduct"));
    }

    #[tokio::test]
    async fn test_price_reference_resolves_to_new_product_id() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, None);
        let mut deployer = deployer(FakeProvider::new(), &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        let creates: Vec<_> = deployer
            .provider()
            .mutations()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(ResourceKind::Price, params) => Some(params),
                _ => None,
            })
            .collect();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0]["product"], json!("prod_1"));
    }

    #[tokio::test]
    async fn test_matching_price_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, None);
        let mut deployer = deployer(seeded(999), &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        assert_eq!(result.deployed[1].status, DeployStatus::Unchanged);
        assert_eq!(result.deployed[1].physical_id.as_deref(), Some("price_old"));
        assert!(
            !deployer
                .provider()
                .mutations()
                .iter()
                .any(|call| matches!(call, Call::Create(..) | Call::Deactivate(..)))
        );
    }

    #[tokio::test]
    async fn test_changed_price_is_replaced() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, None);
        let mut deployer = deployer(seeded(500), &dir);

        let result = deployer.deploy(&stack.synth()).await;

        let replaced = &result.deployed[1];
        assert_eq!(replaced.status, DeployStatus::Created);
        assert_eq!(replaced.previous_physical_id.as_deref(), Some("price_old"));
        let new_id = replaced.physical_id.clone().unwrap();
        assert_ne!(new_id, "price_old");

        let mutations = deployer.provider().mutations();
        let deactivate = mutations
            .iter()
            .position(|c| *c == Call::Deactivate(ResourceKind::Price, String::from("price_old")))
            .expect("old price should be deactivated");
        let create = mutations
            .iter()
            .position(|c| matches!(c, Call::Create(ResourceKind::Price, _)))
            .expect("new price should be created");
        assert!(deactivate < create);

        let tracked = deployer.state().get_resource("Billing", "Monthly").unwrap();
        assert_eq!(tracked.physical_id, new_id);
    }

    #[tokio::test]
    async fn test_price_under_other_product_is_replaced() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, None);
        let provider = FakeProvider::new();
        provider.insert(
            ResourceKind::Product,
            json!({
                "id": "prod_seed",
                "name": "Widget",
                "active": true,
                "metadata": { "billstack_logical_id": "MyProduct" }
            }),
        );
        provider.insert(
            ResourceKind::Price,
            json!({
                "id": "price_old",
                "product": "prod_elsewhere",
                "currency": "usd",
                "unit_amount": 999,
                "active": true,
                "metadata": { "billstack_logical_id": "Monthly" }
            }),
        );
        let mut deployer = deployer(provider, &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        let replaced = &result.deployed[1];
        assert_eq!(replaced.status, DeployStatus::Created);
        assert_eq!(replaced.previous_physical_id.as_deref(), Some("price_old"));

        let params = deployer
            .provider()
            .mutations()
            .into_iter()
            .find_map(|call| match call {
                Call::Create(ResourceKind::Price, params) => Some(params),
                _ => None,
            })
            .unwrap();
        assert_eq!(params["product"], json!("prod_seed"));
    }

    #[tokio::test]
    async fn test_decimal_only_price_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        Resource::new(
            &stack,
            "Monthly",
            PriceProps {
                unit_amount_decimal: Some(String::from("999")),
                ..PriceProps::for_product(&widget, "usd")
            },
        )
        .unwrap();
        let provider = seeded(999);
        let mut deployer = deployer(provider, &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        assert_eq!(result.deployed[1].status, DeployStatus::Unchanged);
        assert_eq!(result.deployed[1].physical_id.as_deref(), Some("price_old"));
        assert!(
            !deployer
                .provider()
                .mutations()
                .iter()
                .any(|call| matches!(call, Call::Create(..) | Call::Deactivate(..)))
        );
    }

    #[tokio::test]
    async fn test_replacement_transfers_lookup_key() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, Some("pro_monthly"));
        let mut deployer = deployer(seeded(500), &dir);

        deployer.deploy(&stack.synth()).await;

        let params = deployer
            .provider()
            .mutations()
            .into_iter()
            .find_map(|call| match call {
                Call::Create(ResourceKind::Price, params) => Some(params),
                _ => None,
            })
            .unwrap();
        assert_eq!(params["transfer_lookup_key"], json!(true));
        assert_eq!(params["lookup_key"], json!("pro_monthly"));
    }

    #[tokio::test]
    async fn test_destroy_runs_in_reverse_order() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, None);
        let manifest = stack.synth();
        let mut deployer = deployer(FakeProvider::new(), &dir);

        deployer.deploy(&manifest).await;
        let before = deployer.provider().mutations().len();
        let result = deployer.destroy(&manifest).await;

        assert!(result.is_success());
        let ids: Vec<_> = result.destroyed.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["Monthly", "MyProduct"]);
        assert_eq!(result.destroyed[0].status, DestroyStatus::Deactivated);
        assert_eq!(result.destroyed[1].status, DestroyStatus::Deleted);

        let teardown = &deployer.provider().mutations()[before..];
        assert_eq!(
            teardown,
            [
                Call::Deactivate(ResourceKind::Price, String::from("price_2")),
                Call::Delete(ResourceKind::Product, String::from("prod_1")),
            ]
        );
        assert!(deployer.state().stack("Billing").is_none());
    }

    #[tokio::test]
    async fn test_destroy_of_absent_resources_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        coupon(&stack);
        let mut deployer = deployer(FakeProvider::new(), &dir);

        let result = deployer.destroy(&stack.synth()).await;

        assert!(result.is_success());
        assert_eq!(result.destroyed.len(), 2);
        assert!(result.destroyed.iter().all(|d| d.physical_id.is_none()));
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        coupon(&stack);
        let provider = FakeProvider::new();
        provider.fail_creates(ResourceKind::Product);
        let mut deployer = deployer(provider, &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(!result.is_success());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].id, "MyProduct");
        assert_eq!(result.deployed.len(), 1);
        assert_eq!(result.deployed[0].id, "LAUNCH20");
        assert!(deployer.state().get_resource("Billing", "MyProduct").is_none());
    }

    #[tokio::test]
    async fn test_coupon_uses_logical_id_as_remote_id() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        coupon(&stack);
        let mut deployer = deployer(FakeProvider::new(), &dir);

        let first = deployer.deploy(&stack.synth()).await;
        let second = deployer.deploy(&stack.synth()).await;

        assert_eq!(first.deployed[0].status, DeployStatus::Created);
        assert_eq!(first.deployed[0].physical_id.as_deref(), Some("LAUNCH20"));
        assert_eq!(second.deployed[0].status, DeployStatus::Unchanged);
        assert_eq!(deployer.provider().mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_feature_and_meter_matched_by_business_key() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        Resource::new(
            &stack,
            "Sso",
            EntitlementFeatureProps {
                name: String::from("Single sign-on"),
                lookup_key: String::from("sso"),
                metadata: None,
            },
        )
        .unwrap();
        Resource::new(
            &stack,
            "ApiCalls",
            BillingMeterProps {
                display_name: String::from("API calls"),
                event_name: String::from("api_call"),
                default_aggregation: DefaultAggregation::default(),
                ..BillingMeterProps::default()
            },
        )
        .unwrap();
        let provider = FakeProvider::new();
        provider.insert(
            ResourceKind::EntitlementFeature,
            json!({ "id": "feat_seed", "name": "SSO", "lookup_key": "sso", "active": true }),
        );
        let mut deployer = deployer(provider, &dir);

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        assert_eq!(result.deployed[0].status, DeployStatus::Updated);
        assert_eq!(result.deployed[0].physical_id.as_deref(), Some("feat_seed"));
        assert_eq!(result.deployed[1].status, DeployStatus::Created);

        let mutations = deployer.provider().mutations();
        let Call::Update(ResourceKind::EntitlementFeature, id, params) = &mutations[0] else {
            panic!("expected a feature update, got {mutations:?}");
        };
        assert_eq!(id, "feat_seed");
        assert_eq!(Value::Object(params.clone()), json!({ "name": "Single sign-on" }));
    }

    #[tokio::test]
    async fn test_redeploy_after_destroy_reactivates_feature_and_meter() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        Resource::new(
            &stack,
            "Sso",
            EntitlementFeatureProps {
                name: String::from("Single sign-on"),
                lookup_key: String::from("sso"),
                metadata: None,
            },
        )
        .unwrap();
        Resource::new(
            &stack,
            "ApiCalls",
            BillingMeterProps {
                display_name: String::from("API calls"),
                event_name: String::from("api_call"),
                default_aggregation: DefaultAggregation::default(),
                ..BillingMeterProps::default()
            },
        )
        .unwrap();
        let manifest = stack.synth();
        let mut deployer = deployer(FakeProvider::new(), &dir);

        deployer.deploy(&manifest).await;
        deployer.destroy(&manifest).await;
        let before = deployer.provider().mutations().len();
        let result = deployer.deploy(&manifest).await;

        assert!(result.is_success());
        assert_eq!(result.deployed[0].physical_id.as_deref(), Some("feat_1"));
        assert_eq!(result.deployed[1].physical_id.as_deref(), Some("mtr_2"));

        let redeploy = &deployer.provider().mutations()[before..];
        assert!(redeploy.contains(&Call::Reactivate(ResourceKind::EntitlementFeature, String::from("feat_1"))));
        assert!(redeploy.contains(&Call::Reactivate(ResourceKind::BillingMeter, String::from("mtr_2"))));
        assert!(!redeploy.iter().any(|call| matches!(call, Call::Create(..))));
    }

    #[tokio::test]
    async fn test_unchanged_product_skips_update_unless_forced() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        let manifest = stack.synth();
        let mut deployer = deployer(FakeProvider::new(), &dir);

        deployer.deploy(&manifest).await;
        let second = deployer.deploy(&manifest).await;
        assert_eq!(second.deployed[0].status, DeployStatus::Unchanged);
        assert_eq!(deployer.provider().mutations().len(), 1);

        let mut deployer = deployer.with_options(DeployOptions {
            skip_unchanged_products: false,
        });
        let forced = deployer.deploy(&manifest).await;
        assert_eq!(forced.deployed[0].status, DeployStatus::Updated);
        assert!(matches!(
            deployer.provider().mutations().last(),
            Some(Call::Update(ResourceKind::Product, id, _)) if id == "prod_1"
        ));
    }

    #[tokio::test]
    async fn test_stale_state_entry_is_recreated() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        let manifest = stack.synth();

        let mut state = StateStore::empty(state_path(&dir));
        state.set_resource(
            "Billing",
            ResourceState::deployed(&manifest.resources[0], "prod_gone", String::from("0")),
        );
        let mut deployer = Deployer::new(FakeProvider::new(), state);

        let result = deployer.deploy(&manifest).await;

        assert!(result.is_success());
        assert_eq!(result.deployed[0].status, DeployStatus::Created);
        let tracked = deployer.state().get_resource("Billing", "MyProduct").unwrap();
        assert_eq!(tracked.physical_id, "prod_1");
    }

    #[tokio::test]
    async fn test_state_is_persisted() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        let mut deployer = deployer(FakeProvider::new(), &dir);

        deployer.deploy(&stack.synth()).await;

        let reopened = StateStore::open(state_path(&dir)).await;
        let tracked = reopened.get_resource("Billing", "MyProduct").unwrap();
        assert_eq!(tracked.physical_id, "prod_1");
        assert_eq!(tracked.path, "Billing/MyProduct");
        assert_eq!(tracked.properties_hash.len(), HASH_LEN);
    }

    #[tokio::test]
    async fn test_state_save_failure_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let stack = stack();
        product(&stack, "MyProduct");
        let mut deployer = Deployer::new(FakeProvider::new(), StateStore::empty(blocker.join("state.json")));

        let result = deployer.deploy(&stack.synth()).await;

        assert!(result.is_success());
        assert_eq!(result.deployed.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Failed to save state"));
    }

    #[tokio::test]
    async fn test_diff_reports_without_mutating() {
        let dir = TempDir::new().unwrap();
        let stack = stack();
        let widget = product(&stack, "MyProduct");
        price(&stack, &widget, 999, None);
        let deployer = deployer(seeded(500), &dir);

        let diff = deployer.diff(&stack.synth()).await;

        assert_eq!(diff.updates, 1);
        assert!(deployer.provider().mutations().is_empty());
    }
}
