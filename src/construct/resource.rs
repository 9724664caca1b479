//! Resource nodes.
//!
//! A resource is a construct that contributes one entry to the stack
//! manifest. Its property bag is derived once, from fully-built typed props,
//! before the node is attached to the tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{ConstructError, Result};

use super::coupon::CouponProps;
use super::entitlement::EntitlementFeatureProps;
use super::manifest::ResourceManifestEntry;
use super::meter::BillingMeterProps;
use super::node::{Construct, NodeRole, PATH_SEPARATOR};
use super::price::PriceProps;
use super::product::ProductProps;

/// Provider-facing property bag.
pub type Properties = serde_json::Map<String, Value>;

/// The fixed set of resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A product.
    Product,
    /// A price attached to a product.
    Price,
    /// A coupon.
    Coupon,
    /// An entitlement feature.
    EntitlementFeature,
    /// A billing meter.
    BillingMeter,
}

impl ResourceKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Product,
        Self::Price,
        Self::Coupon,
        Self::EntitlementFeature,
        Self::BillingMeter,
    ];

    /// The kind tag as written in manifests and state files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "Product",
            Self::Price => "Price",
            Self::Coupon => "Coupon",
            Self::EntitlementFeature => "EntitlementFeature",
            Self::BillingMeter => "BillingMeter",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed properties for one resource, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    /// Product properties.
    Product(ProductProps),
    /// Price properties.
    Price(PriceProps),
    /// Coupon properties.
    Coupon(CouponProps),
    /// Entitlement feature properties.
    EntitlementFeature(EntitlementFeatureProps),
    /// Billing meter properties.
    BillingMeter(BillingMeterProps),
}

impl ResourceSpec {
    /// The kind these props declare.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Product(_) => ResourceKind::Product,
            Self::Price(_) => ResourceKind::Price,
            Self::Coupon(_) => ResourceKind::Coupon,
            Self::EntitlementFeature(_) => ResourceKind::EntitlementFeature,
            Self::BillingMeter(_) => ResourceKind::BillingMeter,
        }
    }

    /// Checks construction-time invariants.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `path` when the props are invalid.
    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            Self::Product(props) => props.validate(path),
            Self::Price(props) => props.validate(path),
            Self::Coupon(props) => props.validate(path),
            Self::EntitlementFeature(props) => props.validate(path),
            Self::BillingMeter(props) => props.validate(path),
        }
    }

    /// Derives the provider wire shape.
    #[must_use]
    pub fn to_properties(&self) -> Properties {
        match self {
            Self::Product(props) => props.to_properties(),
            Self::Price(props) => props.to_properties(),
            Self::Coupon(props) => props.to_properties(),
            Self::EntitlementFeature(props) => props.to_properties(),
            Self::BillingMeter(props) => props.to_properties(),
        }
    }
}

impl From<ProductProps> for ResourceSpec {
    fn from(props: ProductProps) -> Self {
        Self::Product(props)
    }
}

impl From<PriceProps> for ResourceSpec {
    fn from(props: PriceProps) -> Self {
        Self::Price(props)
    }
}

impl From<CouponProps> for ResourceSpec {
    fn from(props: CouponProps) -> Self {
        Self::Coupon(props)
    }
}

impl From<EntitlementFeatureProps> for ResourceSpec {
    fn from(props: EntitlementFeatureProps) -> Self {
        Self::EntitlementFeature(props)
    }
}

impl From<BillingMeterProps> for ResourceSpec {
    fn from(props: BillingMeterProps) -> Self {
        Self::BillingMeter(props)
    }
}

/// Sealed, derived data of a resource node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResourceRecord {
    pub(crate) kind: ResourceKind,
    pub(crate) physical_id: Option<String>,
    pub(crate) properties: Properties,
}

/// Handle to a resource node.
#[derive(Debug, Clone)]
pub struct Resource {
    construct: Construct,
    record: Rc<ResourceRecord>,
}

impl Resource {
    /// Declares a new resource in `scope`.
    ///
    /// # Errors
    ///
    /// Fails on an empty or duplicate id, when no stack encloses `scope`, or
    /// when the props violate a validation rule.
    pub fn new(scope: &impl AsRef<Construct>, id: &str, spec: impl Into<ResourceSpec>) -> Result<Self> {
        Self::declare(scope.as_ref(), id, spec.into(), None)
    }

    /// Declares a resource that already exists remotely under `physical_id`.
    ///
    /// # Errors
    ///
    /// Same as [`Resource::new`].
    pub fn import(
        scope: &impl AsRef<Construct>,
        id: &str,
        spec: impl Into<ResourceSpec>,
        physical_id: impl Into<String>,
    ) -> Result<Self> {
        Self::declare(scope.as_ref(), id, spec.into(), Some(physical_id.into()))
    }

    fn declare(
        scope: &Construct,
        id: &str,
        spec: ResourceSpec,
        physical_id: Option<String>,
    ) -> Result<Self> {
        Construct::check_child_id(Some(scope), id)?;

        let path = format!("{}{PATH_SEPARATOR}{id}", scope.path());
        if scope.nearest_stack().is_none() {
            return Err(ConstructError::MissingStackAncestor { path }.into());
        }

        spec.validate(&path)?;

        let record = Rc::new(ResourceRecord {
            kind: spec.kind(),
            physical_id,
            properties: spec.to_properties(),
        });
        let construct = Construct::attach(Some(scope), id, NodeRole::Resource(Rc::clone(&record)))?;

        Ok(Self { construct, record })
    }

    /// Wraps a construct if it is a resource node.
    #[must_use]
    pub fn from_construct(construct: &Construct) -> Option<Self> {
        construct.resource_record().map(|record| Self {
            construct: construct.clone(),
            record: Rc::clone(record),
        })
    }

    /// The underlying construct.
    #[must_use]
    pub const fn construct(&self) -> &Construct {
        &self.construct
    }

    /// The logical id.
    #[must_use]
    pub fn logical_id(&self) -> &str {
        self.construct.id()
    }

    /// The construct path.
    #[must_use]
    pub fn path(&self) -> String {
        self.construct.path()
    }

    /// The resource kind.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.record.kind
    }

    /// Known remote id, for imported resources.
    #[must_use]
    pub fn physical_id(&self) -> Option<&str> {
        self.record.physical_id.as_deref()
    }

    /// The derived property bag.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.record.properties
    }

    /// Snapshot of this resource for the manifest.
    #[must_use]
    pub fn to_manifest_entry(&self) -> ResourceManifestEntry {
        ResourceManifestEntry {
            id: self.logical_id().to_string(),
            path: self.path(),
            kind: self.kind(),
            properties: self.properties().clone(),
            physical_id: self.record.physical_id.clone(),
        }
    }
}

impl AsRef<Construct> for Resource {
    fn as_ref(&self) -> &Construct {
        &self.construct
    }
}

/// Incremental builder for a property bag. Unset optionals are omitted.
#[derive(Debug, Default)]
pub(crate) struct PropertyBag(Properties);

impl PropertyBag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub(crate) fn insert_opt<T: Into<Value>>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.0.insert(key.to_string(), value.into());
        }
        self
    }

    pub(crate) fn insert_metadata(
        &mut self,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> &mut Self {
        if let Some(metadata) = metadata {
            let map: Properties = metadata
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            self.0.insert(String::from("metadata"), Value::Object(map));
        }
        self
    }

    pub(crate) fn build(&mut self) -> Properties {
        std::mem::take(&mut self.0)
    }
}

/// Fails with `InvalidField` when a required string is blank.
pub(crate) fn require_non_empty(path: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::error::ValidationError::invalid_field(path, field, "must not be empty").into());
    }
    Ok(())
}
