//! Construct tree, resource model and manifest synthesis.
//!
//! User code builds a tree of [`Construct`]s rooted at (or containing) a
//! [`Stack`], declares [`Resource`]s inside it and calls [`Stack::synth`] to
//! flatten the tree into a [`StackManifest`].

mod coupon;
mod entitlement;
mod manifest;
mod meter;
mod node;
mod price;
mod product;
mod resource;
mod stack;

pub use coupon::{CouponDuration, CouponProps};
pub use entitlement::EntitlementFeatureProps;
pub use manifest::{ResourceManifestEntry, StackManifest};
pub use meter::{
    AggregationFormula, BillingMeterProps, CustomerMapping, DefaultAggregation, EventTimeWindow,
    ValueSettings, DEFAULT_CUSTOMER_MAPPING_TYPE,
};
pub use node::{Construct, PATH_SEPARATOR};
pub use price::{
    Interval, PriceProps, PriceTier, Recurring, Rounding, TaxBehavior, TiersMode,
    TransformQuantity, UsageType,
};
pub use product::ProductProps;
pub use resource::{Properties, Resource, ResourceKind, ResourceSpec};
pub use stack::{Stack, StackConfig};
