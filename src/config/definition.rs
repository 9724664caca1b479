//! Definition file types.
//!
//! These structs map to `billstack.yaml`. Loading a definition builds a real
//! construct tree through the public construction API, so every
//! construction-time check applies to files exactly as it does to code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::construct::{
    BillingMeterProps, Construct, CouponProps, EntitlementFeatureProps, PriceProps, ProductProps,
    Resource, ResourceSpec, Stack, StackConfig,
};
use crate::error::{ConfigError, Result};

/// Default state file location, relative to the definition file.
pub const DEFAULT_STATE_PATH: &str = ".billstack/state.json";

/// Default manifest location, relative to the definition file.
pub const DEFAULT_MANIFEST_PATH: &str = "billstack.out/manifest.json";

/// The root of a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionFile {
    /// Stack configuration.
    pub stack: StackDefinition,
    /// Project settings.
    #[serde(default)]
    pub settings: Settings,
    /// Top-level constructs, in declaration order.
    #[serde(default)]
    pub constructs: Vec<ConstructDefinition>,
}

/// Stack-level fields of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    /// Stack id.
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Provider API version pin.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Stack tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Project settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// State file path.
    pub state_path: PathBuf,
    /// Manifest output path.
    pub manifest_path: PathBuf,
    /// Skip product updates whose content hash is unchanged.
    pub skip_unchanged_products: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            skip_unchanged_products: true,
        }
    }
}

impl Settings {
    /// Resolves relative paths against `base`.
    #[must_use]
    pub fn relative_to(&self, base: &Path) -> Self {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        };
        Self {
            state_path: resolve(&self.state_path),
            manifest_path: resolve(&self.manifest_path),
            skip_unchanged_products: self.skip_unchanged_products,
        }
    }

    /// Checks that the paths are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a path is empty or both paths are the same.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("state_path", &self.state_path),
            ("manifest_path", &self.manifest_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidDefinition {
                    message: format!("settings.{name} must not be empty"),
                }
                .into());
            }
        }
        if self.state_path == self.manifest_path {
            return Err(ConfigError::InvalidDefinition {
                message: String::from("settings.state_path and settings.manifest_path must differ"),
            }
            .into());
        }
        Ok(())
    }
}

/// One node of the construct tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConstructDefinition {
    /// Grouping node without a manifest entry.
    Group {
        /// Construct id.
        id: String,
        /// Child constructs.
        #[serde(default)]
        children: Vec<ConstructDefinition>,
    },
    /// A product.
    Product(ResourceDefinition<ProductProps>),
    /// A price.
    Price(ResourceDefinition<PriceProps>),
    /// A coupon.
    Coupon(ResourceDefinition<CouponProps>),
    /// An entitlement feature.
    EntitlementFeature(ResourceDefinition<EntitlementFeatureProps>),
    /// A billing meter.
    BillingMeter(ResourceDefinition<BillingMeterProps>),
}

/// A resource node: id, optional imported remote id and typed props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition<T> {
    /// Logical id.
    pub id: String,
    /// Remote id of an existing object to adopt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    /// Kind-specific properties.
    #[serde(flatten)]
    pub props: T,
}

impl<T: Clone + Into<ResourceSpec>> ResourceDefinition<T> {
    fn declare(&self, scope: &Construct) -> Result<Resource> {
        match &self.physical_id {
            Some(physical_id) => {
                Resource::import(scope, &self.id, self.props.clone(), physical_id.as_str())
            }
            None => Resource::new(scope, &self.id, self.props.clone()),
        }
    }
}

impl ConstructDefinition {
    /// The construct id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Group { id, .. } => id,
            Self::Product(def) => &def.id,
            Self::Price(def) => &def.id,
            Self::Coupon(def) => &def.id,
            Self::EntitlementFeature(def) => &def.id,
            Self::BillingMeter(def) => &def.id,
        }
    }

    fn build(&self, scope: &Construct) -> Result<()> {
        match self {
            Self::Group { id, children } => {
                let group = Construct::new(scope, id)?;
                for child in children {
                    child.build(&group)?;
                }
            }
            Self::Product(def) => {
                def.declare(scope)?;
            }
            Self::Price(def) => {
                def.declare(scope)?;
            }
            Self::Coupon(def) => {
                def.declare(scope)?;
            }
            Self::EntitlementFeature(def) => {
                def.declare(scope)?;
            }
            Self::BillingMeter(def) => {
                def.declare(scope)?;
            }
        }
        Ok(())
    }
}

impl DefinitionFile {
    /// Builds the construct tree.
    ///
    /// `api_key` is threaded into the stack configuration; nothing here reads
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns the first construction or validation error.
    pub fn build(&self, api_key: Option<String>) -> Result<Stack> {
        let config = StackConfig {
            api_key,
            api_version: self.stack.api_version.clone(),
            description: self.stack.description.clone(),
            tags: self.stack.tags.clone(),
        };
        let stack = Stack::new(&self.stack.id, config)?;
        for construct in &self.constructs {
            construct.build(stack.construct())?;
        }
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::ResourceKind;
    use crate::error::{BillstackError, ConstructError, ValidationError};
    use serde_json::json;

    fn parse(yaml: &str) -> DefinitionFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    const DEFINITION: &str = r#"
stack:
  id: Billing
  api_version: "2024-06-20"
  tags:
    team: growth
constructs:
  - type: Product
    id: Pro
    name: Pro plan
    unit_label: seat
  - type: Group
    id: Prices
    children:
      - type: Price
        id: ProMonthly
        product: Pro
        currency: usd
        unit_amount: 2000
        recurring:
          interval: month
      - type: Price
        id: ProTiered
        product: Pro
        currency: usd
        tiers_mode: graduated
        tiers:
          - up_to: 10
            unit_amount: 100
          - unit_amount: 50
  - type: Coupon
    id: LAUNCH20
    duration: once
    percent_off: 20
  - type: Product
    id: Legacy
    name: Legacy plan
    physical_id: prod_legacy
"#;

    #[test]
    fn test_definition_builds_tree_in_declaration_order() {
        let stack = parse(DEFINITION).build(None).unwrap();
        let manifest = stack.synth();

        let ids: Vec<_> = manifest.resources.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["Pro", "ProMonthly", "ProTiered", "LAUNCH20", "Legacy"]);
        assert_eq!(manifest.api_version.as_deref(), Some("2024-06-20"));
        assert_eq!(manifest.tags.get("team").map(String::as_str), Some("growth"));

        let monthly = manifest.entry("ProMonthly").unwrap();
        assert_eq!(monthly.path, "Billing/Prices/ProMonthly");
        assert_eq!(monthly.kind, ResourceKind::Price);
        assert_eq!(monthly.properties["recurring"], json!({ "interval": "month" }));

        let tiered = manifest.entry("ProTiered").unwrap();
        assert_eq!(tiered.properties["billing_scheme"], json!("tiered"));
        assert_eq!(tiered.properties["tiers"][1]["up_to"], json!("inf"));

        assert_eq!(manifest.entry("LAUNCH20").unwrap().properties["percent_off"], json!(20));
        assert_eq!(
            manifest.entry("Legacy").unwrap().physical_id.as_deref(),
            Some("prod_legacy")
        );
    }

    #[test]
    fn test_settings_default_when_absent() {
        let definition = parse(DEFINITION);
        assert_eq!(definition.settings, Settings::default());
        assert!(definition.settings.skip_unchanged_products);
    }

    #[test]
    fn test_settings_resolved_against_base() {
        let settings = Settings {
            manifest_path: PathBuf::from("/tmp/out.json"),
            ..Settings::default()
        }
        .relative_to(Path::new("/project"));

        assert_eq!(settings.state_path, PathBuf::from("/project/.billstack/state.json"));
        assert_eq!(settings.manifest_path, PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn test_same_state_and_manifest_path_rejected() {
        let settings = Settings {
            manifest_path: PathBuf::from(DEFAULT_STATE_PATH),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(BillstackError::Config(ConfigError::InvalidDefinition { .. }))
        ));
    }

    #[test]
    fn test_invalid_coupon_fails_at_build() {
        let definition = parse(
            r"
stack:
  id: Billing
constructs:
  - type: Coupon
    id: BAD
    duration: once
    amount_off: 500
    percent_off: 10
",
        );

        assert!(matches!(
            definition.build(None),
            Err(BillstackError::Validation(ValidationError::AmountAndPercentExclusive { .. }))
        ));
    }

    #[test]
    fn test_duplicate_sibling_fails_at_build() {
        let definition = parse(
            r"
stack:
  id: Billing
constructs:
  - type: Product
    id: Pro
    name: Pro
  - type: Product
    id: Pro
    name: Pro again
",
        );

        assert!(matches!(
            definition.build(None),
            Err(BillstackError::Construct(ConstructError::DuplicateIdentifier { .. }))
        ));
    }
}
