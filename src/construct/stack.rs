//! Stacks and manifest synthesis.

use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::Result;

use super::manifest::StackManifest;
use super::node::{Construct, NodeRole};
use super::resource::Resource;

/// Stack-level configuration.
///
/// The API key is supplied by the caller; nothing in the library reads it
/// from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StackConfig {
    /// Secret API key used when deploying this stack.
    pub api_key: Option<String>,
    /// Provider API version pin.
    pub api_version: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Stack tags.
    pub tags: BTreeMap<String, String>,
}

impl fmt::Debug for StackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("description", &self.description)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Root of a set of deployable resources.
#[derive(Debug, Clone)]
pub struct Stack {
    construct: Construct,
}

impl Stack {
    /// Creates a stack at the root of a new tree.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is empty.
    pub fn new(id: &str, config: StackConfig) -> Result<Self> {
        let construct = Construct::attach(None, id, NodeRole::Stack(config))?;
        Ok(Self { construct })
    }

    /// Creates a stack nested inside `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is empty or already used by a sibling.
    pub fn within(scope: &impl AsRef<Construct>, id: &str, config: StackConfig) -> Result<Self> {
        let construct = Construct::attach(Some(scope.as_ref()), id, NodeRole::Stack(config))?;
        Ok(Self { construct })
    }

    /// Wraps a construct if it is a stack.
    #[must_use]
    pub fn from_construct(construct: &Construct) -> Option<Self> {
        construct.is_stack().then(|| Self {
            construct: construct.clone(),
        })
    }

    /// The stack's construct.
    #[must_use]
    pub const fn construct(&self) -> &Construct {
        &self.construct
    }

    /// The stack id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.construct.id()
    }

    /// Stack configuration.
    #[must_use]
    pub fn config(&self) -> StackConfig {
        self.construct.stack_config().cloned().unwrap_or_default()
    }

    /// All resources owned by this stack, in declaration order.
    ///
    /// Resources under a nested stack belong to that stack.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.construct
            .find_all()
            .iter()
            .skip(1)
            .filter(|node| {
                node.nearest_stack()
                    .is_some_and(|stack| stack.same_node(&self.construct))
            })
            .filter_map(Resource::from_construct)
            .collect()
    }

    /// Flattens the tree into a manifest.
    #[must_use]
    pub fn synth(&self) -> StackManifest {
        let config = self.config();
        let resources: Vec<_> = self
            .resources()
            .iter()
            .map(Resource::to_manifest_entry)
            .collect();

        debug!("Synthesized stack {} with {} resources", self.id(), resources.len());

        StackManifest {
            stack_id: self.id().to_string(),
            api_version: config.api_version,
            description: config.description,
            tags: config.tags,
            resources,
        }
    }
}

impl AsRef<Construct> for Stack {
    fn as_ref(&self) -> &Construct {
        &self.construct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{PriceProps, ProductProps, ResourceKind};

    fn product(name: &str) -> ProductProps {
        ProductProps {
            name: name.to_string(),
            ..ProductProps::default()
        }
    }

    #[test]
    fn test_synth_collects_resources_in_declaration_order() {
        let stack = Stack::new(
            "Billing",
            StackConfig {
                api_version: Some(String::from("2024-06-20")),
                description: Some(String::from("Pricing")),
                ..StackConfig::default()
            },
        )
        .unwrap();
        let pro = Resource::new(&stack, "Pro", product("Pro")).unwrap();
        let plans = Construct::new(&stack, "Plans").unwrap();
        Resource::new(&plans, "ProMonthly", PriceProps::for_product(&pro, "usd")).unwrap();
        Resource::new(&stack, "Team", product("Team")).unwrap();

        let manifest = stack.synth();
        assert_eq!(manifest.stack_id, "Billing");
        assert_eq!(manifest.api_version.as_deref(), Some("2024-06-20"));
        assert_eq!(manifest.description.as_deref(), Some("Pricing"));

        let ids: Vec<&str> = manifest.resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Pro", "ProMonthly", "Team"]);
        assert_eq!(manifest.resources[1].path, "Billing/Plans/ProMonthly");
        assert_eq!(manifest.resources[1].kind, ResourceKind::Price);
        assert_eq!(manifest.resources[1].properties["product"], "Pro");
    }

    #[test]
    fn test_synth_skips_nested_stack_resources() {
        let app = Construct::root("App").unwrap();
        let outer = Stack::within(&app, "Outer", StackConfig::default()).unwrap();
        Resource::new(&outer, "A", product("A")).unwrap();
        let inner = Stack::within(&outer, "Inner", StackConfig::default()).unwrap();
        Resource::new(&inner, "B", product("B")).unwrap();

        let outer_ids: Vec<String> = outer.synth().resources.into_iter().map(|r| r.id).collect();
        let inner_ids: Vec<String> = inner.synth().resources.into_iter().map(|r| r.id).collect();
        assert_eq!(outer_ids, vec!["A"]);
        assert_eq!(inner_ids, vec!["B"]);
    }

    #[test]
    fn test_config_debug_redacts_api_key() {
        let config = StackConfig {
            api_key: Some(String::from("sk_test_secret")),
            ..StackConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk_test_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
