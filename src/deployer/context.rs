//! Per-run substitution table.

use serde_json::Value;
use std::collections::HashMap;

use crate::construct::Properties;

const PRODUCT_ID_PREFIX: &str = "prod_";

/// Logical to remote id mapping built up during one deploy or diff pass.
///
/// A fresh context is created for every run, so ids never leak between runs.
#[derive(Debug, Default)]
pub struct DeployContext {
    physical_ids: HashMap<String, String>,
}

impl DeployContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the remote id produced for `logical_id`.
    pub fn record(&mut self, logical_id: &str, physical_id: &str) {
        self.physical_ids
            .insert(logical_id.to_string(), physical_id.to_string());
    }

    /// Remote id recorded for `logical_id` in this run.
    #[must_use]
    pub fn physical_id(&self, logical_id: &str) -> Option<&str> {
        self.physical_ids.get(logical_id).map(String::as_str)
    }

    /// Returns true if the `product` of a resolved price bag is a remote id.
    ///
    /// That is a `prod_` id or an id recorded in this run. A reference whose
    /// product failed to deploy stays a logical id and does not count.
    #[must_use]
    pub fn names_remote_product(&self, desired: &Properties) -> bool {
        desired
            .get("product")
            .and_then(Value::as_str)
            .is_some_and(|product| {
                product.starts_with(PRODUCT_ID_PREFIX)
                    || self.physical_ids.values().any(|id| id == product)
            })
    }

    /// Copy of `properties` with every top-level string that names a logical
    /// id seen earlier in this run replaced by its remote id.
    ///
    /// Nested values are never rewritten.
    #[must_use]
    pub fn resolve(&self, properties: &Properties) -> Properties {
        properties
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => self
                        .physical_id(s)
                        .map_or_else(|| value.clone(), |id| Value::String(id.to_string())),
                    _ => value.clone(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_known_reference_is_substituted() {
        let mut ctx = DeployContext::new();
        ctx.record("MyProduct", "prod_X");

        let resolved = ctx.resolve(&bag(json!({ "product": "MyProduct", "currency": "usd" })));

        assert_eq!(resolved["product"], json!("prod_X"));
        assert_eq!(resolved["currency"], json!("usd"));
    }

    #[test]
    fn test_unknown_and_nested_values_untouched() {
        let mut ctx = DeployContext::new();
        ctx.record("MyProduct", "prod_X");

        let original = bag(json!({
            "product": "OtherProduct",
            "metadata": { "parent": "MyProduct" },
            "tiers": ["MyProduct"]
        }));

        assert_eq!(ctx.resolve(&original), original);
    }

    #[test]
    fn test_remote_product_detection() {
        let mut ctx = DeployContext::new();
        ctx.record("Custom", "widget-pro");

        assert!(ctx.names_remote_product(&bag(json!({ "product": "prod_123" }))));
        assert!(ctx.names_remote_product(&ctx.resolve(&bag(json!({ "product": "Custom" })))));
        assert!(!ctx.names_remote_product(&bag(json!({ "product": "MyProduct" }))));
        assert!(!ctx.names_remote_product(&bag(json!({ "currency": "usd" }))));
    }

    #[test]
    fn test_fresh_context_is_empty() {
        assert!(DeployContext::new().physical_id("MyProduct").is_none());
    }
}
