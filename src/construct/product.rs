//! Product resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

use super::resource::{require_non_empty, Properties, PropertyBag};

/// Properties of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductProps {
    /// Display name.
    pub name: String,
    /// Whether the product is available for purchase. Defaults to true.
    pub active: Option<bool>,
    /// Long-form description.
    pub description: Option<String>,
    /// Image URLs.
    pub images: Option<Vec<String>>,
    /// Public product page.
    pub url: Option<String>,
    /// Label for units on invoices (e.g. "seat").
    pub unit_label: Option<String>,
    /// Statement descriptor.
    pub statement_descriptor: Option<String>,
    /// Tax code id.
    pub tax_code: Option<String>,
    /// User metadata.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ProductProps {
    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        require_non_empty(path, "name", &self.name)
    }

    pub(crate) fn to_properties(&self) -> Properties {
        let mut bag = PropertyBag::new();
        bag.insert("name", self.name.clone())
            .insert("active", self.active.unwrap_or(true))
            .insert_opt("description", self.description.clone())
            .insert_opt("images", self.images.clone())
            .insert_opt("url", self.url.clone())
            .insert_opt("unit_label", self.unit_label.clone())
            .insert_opt("statement_descriptor", self.statement_descriptor.clone())
            .insert_opt("tax_code", self.tax_code.clone())
            .insert_metadata(self.metadata.as_ref());
        bag.build()
    }
}
