//! Entitlement feature resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

use super::resource::{require_non_empty, Properties, PropertyBag};

/// Properties of an entitlement feature. Identified remotely by `lookup_key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementFeatureProps {
    /// Display name.
    pub name: String,
    /// Business key, unique per account.
    pub lookup_key: String,
    /// User metadata.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl EntitlementFeatureProps {
    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        require_non_empty(path, "name", &self.name)?;
        require_non_empty(path, "lookup_key", &self.lookup_key)
    }

    pub(crate) fn to_properties(&self) -> Properties {
        let mut bag = PropertyBag::new();
        bag.insert("name", self.name.clone())
            .insert("lookup_key", self.lookup_key.clone())
            .insert_metadata(self.metadata.as_ref());
        bag.build()
    }
}
