//! Locating the remote object behind a manifest entry.
//!
//! Products and prices are tracked by identity tags in their metadata, with
//! the state store as a fast path. Coupons use their logical id as the remote
//! id. Entitlement features and meters are matched by their business key.

use serde_json::Value;
use tracing::{debug, warn};

use crate::construct::{ResourceKind, ResourceManifestEntry};
use crate::error::Result;
use crate::state::StateStore;
use crate::stripe::{remote_id, BillingProvider, RemoteObject};

/// Metadata tag carrying the logical id.
pub const LOGICAL_ID_TAG: &str = "billstack_logical_id";

/// Metadata tag carrying the construct path.
pub const PATH_TAG: &str = "billstack_path";

/// Logical id tag written by earlier releases. Matched, never written.
pub const LEGACY_LOGICAL_ID_TAG: &str = "billstack_id";

/// Page size used when matching by business key.
pub const LIST_PAGE_SIZE: u32 = 100;

/// Escapes a value for embedding in a double-quoted search term.
///
/// Backslashes are escaped first so the backslash added for a quote is not
/// escaped again.
#[must_use]
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Reverses [`escape_query_value`].
#[must_use]
pub fn unescape_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Search query matching the current or the legacy logical id tag.
#[must_use]
pub fn logical_id_query(logical_id: &str) -> String {
    let value = escape_query_value(logical_id);
    format!(
        "metadata[\"{LOGICAL_ID_TAG}\"]:\"{value}\" OR metadata[\"{LEGACY_LOGICAL_ID_TAG}\"]:\"{value}\""
    )
}

/// Business key field for kinds identified by one.
#[must_use]
pub const fn business_key(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::EntitlementFeature => Some("lookup_key"),
        ResourceKind::BillingMeter => Some("event_name"),
        _ => None,
    }
}

/// Returns false for objects the provider reports as inactive or deleted.
#[must_use]
pub fn is_active(object: &RemoteObject) -> bool {
    if object.get("deleted").and_then(Value::as_bool) == Some(true) {
        return false;
    }
    if let Some(active) = object.get("active").and_then(Value::as_bool) {
        return active;
    }
    object
        .get("status")
        .and_then(Value::as_str)
        .is_none_or(|status| status == "active")
}

/// Finds remote objects for the entries of one stack.
pub struct Resolver<'a> {
    provider: &'a dyn BillingProvider,
    state: &'a StateStore,
    stack_id: &'a str,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(provider: &'a dyn BillingProvider, state: &'a StateStore, stack_id: &'a str) -> Self {
        Self {
            provider,
            state,
            stack_id,
        }
    }

    /// Locates the remote object for `entry`.
    ///
    /// Returns `Ok(None)` when nothing matches. Stale ids (not found) fall
    /// through to the next lookup strategy.
    ///
    /// # Errors
    ///
    /// Any remote error other than "not found" is returned unchanged.
    pub async fn find_existing(&self, entry: &ResourceManifestEntry) -> Result<Option<RemoteObject>> {
        match entry.kind {
            ResourceKind::Coupon => {
                let id = entry.physical_id.as_deref().unwrap_or(&entry.id);
                self.retrieve_optional(entry.kind, id).await
            }
            ResourceKind::EntitlementFeature | ResourceKind::BillingMeter => {
                self.find_by_business_key(entry).await
            }
            ResourceKind::Product | ResourceKind::Price => self.find_tagged(entry).await,
        }
    }

    /// Retrieves by id, mapping "not found" to `None`.
    async fn retrieve_optional(&self, kind: ResourceKind, id: &str) -> Result<Option<RemoteObject>> {
        match self.provider.retrieve(kind, id).await {
            Ok(object) if object.get("deleted").and_then(Value::as_bool) == Some(true) => Ok(None),
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Known ids in priority order: imported id, then the tracked id.
    fn known_ids(&self, entry: &ResourceManifestEntry) -> Vec<String> {
        let mut ids: Vec<String> = entry.physical_id.iter().cloned().collect();
        if let Some(state) = self.state.get_resource(self.stack_id, &entry.id)
            && !state.physical_id.is_empty()
            && !ids.contains(&state.physical_id)
        {
            ids.push(state.physical_id.clone());
        }
        ids
    }

    async fn retrieve_known(&self, entry: &ResourceManifestEntry) -> Result<Option<RemoteObject>> {
        for id in self.known_ids(entry) {
            if let Some(object) = self.retrieve_optional(entry.kind, &id).await? {
                debug!("Found {} {} by id {id}", entry.kind, entry.id);
                return Ok(Some(object));
            }
            warn!("Tracked id {id} for {} no longer exists; ignoring it", entry.id);
        }
        Ok(None)
    }

    async fn find_tagged(&self, entry: &ResourceManifestEntry) -> Result<Option<RemoteObject>> {
        if let Some(object) = self.retrieve_known(entry).await? {
            return Ok(Some(object));
        }

        debug!("Searching {} by tag for {}", entry.kind, entry.id);
        let results = self
            .provider
            .search(entry.kind, &logical_id_query(&entry.id))
            .await?;

        Ok(pick_preferred(results))
    }

    async fn find_by_business_key(&self, entry: &ResourceManifestEntry) -> Result<Option<RemoteObject>> {
        if let Some(object) = self.retrieve_known(entry).await? {
            return Ok(Some(object));
        }

        let Some(field) = business_key(entry.kind) else {
            return Ok(None);
        };
        let Some(key) = entry.properties.get(field) else {
            return Ok(None);
        };

        debug!("Listing {} to match {field}={key}", entry.kind);
        let candidates: Vec<RemoteObject> = self
            .provider
            .list(entry.kind, LIST_PAGE_SIZE)
            .await?
            .into_iter()
            .filter(|object| object.get(field) == Some(key))
            .collect();

        Ok(pick_preferred(candidates))
    }
}

/// First active candidate, else the first candidate.
fn pick_preferred(candidates: Vec<RemoteObject>) -> Option<RemoteObject> {
    let index = candidates.iter().position(is_active).unwrap_or(0);
    candidates.into_iter().nth(index).filter(|o| remote_id(o).is_some())
}
