//! Remote capability surface consumed by the reconciler.

use async_trait::async_trait;
use serde_json::Value;

use crate::construct::{Properties, ResourceKind};
use crate::error::Result;

/// A remote object as returned by the provider. Always carries an `id`.
pub type RemoteObject = Value;

/// Returns the `id` of a remote object.
#[must_use]
pub fn remote_id(object: &RemoteObject) -> Option<&str> {
    object.get("id").and_then(Value::as_str)
}

/// Per-kind remote operations.
///
/// Every operation either returns the remote object or fails. A missing
/// object is always reported as [`crate::error::ProviderError::NotFound`] so
/// callers can branch on it without inspecting messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Fetches an object by remote id.
    async fn retrieve(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject>;

    /// Creates an object.
    async fn create(&self, kind: ResourceKind, params: &Properties) -> Result<RemoteObject>;

    /// Updates an object in place.
    async fn update(&self, kind: ResourceKind, id: &str, params: &Properties) -> Result<RemoteObject>;

    /// Hard-deletes an object.
    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()>;

    /// Deactivates an object that cannot be deleted.
    async fn deactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject>;

    /// Makes a deactivated object usable again.
    async fn reactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject>;

    /// Searches objects with a provider query expression.
    async fn search(&self, kind: ResourceKind, query: &str) -> Result<Vec<RemoteObject>>;

    /// Lists up to `limit` objects.
    async fn list(&self, kind: ResourceKind, limit: u32) -> Result<Vec<RemoteObject>>;
}

#[async_trait]
impl BillingProvider for Box<dyn BillingProvider> {
    async fn retrieve(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        (**self).retrieve(kind, id).await
    }

    async fn create(&self, kind: ResourceKind, params: &Properties) -> Result<RemoteObject> {
        (**self).create(kind, params).await
    }

    async fn update(&self, kind: ResourceKind, id: &str, params: &Properties) -> Result<RemoteObject> {
        (**self).update(kind, id, params).await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        (**self).delete(kind, id).await
    }

    async fn deactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        (**self).deactivate(kind, id).await
    }

    async fn reactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        (**self).reactivate(kind, id).await
    }

    async fn search(&self, kind: ResourceKind, query: &str) -> Result<Vec<RemoteObject>> {
        (**self).search(kind, query).await
    }

    async fn list(&self, kind: ResourceKind, limit: u32) -> Result<Vec<RemoteObject>> {
        (**self).list(kind, limit).await
    }
}
