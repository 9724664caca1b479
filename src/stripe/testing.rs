//! In-memory provider that records every call.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Mutex;

use crate::construct::{Properties, ResourceKind};
use crate::error::{ProviderError, Result};
use crate::planner::{escape_query_value, LEGACY_LOGICAL_ID_TAG, LOGICAL_ID_TAG};

use super::provider::{remote_id, BillingProvider, RemoteObject};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Retrieve(ResourceKind, String),
    Create(ResourceKind, Properties),
    Update(ResourceKind, String, Properties),
    Delete(ResourceKind, String),
    Deactivate(ResourceKind, String),
    Reactivate(ResourceKind, String),
    Search(ResourceKind, String),
    List(ResourceKind),
}

impl Call {
    /// True for calls that change remote state.
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create(..)
                | Self::Update(..)
                | Self::Delete(..)
                | Self::Deactivate(..)
                | Self::Reactivate(..)
        )
    }
}

#[derive(Default)]
struct Inner {
    objects: Vec<(ResourceKind, Value)>,
    calls: Vec<Call>,
    next_id: u32,
    failing_creates: Vec<ResourceKind>,
}

/// Fake provider backed by a list of objects.
#[derive(Default)]
pub struct FakeProvider {
    inner: Mutex<Inner>,
}

const fn id_prefix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Product => "prod",
        ResourceKind::Price => "price",
        ResourceKind::Coupon => "coupon",
        ResourceKind::EntitlementFeature => "feat",
        ResourceKind::BillingMeter => "mtr",
    }
}

fn not_found(kind: ResourceKind, id: &str) -> crate::error::BillstackError {
    ProviderError::NotFound {
        kind,
        id: id.to_string(),
        code: String::from("resource_missing"),
    }
    .into()
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("fake provider lock poisoned")
    }

    /// Seeds a remote object.
    pub fn insert(&self, kind: ResourceKind, object: Value) {
        self.lock().objects.push((kind, object));
    }

    /// Makes every create for `kind` fail.
    pub fn fail_creates(&self, kind: ResourceKind) {
        self.lock().failing_creates.push(kind);
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Mutating calls so far.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Current remote object, if any.
    pub fn object(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.lock()
            .objects
            .iter()
            .find(|(k, o)| *k == kind && remote_id(o) == Some(id))
            .map(|(_, o)| o.clone())
    }

    fn with_object<T>(
        &self,
        kind: ResourceKind,
        id: &str,
        f: impl FnOnce(&mut Vec<(ResourceKind, Value)>, usize) -> T,
    ) -> Result<T> {
        let mut inner = self.lock();
        let index = inner
            .objects
            .iter()
            .position(|(k, o)| *k == kind && remote_id(o) == Some(id))
            .ok_or_else(|| not_found(kind, id))?;
        Ok(f(&mut inner.objects, index))
    }

    fn set_active(&self, kind: ResourceKind, id: &str, active: bool) -> Result<RemoteObject> {
        self.with_object(kind, id, |objects, index| {
            let object = &mut objects[index].1;
            if let Value::Object(map) = object {
                if kind == ResourceKind::BillingMeter {
                    let status = if active { "active" } else { "inactive" };
                    map.insert(String::from("status"), Value::from(status));
                } else {
                    map.insert(String::from("active"), Value::Bool(active));
                }
            }
            object.clone()
        })
    }
}

fn merge(object: &mut Value, params: &Properties) {
    let Value::Object(target) = object else {
        return;
    };
    for (key, value) in params {
        match (key.as_str(), target.get_mut(key), value) {
            ("metadata", Some(Value::Object(existing)), Value::Object(update)) => {
                for (k, v) in update {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn tagged_with(object: &Value, query: &str) -> bool {
    [LOGICAL_ID_TAG, LEGACY_LOGICAL_ID_TAG].iter().any(|tag| {
        object
            .get("metadata")
            .and_then(|m| m.get(*tag))
            .and_then(Value::as_str)
            .is_some_and(|v| query.contains(&format!(":\"{}\"", escape_query_value(v))))
    })
}

#[async_trait]
impl BillingProvider for FakeProvider {
    async fn retrieve(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        self.lock().calls.push(Call::Retrieve(kind, id.to_string()));
        self.object(kind, id).ok_or_else(|| not_found(kind, id))
    }

    async fn create(&self, kind: ResourceKind, params: &Properties) -> Result<RemoteObject> {
        let mut inner = self.lock();
        inner.calls.push(Call::Create(kind, params.clone()));
        if inner.failing_creates.contains(&kind) {
            return Err(ProviderError::api_error(400, None, "create rejected").into());
        }

        inner.next_id += 1;
        let id = params
            .get("id")
            .and_then(Value::as_str)
            .map_or_else(|| format!("{}_{}", id_prefix(kind), inner.next_id), str::to_string);

        let mut object = Map::new();
        object.insert(String::from("id"), Value::String(id));
        if kind == ResourceKind::BillingMeter {
            object.insert(String::from("status"), Value::from("active"));
        }
        let mut object = Value::Object(object);
        let mut params = params.clone();
        params.remove("transfer_lookup_key");
        merge(&mut object, &params);

        inner.objects.push((kind, object.clone()));
        Ok(object)
    }

    async fn update(&self, kind: ResourceKind, id: &str, params: &Properties) -> Result<RemoteObject> {
        self.lock()
            .calls
            .push(Call::Update(kind, id.to_string(), params.clone()));
        self.with_object(kind, id, |objects, index| {
            merge(&mut objects[index].1, params);
            objects[index].1.clone()
        })
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        self.lock().calls.push(Call::Delete(kind, id.to_string()));
        self.with_object(kind, id, |objects, index| {
            objects.remove(index);
        })
    }

    async fn deactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        self.lock().calls.push(Call::Deactivate(kind, id.to_string()));
        self.set_active(kind, id, false)
    }

    async fn reactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        self.lock().calls.push(Call::Reactivate(kind, id.to_string()));
        self.set_active(kind, id, true)
    }

    async fn search(&self, kind: ResourceKind, query: &str) -> Result<Vec<RemoteObject>> {
        let mut inner = self.lock();
        inner.calls.push(Call::Search(kind, query.to_string()));
        Ok(inner
            .objects
            .iter()
            .filter(|(k, o)| *k == kind && tagged_with(o, query))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn list(&self, kind: ResourceKind, limit: u32) -> Result<Vec<RemoteObject>> {
        let mut inner = self.lock();
        inner.calls.push(Call::List(kind));
        Ok(inner
            .objects
            .iter()
            .filter(|(k, _)| *k == kind)
            .take(limit as usize)
            .map(|(_, o)| o.clone())
            .collect())
    }
}
