//! Stripe API client implementation.
//!
//! Requests are form-encoded with bracketed nesting, responses are JSON.

use reqwest::{header, Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

use async_trait::async_trait;

use crate::construct::{Properties, ResourceKind};
use crate::error::{BillstackError, ProviderError, Result};

use super::provider::{BillingProvider, RemoteObject};

/// Stripe API base URL.
pub const STRIPE_API_URL: &str = "https://api.stripe.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Remote error code for a missing object.
const RESOURCE_MISSING: &str = "resource_missing";

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    /// HTTP client.
    client: Client,
    /// Secret API key.
    api_key: String,
    /// API base URL, without trailing slash.
    base_url: String,
    /// `Stripe-Version` pin.
    api_version: Option<String>,
    /// Base delay between retries.
    retry_delay: Duration,
}

impl fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

/// Error envelope returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// List and search envelope.
#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Vec<Value>,
}

/// One HTTP call, with the context needed to map a "not found" error.
struct ApiCall<'a> {
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    kind: ResourceKind,
    target: &'a str,
}

impl StripeClient {
    /// Creates a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: STRIPE_API_URL.to_string(),
            api_version: None,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Points the client at another API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pins the API version sent with every request.
    #[must_use]
    pub fn with_api_version(mut self, api_version: Option<String>) -> Self {
        self.api_version = api_version;
        self
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    const fn endpoint(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Product => "/v1/products",
            ResourceKind::Price => "/v1/prices",
            ResourceKind::Coupon => "/v1/coupons",
            ResourceKind::EntitlementFeature => "/v1/entitlements/features",
            ResourceKind::BillingMeter => "/v1/billing/meters",
        }
    }

    /// Extra parameters for reads; tiers are only returned when expanded.
    fn read_params(kind: ResourceKind) -> Vec<(String, String)> {
        if kind == ResourceKind::Price {
            vec![(String::from("expand[]"), String::from("tiers"))]
        } else {
            Vec::new()
        }
    }

    fn object_path(kind: ResourceKind, id: &str) -> String {
        format!("{}/{}", Self::endpoint(kind), id)
    }

    /// Flips the active flag. Meters use dedicated action endpoints.
    async fn set_active(&self, kind: ResourceKind, id: &str, active: bool) -> Result<Value> {
        let operation = if active { "reactivate" } else { "deactivate" };
        match kind {
            ResourceKind::Product | ResourceKind::Price | ResourceKind::EntitlementFeature => {
                let mut params = Properties::new();
                params.insert(String::from("active"), Value::Bool(active));
                self.update(kind, id, &params).await
            }
            ResourceKind::BillingMeter => {
                self.execute(&ApiCall {
                    method: Method::POST,
                    path: format!("{}/{operation}", Self::object_path(kind, id)),
                    params: Vec::new(),
                    kind,
                    target: id,
                })
                .await
            }
            ResourceKind::Coupon => Err(ProviderError::Unsupported { operation, kind }.into()),
        }
    }

    /// Executes a call, retrying transient failures.
    async fn execute(&self, call: &ApiCall<'_>) -> Result<Value> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.execute_once(call).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::network("Max retries exceeded").into()))
    }

    /// Executes a single HTTP request.
    async fn execute_once(&self, call: &ApiCall<'_>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, call.path);
        trace!("{} {url}", call.method);

        let mut request = self
            .client
            .request(call.method.clone(), &url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key));

        if let Some(version) = &self.api_version {
            request = request.header("Stripe-Version", version);
        }

        request = if call.method == Method::POST {
            request.form(&call.params)
        } else {
            request.query(&call.params)
        };

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthenticationFailed {
                message: String::from("Invalid API key"),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error(status.as_u16(), &body, call));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("Failed to parse response: {e}")).into())
    }

    /// Maps an error body; `resource_missing` is selected by code alone.
    fn map_error(status: u16, body: &str, call: &ApiCall<'_>) -> BillstackError {
        let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
            return ProviderError::api_error(status, None, body).into();
        };
        let message = envelope.error.message.unwrap_or_default();

        match envelope.error.code {
            Some(code) if code == RESOURCE_MISSING => ProviderError::NotFound {
                kind: call.kind,
                id: call.target.to_string(),
                code,
            }
            .into(),
            code => ProviderError::api_error(status, code, message).into(),
        }
    }

    async fn fetch_list(
        &self,
        kind: ResourceKind,
        path: String,
        mut params: Vec<(String, String)>,
    ) -> Result<Vec<RemoteObject>> {
        params.extend(
            Self::read_params(kind)
                .into_iter()
                .map(|(k, v)| (k, format!("data.{v}"))),
        );
        let value = self
            .execute(&ApiCall {
                method: Method::GET,
                path,
                params,
                kind,
                target: "",
            })
            .await?;
        let envelope: ListEnvelope = serde_json::from_value(value)
            .map_err(|e| ProviderError::invalid_response(format!("Invalid list response: {e}")))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn retrieve(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        self.execute(&ApiCall {
            method: Method::GET,
            path: Self::object_path(kind, id),
            params: Self::read_params(kind),
            kind,
            target: id,
        })
        .await
    }

    async fn create(&self, kind: ResourceKind, params: &Properties) -> Result<RemoteObject> {
        debug!("Creating {kind}");
        self.execute(&ApiCall {
            method: Method::POST,
            path: Self::endpoint(kind).to_string(),
            params: encode_form(params),
            kind,
            target: "",
        })
        .await
    }

    async fn update(&self, kind: ResourceKind, id: &str, params: &Properties) -> Result<RemoteObject> {
        debug!("Updating {kind} {id}");
        self.execute(&ApiCall {
            method: Method::POST,
            path: Self::object_path(kind, id),
            params: encode_form(params),
            kind,
            target: id,
        })
        .await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        match kind {
            ResourceKind::Product | ResourceKind::Coupon => {
                self.execute(&ApiCall {
                    method: Method::DELETE,
                    path: Self::object_path(kind, id),
                    params: Vec::new(),
                    kind,
                    target: id,
                })
                .await?;
                Ok(())
            }
            _ => Err(ProviderError::Unsupported {
                operation: "delete",
                kind,
            }
            .into()),
        }
    }

    async fn deactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        self.set_active(kind, id, false).await
    }

    async fn reactivate(&self, kind: ResourceKind, id: &str) -> Result<RemoteObject> {
        self.set_active(kind, id, true).await
    }

    async fn search(&self, kind: ResourceKind, query: &str) -> Result<Vec<RemoteObject>> {
        match kind {
            ResourceKind::Product | ResourceKind::Price => {
                let params = vec![(String::from("query"), query.to_string())];
                self.fetch_list(kind, format!("{}/search", Self::endpoint(kind)), params)
                    .await
            }
            _ => Err(ProviderError::Unsupported {
                operation: "search",
                kind,
            }
            .into()),
        }
    }

    async fn list(&self, kind: ResourceKind, limit: u32) -> Result<Vec<RemoteObject>> {
        let params = vec![(String::from("limit"), limit.to_string())];
        self.fetch_list(kind, Self::endpoint(kind).to_string(), params)
            .await
    }
}

/// Flattens a property bag into form pairs with bracketed nesting.
///
/// `{"metadata": {"k": "v"}}` becomes `metadata[k]=v` and
/// `{"tiers": [{"up_to": "inf"}]}` becomes `tiers[0][up_to]=inf`. Nulls are
/// sent as empty strings, which the API reads as "unset".
#[must_use]
pub fn encode_form(params: &Properties) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        encode_value(key.clone(), value, &mut pairs);
    }
    pairs
}

fn encode_value(key: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (sub, nested) in map {
                encode_value(format!("{key}[{sub}]"), nested, pairs);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                encode_value(format!("{key}[{index}]"), nested, pairs);
            }
        }
        Value::String(s) => pairs.push((key, s.clone())),
        Value::Null => pairs.push((key, String::new())),
        Value::Bool(b) => pairs.push((key, b.to_string())),
        Value::Number(n) => pairs.push((key, n.to_string())),
    }
}
