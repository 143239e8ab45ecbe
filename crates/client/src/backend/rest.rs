//! PostgREST-style HTTP backend.
//!
//! ### Conventions
//!
//! - **Endpoint**: `{base_url}/rest/v1/{table}`
//! - **Filters**: one `column=eq.value` query pair per filter
//! - **Authentication**: `apikey` header plus a bearer token when an API key is configured
//! - **Writes**: `Prefer: return=minimal`, so only the status is read back

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use roamsync_core::AppConfig;

use super::{BackendError, Filter, RemoteBackend};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "roamsync/0.1";

/// REST backend configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project base URL, without the `/rest/v1` suffix.
    pub base_url: String,
    /// Key sent as `apikey` and as bearer token.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self { base_url: String::new(), api_key: None, timeout: DEFAULT_TIMEOUT, user_agent: DEFAULT_USER_AGENT.into() }
    }
}

impl RestConfig {
    /// Build from the application config.
    ///
    /// Fails with `NotConfigured` when no backend URL is set.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, BackendError> {
        let base_url = config
            .require_backend_url()
            .map_err(|e| BackendError::NotConfigured(e.to_string()))?;
        Ok(Self {
            base_url: base_url.to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
            ..Default::default()
        })
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// HTTP client for a PostgREST-compatible backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base: Url,
    config: RestConfig,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Result<Self, BackendError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .and_then(|u| u.join("rest/v1/"))
            .map_err(|e| BackendError::NotConfigured(format!("invalid backend URL {:?}: {e}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { http, base, config })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(RestConfig::from_app_config(config)?)
    }

    /// URL for a table with equality filters and optional extra query pairs.
    fn table_url(&self, table: &str, filters: &[Filter], extra: &[(&str, String)]) -> Result<Url, BackendError> {
        let mut url = self
            .base
            .join(table)
            .map_err(|e| BackendError::NotConfigured(format!("invalid table name {table:?}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in extra {
                pairs.append_pair(key, value);
            }
            for filter in filters {
                pairs.append_pair(&filter.column, &format!("eq.{}", filter.value));
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url).header(header::ACCEPT, "application/json");
        if let Some(key) = &self.config.api_key {
            req = req.header("apikey", key).bearer_auth(key);
        }
        req
    }

    /// Send a request and turn a non-success status into a `BackendError`.
    async fn send(&self, table: &str, req: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = req.send().await?;
        let status = response.status();
        tracing::debug!(table, %status, "backend response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.message.unwrap_or(body);
        Err(BackendError::from_response(table, status.as_u16(), parsed.code, message))
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn insert(&self, table: &str, row: Value) -> Result<(), BackendError> {
        let url = self.table_url(table, &[], &[])?;
        let req = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(&row);
        self.send(table, req).await?;
        Ok(())
    }

    async fn update(&self, table: &str, filters: &[Filter], changes: Value) -> Result<(), BackendError> {
        let url = self.table_url(table, filters, &[])?;
        let req = self
            .request(reqwest::Method::PATCH, url)
            .header("Prefer", "return=minimal")
            .json(&changes);
        self.send(table, req).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError> {
        let url = self.table_url(table, filters, &[])?;
        let req = self
            .request(reqwest::Method::DELETE, url)
            .header("Prefer", "return=minimal");
        self.send(table, req).await?;
        Ok(())
    }

    async fn select(
        &self, table: &str, filters: &[Filter], order_by: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut extra = vec![("select", "*".to_string())];
        if let Some(column) = order_by {
            extra.push(("order", format!("{column}.asc")));
        }
        let url = self.table_url(table, filters, &extra)?;
        let response = self.send(table, self.request(reqwest::Method::GET, url)).await?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Parse(e.to_string()))
    }
}
