//! Connection context shared read-only by every resource.

use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::clients::{ApiRequest, ApiResponse, BucketsApi, OrganizationsApi, TasksApi, UsersApi};
use crate::config::ConnectionSettings;
use crate::error::{ProviderError, Result};

const JSON: &str = "application/json";

/// Resolved endpoint, credentials and defaults plus the HTTP client used to
/// reach the InfluxDB management API.
#[derive(Debug)]
pub struct ConnectionContext {
    settings: ConnectionSettings,
    base_url: Url,
    http: reqwest::Client,
}

impl ConnectionContext {
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.url).map_err(|e| {
            ProviderError::validation(format!("invalid InfluxDB URL '{}': {}", settings.url, e))
        })?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("influxdb-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            settings,
            base_url,
            http,
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn default_org(&self) -> Option<&str> {
        self.settings.org.as_deref()
    }

    pub fn organizations(&self) -> OrganizationsApi<'_> {
        OrganizationsApi::new(self)
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }

    pub fn buckets(&self) -> BucketsApi<'_> {
        BucketsApi::new(self)
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(self)
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}{}", base, request.path)).map_err(|e| {
            ProviderError::validation(format!("invalid API path '{}': {}", request.path, e))
        })?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Perform `request` with token auth and JSON headers. Any answered
    /// status is returned; only transport failures are errors.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request)?;
        debug!(method = %request.method, path = %request.path, "InfluxDB API request");

        let mut builder = self
            .http
            .request(request.method, url)
            .header(AUTHORIZATION, format!("Token {}", self.settings.token))
            .header(ACCEPT, JSON);
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, JSON).body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "InfluxDB API response");

        Ok(ApiResponse { status, body })
    }

    /// Perform `request`, require a 2xx status and decode the JSON body.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.success()?.json()
    }

    /// Perform `request` and require a 2xx status, ignoring the body.
    pub async fn execute(&self, request: ApiRequest) -> Result<()> {
        self.send(request).await?.success().map(|_| ())
    }
}
