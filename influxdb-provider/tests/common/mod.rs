//! Shared test utilities for influxdb-provider integration tests.
//!
//! Each test gets its own mock InfluxDB management API with organization
//! and current-user lookups already mounted, plus a provider configured
//! against it.

#![allow(dead_code)]

use influxdb_provider::{Diagnostics, Provider, ProviderConfig};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const ORG_ID: &str = "0123456789abcdef";
pub const ORG_NAME: &str = "org1";
pub const USER_ID: &str = "0a0a0a0a0a0a0a0a";
pub const TOKEN: &str = "test-token";

/// Mock InfluxDB server plus a provider pointed at it.
pub struct TestServer {
    pub server: MockServer,
    pub provider: Provider,
}

impl TestServer {
    /// Spawn a mock server and a provider without a default organization.
    pub async fn spawn() -> Self {
        Self::spawn_with_default_org(None).await
    }

    /// Spawn a mock server and a provider with the given default organization.
    pub async fn spawn_with_default_org(org: Option<&str>) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/orgs"))
            .and(query_param("org", ORG_NAME))
            .and(header("Authorization", format!("Token {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "orgs": [{"id": ORG_ID, "name": ORG_NAME}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/api/v2/orgs/{ORG_ID}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": ORG_ID, "name": ORG_NAME})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v2/me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID, "name": "admin"})),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            token: Some(TOKEN.to_string()),
            org: org.map(str::to_string),
            bucket: None,
        };
        let mut provider = Provider::new();
        let diagnostics = provider.configure_with(&config, |_| None);
        assert!(diagnostics.is_empty(), "configure failed: {:?}", diagnostics);

        Self { server, provider }
    }

    /// All requests the mock server received.
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Requests with the given method and path.
    pub async fn requests_to(&self, http_method: &str, request_path: &str) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == request_path)
            .collect()
    }

    /// Requests other than lookups: anything that is not a GET.
    pub async fn mutations(&self) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.as_str() != "GET")
            .collect()
    }

    /// JSON body of the only request with the given method and path.
    pub async fn body_of(&self, http_method: &str, request_path: &str) -> Value {
        let requests = self.requests_to(http_method, request_path).await;
        assert_eq!(
            requests.len(),
            1,
            "expected one {} {}",
            http_method,
            request_path
        );
        requests[0].body_json().expect("request body is not JSON")
    }
}

/// Summaries of the error diagnostics.
pub fn error_summaries(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics.errors().map(|d| d.summary.clone()).collect()
}

/// Summaries of the warning diagnostics.
pub fn warning_summaries(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics.warnings().map(|d| d.summary.clone()).collect()
}
