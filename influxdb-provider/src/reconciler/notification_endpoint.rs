//! Notification endpoint reconciler.
//!
//! Create sends a fixed shape: status `active`, method `POST` and auth method
//! `none`, whatever the declaration says. Update forwards declared status,
//! method and auth method. Credentials, headers and description are accepted
//! but never sent; a warning names every such declared field.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Operation, ReadOutcome, Reconciler, non_empty, require_id, resolve_org};
use crate::clients::ApiRequest;
use crate::context::ConnectionContext;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::schema::{Attribute, AttributeType, Schema};

const ENDPOINTS_PATH: &str = "/api/v2/notificationEndpoints";
const DEFAULT_STATUS: &str = "active";
const DEFAULT_METHOD: &str = "POST";
const DEFAULT_AUTH_METHOD: &str = "none";

/// Stored notification endpoint state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointState {
    pub id: Option<String>,
    pub name: String,
    pub org: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    /// Endpoint kind: `http`, `slack`, `pagerduty`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub method: Option<String>,
    pub auth_method: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointPayload {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    status: String,
    method: String,
    auth_method: String,
    #[serde(rename = "orgID")]
    org_id: String,
}

impl EndpointPayload {
    fn new(desired: &EndpointState, org_id: String) -> Self {
        Self {
            name: desired.name.clone(),
            kind: desired.kind.clone(),
            url: desired.url.clone(),
            status: DEFAULT_STATUS.to_string(),
            method: DEFAULT_METHOD.to_string(),
            auth_method: DEFAULT_AUTH_METHOD.to_string(),
            org_id,
        }
    }

    /// Like `new`, with declared status, method and auth method applied.
    fn with_overrides(desired: &EndpointState, org_id: String) -> Self {
        let mut payload = Self::new(desired, org_id);
        if let Some(status) = non_empty(&desired.status) {
            payload.status = status.to_string();
        }
        if let Some(method) = non_empty(&desired.method) {
            payload.method = method.to_string();
        }
        if let Some(auth_method) = non_empty(&desired.auth_method) {
            payload.auth_method = auth_method.to_string();
        }
        payload
    }
}

/// Endpoint as returned by the API. Secrets are never decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    method: String,
    #[serde(alias = "auth_method", default)]
    auth_method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl EndpointState {
    fn apply_status(&mut self, endpoint: &EndpointRecord) {
        self.status = Some(endpoint.status.clone());
        self.method = Some(endpoint.method.clone());
        self.auth_method = Some(endpoint.auth_method.clone());
    }
}

/// Declared fields the given stage does not send to InfluxDB.
pub fn untransmitted_fields(operation: Operation, desired: &EndpointState) -> Vec<&'static str> {
    let mut fields = Vec::new();
    let declared = |value: &Option<String>| non_empty(value).is_some();

    if declared(&desired.description) {
        fields.push("description");
    }
    if declared(&desired.token) {
        fields.push("token");
    }
    if declared(&desired.username) {
        fields.push("username");
    }
    if declared(&desired.password) {
        fields.push("password");
    }
    if desired.headers.as_ref().is_some_and(|h| !h.is_empty()) {
        fields.push("headers");
    }
    if operation == Operation::Create {
        if declared(&desired.status) {
            fields.push("status");
        }
        if declared(&desired.method) {
            fields.push("method");
        }
        if declared(&desired.auth_method) {
            fields.push("auth_method");
        }
    }
    fields
}

fn endpoint_path(id: &str) -> String {
    format!("{ENDPOINTS_PATH}/{id}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationEndpointReconciler;

#[async_trait]
impl Reconciler for NotificationEndpointReconciler {
    type State = EndpointState;

    const TYPE_SUFFIX: &'static str = "notification_endpoint";

    fn schema(&self) -> Schema {
        Schema::new(
            "InfluxDB notification endpoint",
            vec![
                Attribute::computed("id", AttributeType::String, "Notification endpoint ID"),
                Attribute::required("name", AttributeType::String, "Endpoint name"),
                Attribute::optional_computed(
                    "org",
                    AttributeType::String,
                    "Organization name or ID. If not provided, uses the provider default.",
                ),
                Attribute::optional("description", AttributeType::String, "Endpoint description"),
                Attribute::optional_computed(
                    "status",
                    AttributeType::String,
                    "Endpoint status (active or inactive)",
                ),
                Attribute::required(
                    "type",
                    AttributeType::String,
                    "Endpoint type (http, slack, pagerduty, ...)",
                ),
                Attribute::required("url", AttributeType::String, "Endpoint URL"),
                Attribute::optional("token", AttributeType::String, "Bearer token").sensitive(),
                Attribute::optional("username", AttributeType::String, "Basic auth username"),
                Attribute::optional("password", AttributeType::String, "Basic auth password")
                    .sensitive(),
                Attribute::optional_computed(
                    "method",
                    AttributeType::String,
                    "HTTP method. Defaults to POST.",
                ),
                Attribute::optional_computed(
                    "auth_method",
                    AttributeType::String,
                    "Auth method (none, basic, bearer). Defaults to none.",
                ),
                Attribute::optional("headers", AttributeType::StringMap, "Custom HTTP headers"),
            ],
        )
    }

    fn warnings(&self, operation: Operation, desired: &EndpointState) -> Vec<Diagnostic> {
        if !matches!(operation, Operation::Create | Operation::Update) {
            return Vec::new();
        }
        let fields = untransmitted_fields(operation, desired);
        if fields.is_empty() {
            return Vec::new();
        }
        vec![Diagnostic::warning(
            format!("{operation} - Fields Not Sent"),
            format!(
                "The notification endpoint is {} without these declared fields: {}",
                if operation == Operation::Create { "created" } else { "updated" },
                fields.join(", ")
            ),
        )]
    }

    async fn create(&self, ctx: &ConnectionContext, desired: &EndpointState) -> Result<EndpointState> {
        let (org_ref, org) = resolve_org(ctx, &desired.org).await?;

        let payload = EndpointPayload::new(desired, org.id);
        let endpoint: EndpointRecord = ctx
            .send(ApiRequest::post(ENDPOINTS_PATH).json(&payload)?)
            .await?
            .expect(&[StatusCode::CREATED])?
            .json()?;
        info!("Created notification endpoint {} ({})", endpoint.name, endpoint.id);

        let mut state = desired.clone();
        state.id = Some(endpoint.id.clone());
        state.org = Some(org_ref);
        state.apply_status(&endpoint);
        Ok(state)
    }

    async fn read(
        &self,
        ctx: &ConnectionContext,
        stored: &EndpointState,
    ) -> Result<ReadOutcome<EndpointState>> {
        let id = require_id("notification endpoint", &stored.id)?;
        let response = ctx.send(ApiRequest::get(endpoint_path(id))).await?;
        if response.is_not_found() {
            warn!("Notification endpoint {} not found, removing from state", id);
            return Ok(ReadOutcome::Gone);
        }
        let endpoint: EndpointRecord = response.expect(&[StatusCode::OK])?.json()?;

        let mut state = stored.clone();
        state.name = endpoint.name;
        if endpoint.description.is_some() {
            state.description = endpoint.description;
        }
        state.status = Some(endpoint.status);
        state.kind = endpoint.kind;
        state.url = endpoint.url;
        state.method = Some(endpoint.method);
        if !endpoint.auth_method.is_empty() {
            state.auth_method = Some(endpoint.auth_method);
        }
        if !endpoint.headers.is_empty() {
            state.headers = Some(endpoint.headers);
        }
        Ok(ReadOutcome::Found(state))
    }

    async fn update(
        &self,
        ctx: &ConnectionContext,
        desired: &EndpointState,
        stored: &EndpointState,
    ) -> Result<EndpointState> {
        let id = require_id("notification endpoint", &stored.id)?;
        let (org_ref, org) = resolve_org(ctx, &desired.org).await?;

        let payload = EndpointPayload::with_overrides(desired, org.id);
        let endpoint: EndpointRecord = ctx
            .send(ApiRequest::patch(endpoint_path(id)).json(&payload)?)
            .await?
            .expect(&[StatusCode::OK])?
            .json()?;
        info!("Updated notification endpoint {} ({})", endpoint.name, id);

        let mut state = desired.clone();
        state.id = stored.id.clone();
        state.org = Some(org_ref);
        state.apply_status(&endpoint);
        Ok(state)
    }

    async fn delete(&self, ctx: &ConnectionContext, stored: &EndpointState) -> Result<()> {
        let id = require_id("notification endpoint", &stored.id)?;
        let response = ctx
            .send(ApiRequest::delete(endpoint_path(id)))
            .await?
            .expect(&[StatusCode::NO_CONTENT, StatusCode::NOT_FOUND])?;
        if response.is_not_found() {
            info!("Notification endpoint {} already gone", id);
        } else {
            info!("Deleted notification endpoint {}", id);
        }
        Ok(())
    }

    fn import(&self, id: &str) -> EndpointState {
        EndpointState {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn desired() -> EndpointState {
        EndpointState {
            name: "ops".to_string(),
            kind: "http".to_string(),
            url: "https://hooks.example.com/alert".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_payload_is_fixed() {
        let declared = EndpointState {
            status: Some("inactive".to_string()),
            method: Some("PUT".to_string()),
            ..desired()
        };
        let payload = serde_json::to_value(EndpointPayload::new(&declared, "o1".to_string())).unwrap();
        assert_eq!(
            payload,
            json!({
                "name": "ops",
                "type": "http",
                "url": "https://hooks.example.com/alert",
                "status": "active",
                "method": "POST",
                "authMethod": "none",
                "orgID": "o1"
            })
        );
    }

    #[test]
    fn test_update_payload_forwards_overrides() {
        let declared = EndpointState {
            status: Some("inactive".to_string()),
            auth_method: Some("bearer".to_string()),
            token: Some("secret".to_string()),
            ..desired()
        };
        let payload =
            serde_json::to_value(EndpointPayload::with_overrides(&declared, "o1".to_string())).unwrap();
        assert_eq!(payload["status"], "inactive");
        assert_eq!(payload["method"], "POST");
        assert_eq!(payload["authMethod"], "bearer");
        assert!(payload.get("token").is_none());
    }

    #[test]
    fn test_untransmitted_fields_per_stage() {
        let declared = EndpointState {
            token: Some("secret".to_string()),
            method: Some("PUT".to_string()),
            headers: Some(BTreeMap::from([("X-A".to_string(), "1".to_string())])),
            ..desired()
        };
        assert_eq!(
            untransmitted_fields(Operation::Create, &declared),
            vec!["token", "headers", "method"]
        );
        assert_eq!(
            untransmitted_fields(Operation::Update, &declared),
            vec!["token", "headers"]
        );
    }

    #[test]
    fn test_no_warning_for_plain_endpoint() {
        let reconciler = NotificationEndpointReconciler;
        assert!(reconciler.warnings(Operation::Create, &desired()).is_empty());
        assert!(reconciler.warnings(Operation::Read, &desired()).is_empty());
    }

    #[test]
    fn test_record_accepts_both_auth_method_spellings() {
        let record: EndpointRecord =
            serde_json::from_str(r#"{"id":"e1","auth_method":"basic"}"#).unwrap();
        assert_eq!(record.auth_method, "basic");
        let record: EndpointRecord =
            serde_json::from_str(r#"{"id":"e1","authMethod":"bearer"}"#).unwrap();
        assert_eq!(record.auth_method, "bearer");
    }
}
