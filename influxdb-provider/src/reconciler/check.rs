//! Check reconciler.
//!
//! Checks have no typed client. Requests go straight to `/api/v2/checks`
//! through the generic JSON helper on the connection context, which fails on
//! any status outside 200-299.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ReadOutcome, Reconciler, non_empty, refresh_org, require_id, resolve_org};
use crate::clients::ApiRequest;
use crate::context::ConnectionContext;
use crate::error::Result;
use crate::schema::{Attribute, AttributeType, Schema};

const CHECKS_PATH: &str = "/api/v2/checks";
const DEFAULT_STATUS: &str = "active";
const DEFAULT_OFFSET: &str = "0s";

/// One threshold of a threshold check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Threshold {
    /// Comparison, e.g. `greater` or `lesser`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub level: String,
    pub all_values: Option<bool>,
}

/// Stored check state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckState {
    pub id: Option<String>,
    pub name: String,
    pub org: Option<String>,
    pub description: Option<String>,
    pub query: String,
    pub status: Option<String>,
    pub every: Option<String>,
    pub offset: Option<String>,
    pub status_message_template: Option<String>,
    /// Check kind, `threshold` or `deadman`.
    #[serde(rename = "type")]
    pub kind: String,
    pub thresholds: Vec<Threshold>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckQuery {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdPayload {
    #[serde(default)]
    all_values: Option<bool>,
    #[serde(default)]
    level: String,
    #[serde(default)]
    value: f64,
    #[serde(rename = "type", default)]
    kind: String,
}

impl From<&Threshold> for ThresholdPayload {
    fn from(threshold: &Threshold) -> Self {
        Self {
            all_values: Some(threshold.all_values.unwrap_or(false)),
            level: threshold.level.clone(),
            value: threshold.value,
            kind: threshold.kind.clone(),
        }
    }
}

impl From<&ThresholdPayload> for Threshold {
    fn from(threshold: &ThresholdPayload) -> Self {
        Self {
            kind: threshold.kind.clone(),
            value: threshold.value,
            level: threshold.level.clone(),
            all_values: Some(threshold.all_values.unwrap_or(false)),
        }
    }
}

/// Request body for create and update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(rename = "orgID")]
    org_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    query: CheckQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    every: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_message_template: Option<String>,
    thresholds: Vec<ThresholdPayload>,
    #[serde(rename = "type")]
    kind: String,
}

impl CheckPayload {
    /// Payload mirroring the declared document. Status and offset are only
    /// set when declared.
    fn from_state(desired: &CheckState, org_id: String) -> Self {
        Self {
            id: None,
            name: desired.name.clone(),
            org_id,
            description: desired.description.clone(),
            query: CheckQuery {
                text: desired.query.clone(),
            },
            status: non_empty(&desired.status).map(str::to_string),
            every: desired.every.clone().unwrap_or_default(),
            offset: non_empty(&desired.offset).map(str::to_string),
            status_message_template: desired.status_message_template.clone(),
            thresholds: desired.thresholds.iter().map(ThresholdPayload::from).collect(),
            kind: desired.kind.clone(),
        }
    }

    /// Payload for a new check, with status and offset defaulted.
    fn for_create(desired: &CheckState, org_id: String) -> Self {
        let mut payload = Self::from_state(desired, org_id);
        payload.status = payload.status.or_else(|| Some(DEFAULT_STATUS.to_string()));
        payload.offset = payload.offset.or_else(|| Some(DEFAULT_OFFSET.to_string()));
        payload
    }
}

/// Check as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "orgID", default)]
    org_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    query: CheckQuery,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    every: Option<String>,
    #[serde(default)]
    offset: Option<String>,
    #[serde(default)]
    status_message_template: Option<String>,
    #[serde(default)]
    thresholds: Vec<ThresholdPayload>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl CheckState {
    /// Copy every field InfluxDB reports. Org is left to the caller.
    fn refresh(&mut self, check: &CheckRecord) {
        self.id = Some(check.id.clone());
        self.name = check.name.clone();
        self.description = check.description.clone();
        self.query = check.query.text.clone();
        self.status = check.status.clone();
        self.every = check.every.clone();
        self.offset = check.offset.clone();
        self.status_message_template = check.status_message_template.clone();
        self.kind = check.kind.clone();
        self.thresholds = check.thresholds.iter().map(Threshold::from).collect();
        self.created_at = check.created_at.clone();
        self.updated_at = check.updated_at.clone();
    }
}

fn check_path(id: &str) -> String {
    format!("{CHECKS_PATH}/{id}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CheckReconciler;

#[async_trait]
impl Reconciler for CheckReconciler {
    type State = CheckState;

    const TYPE_SUFFIX: &'static str = "check";

    fn schema(&self) -> Schema {
        Schema::new(
            "InfluxDB check",
            vec![
                Attribute::computed("id", AttributeType::String, "Check ID"),
                Attribute::required("name", AttributeType::String, "Check name"),
                Attribute::optional_computed(
                    "org",
                    AttributeType::String,
                    "Organization name or ID. If not provided, uses the provider default.",
                ),
                Attribute::optional("description", AttributeType::String, "Check description"),
                Attribute::required("query", AttributeType::String, "Flux query text"),
                Attribute::optional_computed(
                    "status",
                    AttributeType::String,
                    "Check status (active or inactive). Defaults to active.",
                ),
                Attribute::required("every", AttributeType::String, "Check interval"),
                Attribute::optional_computed(
                    "offset",
                    AttributeType::String,
                    "Check offset. Defaults to 0s.",
                ),
                Attribute::optional(
                    "status_message_template",
                    AttributeType::String,
                    "Template for status messages",
                ),
                Attribute::required("type", AttributeType::String, "Check type (threshold or deadman)"),
                Attribute::list_block(
                    "thresholds",
                    "Ordered threshold rules",
                    vec![
                        Attribute::required("type", AttributeType::String, "Comparison type"),
                        Attribute::required("value", AttributeType::Float64, "Threshold value"),
                        Attribute::required("level", AttributeType::String, "Severity level"),
                        Attribute::optional_computed(
                            "all_values",
                            AttributeType::Bool,
                            "Apply to all values. Defaults to false.",
                        ),
                    ],
                ),
                Attribute::computed("created_at", AttributeType::String, "Creation timestamp"),
                Attribute::computed("updated_at", AttributeType::String, "Last update timestamp"),
            ],
        )
    }

    async fn create(&self, ctx: &ConnectionContext, desired: &CheckState) -> Result<CheckState> {
        let (org_ref, org) = resolve_org(ctx, &desired.org).await?;

        let payload = CheckPayload::for_create(desired, org.id);
        debug!(payload = ?payload, "creating check");
        let check: CheckRecord = ctx
            .request(ApiRequest::post(CHECKS_PATH).json(&payload)?)
            .await?;
        info!("Created check {} ({})", check.name, check.id);

        let mut state = CheckState {
            org: Some(org_ref),
            ..Default::default()
        };
        state.refresh(&check);
        Ok(state)
    }

    async fn read(&self, ctx: &ConnectionContext, stored: &CheckState) -> Result<ReadOutcome<CheckState>> {
        let id = require_id("check", &stored.id)?;
        let response = ctx.send(ApiRequest::get(check_path(id))).await?;
        if response.is_not_found() {
            warn!("Check {} not found, removing from state", id);
            return Ok(ReadOutcome::Gone);
        }
        let check: CheckRecord = response.success()?.json()?;

        let mut state = stored.clone();
        state.refresh(&check);
        state.org = refresh_org(ctx, &stored.org, check.org_id.as_deref()).await;
        Ok(ReadOutcome::Found(state))
    }

    async fn update(
        &self,
        ctx: &ConnectionContext,
        desired: &CheckState,
        stored: &CheckState,
    ) -> Result<CheckState> {
        let id = require_id("check", &stored.id)?;
        let (_, org) = resolve_org(ctx, &desired.org).await?;

        let mut payload = CheckPayload::from_state(desired, org.id);
        payload.id = Some(id.to_string());
        let check: CheckRecord = ctx
            .request(ApiRequest::patch(check_path(id)).json(&payload)?)
            .await?;
        info!("Updated check {} ({})", check.name, id);

        let mut state = desired.clone();
        state.refresh(&check);
        Ok(state)
    }

    async fn delete(&self, ctx: &ConnectionContext, stored: &CheckState) -> Result<()> {
        let id = require_id("check", &stored.id)?;
        let response = ctx.send(ApiRequest::delete(check_path(id))).await?;
        if response.is_not_found() {
            info!("Check {} already gone", id);
            return Ok(());
        }
        response.success()?;
        info!("Deleted check {}", id);
        Ok(())
    }

    fn import(&self, id: &str) -> CheckState {
        CheckState {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn desired() -> CheckState {
        CheckState {
            name: "cpu".to_string(),
            query: "from(bucket: \"telegraf\")".to_string(),
            every: Some("1m".to_string()),
            kind: "threshold".to_string(),
            thresholds: vec![Threshold {
                kind: "greater".to_string(),
                value: 80.0,
                level: "WARN".to_string(),
                all_values: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_payload_applies_defaults() {
        let payload = serde_json::to_value(CheckPayload::for_create(&desired(), "o1".to_string()))
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "name": "cpu",
                "orgID": "o1",
                "query": {"text": "from(bucket: \"telegraf\")"},
                "status": "active",
                "every": "1m",
                "offset": "0s",
                "thresholds": [
                    {"allValues": false, "level": "WARN", "value": 80.0, "type": "greater"}
                ],
                "type": "threshold"
            })
        );
    }

    #[test]
    fn test_update_payload_does_not_apply_defaults() {
        let payload = serde_json::to_value(CheckPayload::from_state(&desired(), "o1".to_string()))
            .unwrap();
        assert!(payload.get("status").is_none());
        assert!(payload.get("offset").is_none());
    }

    #[test]
    fn test_declared_status_and_offset_win() {
        let desired = CheckState {
            status: Some("inactive".to_string()),
            offset: Some("30s".to_string()),
            ..desired()
        };
        let payload = CheckPayload::for_create(&desired, "o1".to_string());
        assert_eq!(payload.status.as_deref(), Some("inactive"));
        assert_eq!(payload.offset.as_deref(), Some("30s"));
    }

    #[test]
    fn test_state_document_uses_type_key() {
        let state: CheckState = serde_json::from_value(json!({
            "name": "cpu",
            "type": "deadman",
            "thresholds": [{"type": "lesser", "value": 1.5, "level": "CRIT"}]
        }))
        .unwrap();
        assert_eq!(state.kind, "deadman");
        assert_eq!(state.thresholds[0].kind, "lesser");
        assert_eq!(state.thresholds[0].all_values, None);
    }
}
