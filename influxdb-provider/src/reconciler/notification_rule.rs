//! Notification rule reconciler.
//!
//! InfluxDB wants an owner on every rule. The owner is whoever the configured
//! token belongs to and is looked up on each create and update rather than
//! declared.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ReadOutcome, Reconciler, non_empty, require_id, resolve_org};
use crate::clients::ApiRequest;
use crate::context::ConnectionContext;
use crate::error::Result;
use crate::schema::{Attribute, AttributeType, Schema};

const RULES_PATH: &str = "/api/v2/notificationRules";

/// Fires on a transition to `current_level`, optionally from `previous_level`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRule {
    pub current_level: String,
    pub previous_level: Option<String>,
}

/// Matches a tag against a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRule {
    pub key: String,
    pub value: String,
    /// `equal`, `notEqual`, `equalRegex` or `notEqualRegex`.
    pub operator: String,
}

/// Stored notification rule state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleState {
    pub id: Option<String>,
    pub name: String,
    pub org: Option<String>,
    pub description: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub endpoint_id: String,
    pub every: String,
    pub offset: Option<String>,
    pub message_template: Option<String>,
    pub status_rules: Vec<StatusRule>,
    pub tag_rules: Vec<TagRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRulePayload {
    current_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TagRulePayload {
    key: String,
    value: String,
    operator: String,
}

impl From<&StatusRule> for StatusRulePayload {
    fn from(rule: &StatusRule) -> Self {
        Self {
            current_level: rule.current_level.clone(),
            previous_level: non_empty(&rule.previous_level).map(str::to_string),
        }
    }
}

impl From<&StatusRulePayload> for StatusRule {
    fn from(rule: &StatusRulePayload) -> Self {
        Self {
            current_level: rule.current_level.clone(),
            previous_level: non_empty(&rule.previous_level).map(str::to_string),
        }
    }
}

impl From<&TagRule> for TagRulePayload {
    fn from(rule: &TagRule) -> Self {
        Self {
            key: rule.key.clone(),
            value: rule.value.clone(),
            operator: rule.operator.clone(),
        }
    }
}

impl From<&TagRulePayload> for TagRule {
    fn from(rule: &TagRulePayload) -> Self {
        Self {
            key: rule.key.clone(),
            value: rule.value.clone(),
            operator: rule.operator.clone(),
        }
    }
}

/// Request body for create (POST) and full replace (PUT).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RulePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "endpointID")]
    endpoint_id: String,
    #[serde(rename = "ownerID")]
    owner_id: String,
    every: String,
    offset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_template: Option<String>,
    status_rules: Vec<StatusRulePayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tag_rules: Vec<TagRulePayload>,
    #[serde(rename = "orgID")]
    org_id: String,
}

impl RulePayload {
    fn new(desired: &RuleState, org_id: String, owner_id: String) -> Self {
        Self {
            id: None,
            name: desired.name.clone(),
            description: desired.description.clone(),
            status: desired.status.clone(),
            kind: desired.kind.clone(),
            endpoint_id: desired.endpoint_id.clone(),
            owner_id,
            every: desired.every.clone(),
            offset: desired.offset.clone().unwrap_or_default(),
            message_template: desired.message_template.clone(),
            status_rules: desired.status_rules.iter().map(StatusRulePayload::from).collect(),
            tag_rules: desired.tag_rules.iter().map(TagRulePayload::from).collect(),
            org_id,
        }
    }
}

/// Rule as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "endpointID", default)]
    endpoint_id: String,
    #[serde(default)]
    every: Option<String>,
    #[serde(default)]
    offset: Option<String>,
    #[serde(default)]
    message_template: Option<String>,
    #[serde(default)]
    status_rules: Vec<StatusRulePayload>,
    #[serde(default)]
    tag_rules: Vec<TagRulePayload>,
}

fn rule_path(id: &str) -> String {
    format!("{RULES_PATH}/{id}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationRuleReconciler;

impl NotificationRuleReconciler {
    /// Resolve org and owner, then build the request body.
    async fn payload(&self, ctx: &ConnectionContext, desired: &RuleState) -> Result<(String, RulePayload)> {
        let (org_ref, org) = resolve_org(ctx, &desired.org).await?;
        let owner = ctx.users().me().await?;
        Ok((org_ref, RulePayload::new(desired, org.id, owner.id)))
    }
}

#[async_trait]
impl Reconciler for NotificationRuleReconciler {
    type State = RuleState;

    const TYPE_SUFFIX: &'static str = "notification_rule";

    fn schema(&self) -> Schema {
        Schema::new(
            "InfluxDB notification rule",
            vec![
                Attribute::computed("id", AttributeType::String, "Notification rule ID"),
                Attribute::required("name", AttributeType::String, "Notification rule name"),
                Attribute::optional_computed(
                    "org",
                    AttributeType::String,
                    "Organization name or ID. If not provided, uses the provider default.",
                ),
                Attribute::optional("description", AttributeType::String, "Rule description"),
                Attribute::required(
                    "status",
                    AttributeType::String,
                    "Status of the rule (active, inactive)",
                ),
                Attribute::required(
                    "type",
                    AttributeType::String,
                    "Type of the rule (http, slack, pagerduty)",
                ),
                Attribute::required(
                    "endpoint_id",
                    AttributeType::String,
                    "ID of the notification endpoint to notify",
                ),
                Attribute::required("every", AttributeType::String, "Check frequency, e.g. '1m'"),
                Attribute::optional("offset", AttributeType::String, "Offset before checking"),
                Attribute::optional(
                    "message_template",
                    AttributeType::String,
                    "Template for the notification message",
                ),
                Attribute::list_block(
                    "status_rules",
                    "Rules based on check status levels",
                    vec![
                        Attribute::required(
                            "current_level",
                            AttributeType::String,
                            "Current level (OK, INFO, WARN, CRIT)",
                        ),
                        Attribute::optional(
                            "previous_level",
                            AttributeType::String,
                            "Previous level (OK, INFO, WARN, CRIT)",
                        ),
                    ],
                ),
                Attribute::list_block(
                    "tag_rules",
                    "Rules based on tag values",
                    vec![
                        Attribute::required("key", AttributeType::String, "Tag key"),
                        Attribute::required("value", AttributeType::String, "Tag value"),
                        Attribute::required(
                            "operator",
                            AttributeType::String,
                            "equal, notEqual, equalRegex or notEqualRegex",
                        ),
                    ],
                ),
            ],
        )
    }

    async fn create(&self, ctx: &ConnectionContext, desired: &RuleState) -> Result<RuleState> {
        let (org_ref, payload) = self.payload(ctx, desired).await?;
        let rule: RuleRecord = ctx
            .send(ApiRequest::post(RULES_PATH).json(&payload)?)
            .await?
            .expect(&[StatusCode::CREATED])?
            .json()?;
        info!("Created notification rule {} ({})", rule.name, rule.id);

        let mut state = desired.clone();
        state.id = Some(rule.id);
        state.org = Some(org_ref);
        state.status = rule.status;
        state.kind = rule.kind;
        Ok(state)
    }

    async fn read(&self, ctx: &ConnectionContext, stored: &RuleState) -> Result<ReadOutcome<RuleState>> {
        let id = require_id("notification rule", &stored.id)?;
        let response = ctx.send(ApiRequest::get(rule_path(id))).await?;
        if response.is_not_found() {
            warn!("Notification rule {} not found, removing from state", id);
            return Ok(ReadOutcome::Gone);
        }
        let rule: RuleRecord = response.expect(&[StatusCode::OK])?.json()?;

        let mut state = stored.clone();
        state.id = Some(rule.id);
        state.name = rule.name;
        state.status = rule.status;
        state.kind = rule.kind;
        state.endpoint_id = rule.endpoint_id;
        if rule.description.is_some() {
            state.description = rule.description;
        }
        if let Some(every) = rule.every {
            state.every = every;
        }
        if rule.offset.is_some() {
            state.offset = rule.offset;
        }
        if rule.message_template.is_some() {
            state.message_template = rule.message_template;
        }
        if !rule.status_rules.is_empty() {
            state.status_rules = rule.status_rules.iter().map(StatusRule::from).collect();
        }
        if !rule.tag_rules.is_empty() {
            state.tag_rules = rule.tag_rules.iter().map(TagRule::from).collect();
        }
        Ok(ReadOutcome::Found(state))
    }

    async fn update(
        &self,
        ctx: &ConnectionContext,
        desired: &RuleState,
        stored: &RuleState,
    ) -> Result<RuleState> {
        let id = require_id("notification rule", &stored.id)?;
        let (org_ref, mut payload) = self.payload(ctx, desired).await?;
        payload.id = Some(id.to_string());

        let rule: RuleRecord = ctx
            .send(ApiRequest::put(rule_path(id)).json(&payload)?)
            .await?
            .expect(&[StatusCode::OK])?
            .json()?;
        info!("Updated notification rule {} ({})", rule.name, id);

        // Rule lists, offset and message template stay as declared.
        let mut state = desired.clone();
        state.id = Some(id.to_string());
        state.org = Some(org_ref);
        state.name = rule.name;
        state.status = rule.status;
        state.kind = rule.kind;
        if let Some(every) = rule.every {
            state.every = every;
        }
        Ok(state)
    }

    async fn delete(&self, ctx: &ConnectionContext, stored: &RuleState) -> Result<()> {
        let id = require_id("notification rule", &stored.id)?;
        let response = ctx
            .send(ApiRequest::delete(rule_path(id)))
            .await?
            .expect(&[StatusCode::NO_CONTENT, StatusCode::NOT_FOUND])?;
        if response.is_not_found() {
            info!("Notification rule {} already gone", id);
        } else {
            info!("Deleted notification rule {}", id);
        }
        Ok(())
    }

    fn import(&self, id: &str) -> RuleState {
        RuleState {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }
}
