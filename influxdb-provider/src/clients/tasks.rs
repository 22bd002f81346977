//! Task CRUD.
//!
//! Creating a task sends a single flux script: the scheduling block is built
//! here from the task's name and schedule and prepended to the query body.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiRequest, ApiResponse};
use crate::context::ConnectionContext;
use crate::error::{ProviderError, Result};

const KIND: &str = "task";

/// Remote task record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "orgID", default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub flux: String,
    #[serde(default)]
    pub every: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Task to create. `flux` is the query body without a scheduling block.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub org_id: String,
    pub description: Option<String>,
    pub status: String,
    pub flux: String,
    pub every: Option<String>,
    pub cron: Option<String>,
    pub offset: Option<String>,
}

impl NewTask {
    /// The full script: `option task = { name: "..", every: .. } <body>`.
    pub fn script(&self) -> String {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        let mut options = vec![format!("name: \"{}\"", self.name.replace('"', "\\\""))];
        if let Some(every) = non_empty(&self.every) {
            options.push(format!("every: {every}"));
        } else if let Some(cron) = non_empty(&self.cron) {
            options.push(format!("cron: \"{cron}\""));
        }
        if let Some(offset) = non_empty(&self.offset) {
            options.push(format!("offset: {offset}"));
        }

        format!("option task = {{ {} }} {}", options.join(", "), self.flux)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreateRequest<'a> {
    #[serde(rename = "orgID")]
    org_id: &'a str,
    flux: String,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Body for updating a task. Unset fields are left alone remotely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(rename = "orgID", skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub flux: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

/// RFC 3339 with second precision, e.g. `2024-01-02T03:04:05Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn not_found(response: ApiResponse, id: &str) -> ProviderError {
    if response.is_not_found() {
        ProviderError::NotFound {
            kind: KIND,
            id: id.to_string(),
        }
    } else {
        response.into_error()
    }
}

pub struct TasksApi<'a> {
    ctx: &'a ConnectionContext,
}

impl<'a> TasksApi<'a> {
    pub fn new(ctx: &'a ConnectionContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        let body = TaskCreateRequest {
            org_id: &task.org_id,
            flux: task.script(),
            status: &task.status,
            description: task.description.as_deref(),
        };
        self.ctx
            .request(ApiRequest::post("/api/v2/tasks").json(&body)?)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Task> {
        let response = self
            .ctx
            .send(ApiRequest::get(format!("/api/v2/tasks/{id}")))
            .await?;
        if !response.status.is_success() {
            return Err(not_found(response, id));
        }
        response.json()
    }

    pub async fn update(&self, id: &str, update: &TaskUpdate) -> Result<Task> {
        let response = self
            .ctx
            .send(ApiRequest::patch(format!("/api/v2/tasks/{id}")).json(update)?)
            .await?;
        if !response.status.is_success() {
            return Err(not_found(response, id));
        }
        response.json()
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .ctx
            .send(ApiRequest::delete(format!("/api/v2/tasks/{id}")))
            .await?;
        if !response.status.is_success() {
            return Err(not_found(response, id));
        }
        Ok(())
    }
}
