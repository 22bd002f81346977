//! Task reconciler.
//!
//! Two things make tasks different from the other resources. The schedule is
//! either `every` or `cron`, never both and never neither. And InfluxDB keeps
//! the query with its own `option task = { ... }` block in front, which never
//! makes it into stored state: it is stripped on the way in and spliced back
//! on update.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ReadOutcome, Reconciler, non_empty, require_id, resolve_org};
use crate::clients::tasks::format_timestamp;
use crate::clients::{NewTask, Task, TaskUpdate};
use crate::context::ConnectionContext;
use crate::error::{ProviderError, Result};
use crate::flux;
use crate::schema::{Attribute, AttributeType, PlanModifier, Schema};

const DEFAULT_STATUS: &str = "active";

/// Stored task state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskState {
    pub id: Option<String>,
    pub name: String,
    pub org: Option<String>,
    pub description: Option<String>,
    /// Query body, never including the scheduling block.
    pub flux: String,
    pub status: Option<String>,
    pub every: Option<String>,
    pub cron: Option<String>,
    pub offset: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl TaskState {
    /// Refresh the fields InfluxDB owns from a remote record. Identity and
    /// timestamps are left to the caller.
    fn refresh(&mut self, task: &Task) {
        self.name = task.name.clone();
        self.description = task.description.clone();
        self.flux = flux::strip_preamble(&task.flux);
        self.status = Some(
            task.status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        );
        self.every = task.every.clone();
        self.cron = task.cron.clone();
        self.offset = task.offset.clone();
    }
}

/// Exactly one of `every` and `cron` must be non-empty.
pub fn validate_schedule(every: &Option<String>, cron: &Option<String>) -> Result<()> {
    match (non_empty(every), non_empty(cron)) {
        (None, None) => Err(ProviderError::validation(
            "Either 'every' or 'cron' must be specified for task scheduling",
        )),
        (Some(_), Some(_)) => Err(ProviderError::validation(
            "Cannot specify both 'every' and 'cron' scheduling options",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskReconciler;

#[async_trait]
impl Reconciler for TaskReconciler {
    type State = TaskState;

    const TYPE_SUFFIX: &'static str = "task";

    fn schema(&self) -> Schema {
        Schema::new(
            "InfluxDB task",
            vec![
                Attribute::computed("id", AttributeType::String, "Task ID"),
                Attribute::required("name", AttributeType::String, "Task name"),
                Attribute::optional_computed(
                    "org",
                    AttributeType::String,
                    "Organization name or ID. If not provided, uses the provider default.",
                ),
                Attribute::optional("description", AttributeType::String, "Task description"),
                Attribute::required("flux", AttributeType::String, "Flux script to execute")
                    .with_modifier(PlanModifier::NormalizeFlux),
                Attribute::optional_computed(
                    "status",
                    AttributeType::String,
                    "Task status (active or inactive). Defaults to active.",
                ),
                Attribute::optional(
                    "every",
                    AttributeType::String,
                    "Duration-based schedule, e.g. '1h'. Exclusive with 'cron'.",
                ),
                Attribute::optional(
                    "cron",
                    AttributeType::String,
                    "Cron-based schedule, e.g. '0 */1 * * *'. Exclusive with 'every'.",
                ),
                Attribute::optional("offset", AttributeType::String, "Scheduling offset"),
                Attribute::computed("created_at", AttributeType::String, "Creation timestamp"),
                Attribute::computed("updated_at", AttributeType::String, "Last update timestamp"),
            ],
        )
    }

    fn validate(&self, desired: &TaskState) -> Result<()> {
        validate_schedule(&desired.every, &desired.cron)
    }

    async fn create(&self, ctx: &ConnectionContext, desired: &TaskState) -> Result<TaskState> {
        let (org_ref, org) = resolve_org(ctx, &desired.org).await?;

        let request = NewTask {
            name: desired.name.clone(),
            org_id: org.id,
            description: desired.description.clone(),
            status: non_empty(&desired.status)
                .unwrap_or(DEFAULT_STATUS)
                .to_string(),
            flux: flux::strip_preamble(&desired.flux).trim().to_string(),
            every: non_empty(&desired.every).map(str::to_string),
            cron: non_empty(&desired.cron).map(str::to_string),
            offset: non_empty(&desired.offset).map(str::to_string),
        };
        let task = ctx.tasks().create(&request).await?;
        info!("Created task {} ({})", task.name, task.id);

        let mut state = TaskState {
            id: Some(task.id.clone()),
            org: Some(org_ref),
            ..Default::default()
        };
        state.refresh(&task);
        state.created_at = task.created_at.as_ref().map(format_timestamp);
        state.updated_at = task
            .updated_at
            .as_ref()
            .map(format_timestamp)
            .or_else(|| state.created_at.clone());
        Ok(state)
    }

    async fn read(&self, ctx: &ConnectionContext, stored: &TaskState) -> Result<ReadOutcome<TaskState>> {
        let id = require_id("task", &stored.id)?;
        let task = match ctx.tasks().get(id).await {
            Ok(task) => task,
            Err(err) if err.is_not_found() => {
                warn!("Task {} not found, removing from state", id);
                return Ok(ReadOutcome::Gone);
            }
            Err(err) => return Err(err),
        };

        // id, org and both timestamps stay exactly as stored.
        let mut state = stored.clone();
        state.refresh(&task);
        Ok(ReadOutcome::Found(state))
    }

    async fn update(
        &self,
        ctx: &ConnectionContext,
        desired: &TaskState,
        stored: &TaskState,
    ) -> Result<TaskState> {
        let id = require_id("task", &stored.id)?;

        let current = ctx.tasks().get(id).await?;
        let script = flux::splice_preamble(&current.flux, &desired.flux);
        debug!(task = id, "spliced remote scheduling block onto new query");

        let request = TaskUpdate {
            org_id: current.org_id.clone(),
            name: Some(desired.name.clone()),
            description: desired.description.clone(),
            flux: script,
            status: non_empty(&desired.status).map(str::to_string),
            every: non_empty(&desired.every).map(str::to_string),
            cron: non_empty(&desired.cron).map(str::to_string),
            offset: non_empty(&desired.offset).map(str::to_string),
        };
        let task = ctx.tasks().update(id, &request).await?;
        info!("Updated task {} ({})", task.name, id);

        let mut state = desired.clone();
        state.id = stored.id.clone();
        state.org = stored.org.clone();
        state.created_at = stored.created_at.clone();
        state.updated_at = task
            .updated_at
            .as_ref()
            .map(format_timestamp)
            .or_else(|| stored.updated_at.clone());
        Ok(state)
    }

    async fn delete(&self, ctx: &ConnectionContext, stored: &TaskState) -> Result<()> {
        let id = require_id("task", &stored.id)?;
        match ctx.tasks().delete(id).await {
            Ok(()) => {
                info!("Deleted task {}", id);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                info!("Task {} already gone", id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn import(&self, id: &str) -> TaskState {
        TaskState {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_exactly_one_schedule_is_accepted() {
        assert!(validate_schedule(&some("1h"), &None).is_ok());
        assert!(validate_schedule(&None, &some("0 * * * *")).is_ok());
        assert!(validate_schedule(&some("1h"), &some("")).is_ok());
    }

    #[test]
    fn test_neither_schedule_is_rejected() {
        let err = validate_schedule(&None, &None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Either 'every' or 'cron' must be specified for task scheduling"
        );
        assert!(validate_schedule(&some(""), &some("")).is_err());
    }

    #[test]
    fn test_both_schedules_are_rejected() {
        let err = validate_schedule(&some("1h"), &some("0 * * * *")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot specify both 'every' and 'cron' scheduling options"
        );
    }

    #[test]
    fn test_refresh_strips_preamble_and_defaults_status() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","name":"t","every":"5m",
                "flux":"option task = { name: \"t\", every: 5m }\n\nfrom(bucket:\"b\")"}"#,
        )
        .unwrap();
        let mut state = TaskState {
            created_at: some("2024-01-01T00:00:00Z"),
            ..Default::default()
        };
        state.refresh(&task);

        assert_eq!(state.flux, "from(bucket:\"b\")");
        assert_eq!(state.status.as_deref(), Some("active"));
        assert_eq!(state.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
