//! Reconcilers for the five InfluxDB resource types.
//!
//! Each reconciler maps a declared document onto InfluxDB API calls and maps
//! the responses back into stored state. Reconcilers hold no state of their
//! own; everything they need per call arrives as arguments.

pub mod bucket;
pub mod check;
pub mod notification_endpoint;
pub mod notification_rule;
pub mod task;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::clients::Organization;
use crate::context::ConnectionContext;
use crate::diagnostics::Diagnostic;
use crate::error::{ProviderError, Result};
use crate::schema::Schema;

pub use bucket::{BucketReconciler, BucketState};
pub use check::{CheckReconciler, CheckState, Threshold};
pub use notification_endpoint::{EndpointState, NotificationEndpointReconciler};
pub use notification_rule::{NotificationRuleReconciler, RuleState, StatusRule, TagRule};
pub use task::{TaskReconciler, TaskState};

/// Lifecycle stage of a call, used to label diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Plan,
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Plan => "Plan",
            Operation::Create => "Create",
            Operation::Read => "Read",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
            Operation::Import => "Import",
        };
        f.write_str(name)
    }
}

/// Result of reading a resource back from InfluxDB.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<S> {
    /// The resource exists; here is its refreshed state.
    Found(S),
    /// The resource no longer exists and should be dropped from state.
    Gone,
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Stored state, also used for the declared document.
    type State: Serialize + DeserializeOwned + Clone + Default + Send + Sync;

    /// Suffix of the resource type name, e.g. `bucket` for `influxdb_bucket`.
    const TYPE_SUFFIX: &'static str;

    fn schema(&self) -> Schema;

    /// Local invariants beyond what the schema expresses.
    fn validate(&self, _desired: &Self::State) -> Result<()> {
        Ok(())
    }

    /// Warnings about the declared document for the given stage.
    fn warnings(&self, _operation: Operation, _desired: &Self::State) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Create the resource and return the state to store.
    async fn create(&self, ctx: &ConnectionContext, desired: &Self::State) -> Result<Self::State>;

    /// Refresh stored state from InfluxDB.
    async fn read(
        &self,
        ctx: &ConnectionContext,
        stored: &Self::State,
    ) -> Result<ReadOutcome<Self::State>>;

    /// Push the planned document for an existing resource.
    async fn update(
        &self,
        ctx: &ConnectionContext,
        desired: &Self::State,
        stored: &Self::State,
    ) -> Result<Self::State>;

    /// Delete the resource. A resource that is already gone is not an error.
    async fn delete(&self, ctx: &ConnectionContext, stored: &Self::State) -> Result<()>;

    /// State seeded with only the remote ID. A subsequent read fills the rest.
    fn import(&self, id: &str) -> Self::State;
}

/// A set, non-empty string.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The stored remote ID, or a validation error naming the resource kind.
pub(crate) fn require_id<'a>(kind: &str, id: &'a Option<String>) -> Result<&'a str> {
    non_empty(id).ok_or_else(|| {
        ProviderError::validation(format!("cannot address {kind} without an ID in stored state"))
    })
}

/// The declared organization, falling back to the provider default.
pub(crate) fn org_reference(ctx: &ConnectionContext, declared: &Option<String>) -> Result<String> {
    non_empty(declared)
        .or_else(|| ctx.default_org().filter(|org| !org.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::lookup(
                "organization",
                "",
                "no organization declared on the resource and no provider default",
            )
        })
}

/// Resolve the declared (or default) organization. Returns the reference as
/// given together with the organization it resolved to.
pub(crate) async fn resolve_org(
    ctx: &ConnectionContext,
    declared: &Option<String>,
) -> Result<(String, Organization)> {
    let reference = org_reference(ctx, declared)?;
    let org = ctx.organizations().resolve(&reference).await?;
    Ok((reference, org))
}

/// Display form of an organization for stored state. A stored reference
/// that is the organization's ID stays an ID; otherwise the name is used.
pub(crate) fn display_org(stored: &Option<String>, org: &Organization) -> String {
    match non_empty(stored) {
        Some(reference) if reference == org.id => org.id.clone(),
        _ => org.name.clone(),
    }
}

/// Look an organization ID up for display, keeping the stored reference when
/// the lookup fails.
pub(crate) async fn refresh_org(
    ctx: &ConnectionContext,
    stored: &Option<String>,
    org_id: Option<&str>,
) -> Option<String> {
    let Some(org_id) = org_id.filter(|id| !id.is_empty()) else {
        return stored.clone();
    };
    match ctx.organizations().find_by_id(org_id).await {
        Ok(org) => Some(display_org(stored, &org)),
        Err(err) => {
            tracing::warn!(org_id, error = %err, "unable to resolve organization name");
            stored.clone()
        }
    }
}
