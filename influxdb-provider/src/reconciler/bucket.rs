//! Bucket reconciler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ReadOutcome, Reconciler, non_empty, refresh_org, require_id, resolve_org};
use crate::clients::buckets::retention_rules;
use crate::clients::{Bucket, BucketUpdate, NewBucket};
use crate::context::ConnectionContext;
use crate::error::{ProviderError, Result};
use crate::schema::{Attribute, AttributeType, Schema};

/// Stored bucket state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketState {
    pub id: Option<String>,
    pub name: String,
    pub org: Option<String>,
    pub description: Option<String>,
    /// Retention in seconds, 0 for infinite.
    pub retention_seconds: Option<i64>,
}

impl BucketState {
    fn refresh(&mut self, bucket: &Bucket) {
        self.id = Some(bucket.id.clone());
        self.name = bucket.name.clone();
        self.description = bucket.description.clone();
        self.retention_seconds = Some(bucket.retention_seconds());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BucketReconciler;

#[async_trait]
impl Reconciler for BucketReconciler {
    type State = BucketState;

    const TYPE_SUFFIX: &'static str = "bucket";

    fn schema(&self) -> Schema {
        Schema::new(
            "InfluxDB bucket",
            vec![
                Attribute::computed("id", AttributeType::String, "Bucket ID"),
                Attribute::required("name", AttributeType::String, "Bucket name"),
                Attribute::optional_computed(
                    "org",
                    AttributeType::String,
                    "Organization name or ID. If not provided, uses the provider default.",
                ),
                Attribute::optional("description", AttributeType::String, "Bucket description"),
                Attribute::optional_computed(
                    "retention_seconds",
                    AttributeType::Int64,
                    "Data retention period in seconds. 0 means infinite retention.",
                ),
            ],
        )
    }

    fn validate(&self, desired: &BucketState) -> Result<()> {
        match desired.retention_seconds {
            Some(seconds) if seconds < 0 => Err(ProviderError::validation(format!(
                "retention_seconds must be a non-negative integer, got {seconds}"
            ))),
            _ => Ok(()),
        }
    }

    async fn create(&self, ctx: &ConnectionContext, desired: &BucketState) -> Result<BucketState> {
        let (org_ref, org) = resolve_org(ctx, &desired.org).await?;

        let request = NewBucket {
            name: desired.name.clone(),
            org_id: org.id,
            description: non_empty(&desired.description).map(str::to_string),
            retention_rules: retention_rules(desired.retention_seconds.unwrap_or(0)),
        };
        let bucket = ctx.buckets().create(&request).await?;
        info!("Created bucket {} ({})", bucket.name, bucket.id);

        // The display form as declared, not the resolved ID.
        let mut state = BucketState {
            org: Some(org_ref),
            ..Default::default()
        };
        state.refresh(&bucket);
        state.description = state.description.or_else(|| desired.description.clone());
        Ok(state)
    }

    async fn read(
        &self,
        ctx: &ConnectionContext,
        stored: &BucketState,
    ) -> Result<ReadOutcome<BucketState>> {
        let id = require_id("bucket", &stored.id)?;
        let bucket = match ctx.buckets().get(id).await {
            Ok(bucket) => bucket,
            Err(err) if err.is_not_found() => {
                warn!("Bucket {} not found, removing from state", id);
                return Ok(ReadOutcome::Gone);
            }
            Err(err) => return Err(err),
        };

        let mut state = stored.clone();
        state.refresh(&bucket);
        state.org = refresh_org(ctx, &stored.org, bucket.org_id.as_deref()).await;
        Ok(ReadOutcome::Found(state))
    }

    async fn update(
        &self,
        ctx: &ConnectionContext,
        desired: &BucketState,
        stored: &BucketState,
    ) -> Result<BucketState> {
        let id = require_id("bucket", &stored.id)?;

        let request = BucketUpdate {
            name: desired.name.clone(),
            description: desired.description.clone(),
            retention_rules: retention_rules(desired.retention_seconds.unwrap_or(0)),
        };
        let bucket = ctx.buckets().update(id, &request).await?;
        info!("Updated bucket {} ({})", bucket.name, bucket.id);

        let mut state = desired.clone();
        state.refresh(&bucket);
        state.description = state.description.or_else(|| desired.description.clone());
        state.org = stored.org.clone();
        Ok(state)
    }

    async fn delete(&self, ctx: &ConnectionContext, stored: &BucketState) -> Result<()> {
        let id = require_id("bucket", &stored.id)?;
        match ctx.buckets().delete(id).await {
            Ok(()) => {
                info!("Deleted bucket {}", id);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                info!("Bucket {} already gone", id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn import(&self, id: &str) -> BucketState {
        BucketState {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }
}
