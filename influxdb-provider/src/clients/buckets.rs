//! Bucket CRUD.

use serde::{Deserialize, Serialize};

use super::{ApiRequest, ApiResponse};
use crate::context::ConnectionContext;
use crate::error::{ProviderError, Result};

const KIND: &str = "bucket";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub every_seconds: i64,
}

impl RetentionRule {
    pub fn expire(every_seconds: i64) -> Self {
        Self {
            kind: "expire".to_string(),
            every_seconds,
        }
    }
}

/// Retention rules for a retention period in seconds. Zero means infinite
/// retention, which is expressed as no rule at all.
pub fn retention_rules(retention_seconds: i64) -> Vec<RetentionRule> {
    if retention_seconds > 0 {
        vec![RetentionRule::expire(retention_seconds)]
    } else {
        Vec::new()
    }
}

/// Remote bucket record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(rename = "orgID", default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub retention_rules: Vec<RetentionRule>,
}

impl Bucket {
    /// Retention of the first rule, 0 when there is none.
    pub fn retention_seconds(&self) -> i64 {
        self.retention_rules
            .first()
            .map(|rule| rule.every_seconds)
            .unwrap_or(0)
    }
}

/// Body for creating a bucket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBucket {
    pub name: String,
    #[serde(rename = "orgID")]
    pub org_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub retention_rules: Vec<RetentionRule>,
}

/// Body for updating a bucket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub retention_rules: Vec<RetentionRule>,
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

pub struct BucketsApi<'a> {
    ctx: &'a ConnectionContext,
}

impl<'a> BucketsApi<'a> {
    pub fn new(ctx: &'a ConnectionContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, bucket: &NewBucket) -> Result<Bucket> {
        self.ctx
            .request(ApiRequest::post("/api/v2/buckets").json(bucket)?)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Bucket> {
        let response = self
            .ctx
            .send(ApiRequest::get(format!("/api/v2/buckets/{id}")))
            .await?;
        if !response.status.is_success() {
            return Err(not_found(response, id));
        }
        response.json()
    }

    pub async fn update(&self, id: &str, update: &BucketUpdate) -> Result<Bucket> {
        let response = self
            .ctx
            .send(ApiRequest::patch(format!("/api/v2/buckets/{id}")).json(update)?)
            .await?;
        if !response.status.is_success() {
            return Err(not_found(response, id));
        }
        response.json()
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .ctx
            .send(ApiRequest::delete(format!("/api/v2/buckets/{id}")))
            .await?;
        if !response.status.is_success() {
            return Err(not_found(response, id));
        }
        Ok(())
    }
}
