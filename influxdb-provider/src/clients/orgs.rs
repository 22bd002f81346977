//! Organization lookups.

use serde::Deserialize;
use tracing::debug;

use super::ApiRequest;
use crate::context::ConnectionContext;
use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct Organizations {
    #[serde(default)]
    orgs: Vec<Organization>,
}

/// True for strings shaped like an InfluxDB ID: 16 hex characters.
pub fn looks_like_id(reference: &str) -> bool {
    reference.len() == 16 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

pub struct OrganizationsApi<'a> {
    ctx: &'a ConnectionContext,
}

impl<'a> OrganizationsApi<'a> {
    pub fn new(ctx: &'a ConnectionContext) -> Self {
        Self { ctx }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Organization> {
        let found: Organizations = self
            .ctx
            .request(ApiRequest::get("/api/v2/orgs").query("org", name))
            .await?;
        found
            .orgs
            .into_iter()
            .find(|org| org.name == name)
            .ok_or_else(|| ProviderError::NotFound {
                kind: "organization",
                id: name.to_string(),
            })
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Organization> {
        self.ctx
            .request(ApiRequest::get(format!("/api/v2/orgs/{id}")))
            .await
    }

    /// Resolve a name or ID to an organization. A reference that is not a
    /// known name but is shaped like an ID is retried as an ID.
    ///
    /// Any failure other than a transport error is reported as a lookup error.
    pub async fn resolve(&self, reference: &str) -> Result<Organization> {
        let err = match self.find_by_name(reference).await {
            Ok(org) => return Ok(org),
            Err(err @ ProviderError::Transport(_)) => return Err(err),
            Err(err) => err,
        };

        if looks_like_id(reference) {
            debug!(org = reference, "organization name lookup failed, trying as ID");
            match self.find_by_id(reference).await {
                Ok(org) => return Ok(org),
                Err(err @ ProviderError::Transport(_)) => return Err(err),
                Err(_) => {}
            }
        }

        Err(ProviderError::lookup("organization", reference, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_id() {
        assert!(looks_like_id("0123456789abcdef"));
        assert!(looks_like_id("0123456789ABCDEF"));
        assert!(!looks_like_id("org1"));
        assert!(!looks_like_id("0123456789abcdeg"));
        assert!(!looks_like_id("0123456789abcdef0"));
    }
}
