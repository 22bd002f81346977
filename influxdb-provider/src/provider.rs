//! The InfluxDB provider: configuration, resource registry and dispatch of
//! host calls over JSON documents.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::config::ProviderConfig;
use crate::context::ConnectionContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::reconciler::{
    BucketReconciler, CheckReconciler, NotificationEndpointReconciler, NotificationRuleReconciler,
    Operation, Reconciler, TaskReconciler,
};
use crate::resource::{CallResponse, Resource, TYPE_PREFIX, decode_state};
use crate::schema::{Attribute, AttributeType, Schema};

/// Provider type name.
pub const TYPE_NAME: &str = "influxdb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub type_name: &'static str,
    pub version: &'static str,
}

/// The five resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Bucket,
    Task,
    Check,
    NotificationEndpoint,
    NotificationRule,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Bucket,
        ResourceKind::Task,
        ResourceKind::Check,
        ResourceKind::NotificationEndpoint,
        ResourceKind::NotificationRule,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => BucketReconciler::TYPE_SUFFIX,
            ResourceKind::Task => TaskReconciler::TYPE_SUFFIX,
            ResourceKind::Check => CheckReconciler::TYPE_SUFFIX,
            ResourceKind::NotificationEndpoint => NotificationEndpointReconciler::TYPE_SUFFIX,
            ResourceKind::NotificationRule => NotificationRuleReconciler::TYPE_SUFFIX,
        }
    }

    pub fn type_name(&self) -> String {
        format!("{TYPE_PREFIX}{}", self.suffix())
    }

    pub fn schema(&self) -> Schema {
        match self {
            ResourceKind::Bucket => BucketReconciler.schema(),
            ResourceKind::Task => TaskReconciler.schema(),
            ResourceKind::Check => CheckReconciler.schema(),
            ResourceKind::NotificationEndpoint => NotificationEndpointReconciler.schema(),
            ResourceKind::NotificationRule => NotificationRuleReconciler.schema(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TYPE_PREFIX}{}", self.suffix())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    /// Accepts the full type name (`influxdb_bucket`) or just the suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s.strip_prefix(TYPE_PREFIX).unwrap_or(s);
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.suffix() == suffix)
            .ok_or_else(|| ProviderError::validation(format!("unknown resource type '{s}'")))
    }
}

/// A lifecycle call from the host, carrying JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Plan { desired: Value, stored: Option<Value> },
    Create { desired: Value },
    Read { stored: Value },
    Update { desired: Value, stored: Value },
    Delete { stored: Value },
    Import { id: String },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Plan { .. } => Operation::Plan,
            Call::Create { .. } => Operation::Create,
            Call::Read { .. } => Operation::Read,
            Call::Update { .. } => Operation::Update,
            Call::Delete { .. } => Operation::Delete,
            Call::Import { .. } => Operation::Import,
        }
    }
}

/// The provider. Configured once, then hands the same connection context to
/// every resource it produces.
#[derive(Default)]
pub struct Provider {
    context: Option<Arc<ConnectionContext>>,
}

impl Provider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            type_name: TYPE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            "InfluxDB provider",
            vec![
                Attribute::optional(
                    "url",
                    AttributeType::String,
                    "InfluxDB server URL. May also be set with INFLUXDB_URL.",
                ),
                Attribute::optional(
                    "token",
                    AttributeType::String,
                    "InfluxDB auth token. May also be set with INFLUXDB_TOKEN.",
                )
                .sensitive(),
                Attribute::optional(
                    "org",
                    AttributeType::String,
                    "Default organization. May also be set with INFLUXDB_ORG.",
                ),
                Attribute::optional(
                    "bucket",
                    AttributeType::String,
                    "Default bucket. May also be set with INFLUXDB_BUCKET.",
                ),
            ],
        )
    }

    /// Configure against the process environment.
    pub fn configure(&mut self, config: &ProviderConfig) -> Diagnostics {
        self.configure_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve `config` (with `lookup` as environment fallback) and build the
    /// connection context. On any error no context is built and resources
    /// stay unusable.
    pub fn configure_with<F>(&mut self, config: &ProviderConfig, lookup: F) -> Diagnostics
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut diagnostics = Diagnostics::new();
        self.context = None;

        let settings = match config.resolve_with(lookup) {
            Ok(settings) => settings,
            Err(errors) => {
                for err in errors {
                    error!(error = %err, "provider configuration incomplete");
                    diagnostics.add_error(err.summary(), err.to_string());
                }
                return diagnostics;
            }
        };

        match ConnectionContext::new(settings) {
            Ok(context) => {
                info!(url = %context.settings().url, "configured InfluxDB provider");
                self.context = Some(Arc::new(context));
            }
            Err(err) => {
                error!(error = %err, "unable to create InfluxDB client");
                diagnostics.add_error(
                    "Unable to Create InfluxDB Client",
                    format!("An unexpected error occurred when creating the InfluxDB client: {err}"),
                );
            }
        }
        diagnostics
    }

    pub fn context(&self) -> Option<Arc<ConnectionContext>> {
        self.context.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.context.is_some()
    }

    /// A resource of type `R` bound to this provider's context, if any.
    pub fn resource<R: Reconciler + Default>(&self) -> Resource<R> {
        let mut resource = Resource::default();
        resource.configure(self.context());
        resource
    }

    pub fn resource_kinds(&self) -> &'static [ResourceKind] {
        &ResourceKind::ALL
    }

    /// Run one host call for the named resource type.
    pub async fn call(&self, kind: ResourceKind, call: Call) -> CallResponse<Value> {
        match kind {
            ResourceKind::Bucket => self.dispatch::<BucketReconciler>(call).await,
            ResourceKind::Task => self.dispatch::<TaskReconciler>(call).await,
            ResourceKind::Check => self.dispatch::<CheckReconciler>(call).await,
            ResourceKind::NotificationEndpoint => {
                self.dispatch::<NotificationEndpointReconciler>(call).await
            }
            ResourceKind::NotificationRule => {
                self.dispatch::<NotificationRuleReconciler>(call).await
            }
        }
    }

    async fn dispatch<R: Reconciler + Default>(&self, call: Call) -> CallResponse<Value> {
        let operation = call.operation();
        let resource = self.resource::<R>();
        let schema = resource.schema();

        let response = match call {
            Call::Plan { desired, stored } => {
                if let Err(err) = schema.validate(&desired) {
                    return failed(operation, err, stored);
                }
                let desired = match decode_state::<R>(desired) {
                    Ok(desired) => desired,
                    Err(err) => return failed(operation, err, stored),
                };
                let stored_state = match stored.clone().map(decode_state::<R>).transpose() {
                    Ok(stored_state) => stored_state,
                    Err(err) => return failed(operation, err, stored),
                };
                resource.plan(&desired, stored_state.as_ref())
            }
            Call::Create { desired } => {
                if let Err(err) = schema.validate(&desired) {
                    return failed(operation, err, None);
                }
                match decode_state::<R>(desired) {
                    Ok(desired) => resource.create(&desired).await,
                    Err(err) => return failed(operation, err, None),
                }
            }
            Call::Read { stored } => match decode_state::<R>(stored.clone()) {
                Ok(state) => resource.read(&state).await,
                Err(err) => return failed(operation, err, Some(stored)),
            },
            Call::Update { desired, stored } => {
                let decoded = decode_state::<R>(desired)
                    .and_then(|d| decode_state::<R>(stored.clone()).map(|s| (d, s)));
                match decoded {
                    Ok((desired, state)) => resource.update(&desired, &state).await,
                    Err(err) => return failed(operation, err, Some(stored)),
                }
            }
            Call::Delete { stored } => match decode_state::<R>(stored.clone()) {
                Ok(state) => resource.delete(&state).await,
                Err(err) => return failed(operation, err, Some(stored)),
            },
            Call::Import { id } => resource.import(&id),
        };

        encode(operation, response)
    }
}

fn failed(operation: Operation, err: ProviderError, state: Option<Value>) -> CallResponse<Value> {
    let mut diagnostics = Diagnostics::new();
    diagnostics.push(Diagnostic::from_error(operation, &err));
    CallResponse {
        state,
        diagnostics,
    }
}

fn encode<S: Serialize>(operation: Operation, response: CallResponse<S>) -> CallResponse<Value> {
    let CallResponse {
        state,
        mut diagnostics,
    } = response;
    match state.map(serde_json::to_value).transpose() {
        Ok(state) => CallResponse { state, diagnostics },
        Err(err) => {
            diagnostics.push(Diagnostic::from_error(operation, &ProviderError::from(err)));
            CallResponse {
                state: None,
                diagnostics,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_kind_parsing() {
        assert_eq!(
            "influxdb_bucket".parse::<ResourceKind>().unwrap(),
            ResourceKind::Bucket
        );
        assert_eq!(
            "notification_rule".parse::<ResourceKind>().unwrap(),
            ResourceKind::NotificationRule
        );
        assert!("influxdb_dashboard".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_type_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.type_name().parse::<ResourceKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.type_name());
        }
        assert_eq!(
            ResourceKind::NotificationEndpoint.type_name(),
            "influxdb_notification_endpoint"
        );
    }

    #[test]
    fn test_metadata_and_schema() {
        let provider = Provider::new();
        assert_eq!(provider.metadata().type_name, "influxdb");
        let sensitive: Vec<_> = provider.schema().sensitive_attributes().collect();
        assert_eq!(sensitive, vec!["token"]);
    }

    #[test]
    fn test_configure_reports_missing_settings() {
        let mut provider = Provider::new();
        let diagnostics = provider.configure_with(&ProviderConfig::default(), |_| None);

        let summaries: Vec<_> = diagnostics.errors().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Missing InfluxDB URL", "Missing InfluxDB Token"]);
        assert!(!provider.is_configured());
        assert!(!provider.resource::<BucketReconciler>().is_configured());
    }

    #[test]
    fn test_configure_from_environment() {
        let mut provider = Provider::new();
        let diagnostics = provider.configure_with(&ProviderConfig::default(), |key| match key {
            "INFLUXDB_URL" => Some("http://localhost:8086".to_string()),
            "INFLUXDB_TOKEN" => Some("token".to_string()),
            _ => None,
        });
        assert!(diagnostics.is_empty());
        assert!(provider.resource::<TaskReconciler>().is_configured());
    }

    #[test]
    fn test_configure_rejects_malformed_url() {
        let mut provider = Provider::new();
        let config = ProviderConfig {
            url: Some("not a url".to_string()),
            token: Some("token".to_string()),
            ..Default::default()
        };
        let diagnostics = provider.configure_with(&config, |_| None);
        assert!(diagnostics.has_error());
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_attribute() {
        let provider = Provider::new();
        let response = provider
            .call(ResourceKind::Bucket, Call::Create { desired: json!({"org": "org1"}) })
            .await;
        assert_eq!(response.state, None);
        let diagnostic = response.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Create - Validation Error");
        assert_eq!(diagnostic.detail, "missing required attribute 'name'");
    }

    #[tokio::test]
    async fn test_import_dispatch() {
        let provider = Provider::new();
        let response = provider
            .call(ResourceKind::Check, Call::Import { id: "c1".to_string() })
            .await;
        assert_eq!(response.state.unwrap()["id"], "c1");
    }
}
