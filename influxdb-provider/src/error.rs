//! Provider error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A local invariant was violated. Raised before any remote call.
    #[error("{0}")]
    Validation(String),

    /// A referenced name could not be resolved to an ID.
    #[error("unable to find {kind} '{reference}': {reason}")]
    Lookup {
        kind: &'static str,
        reference: String,
        reason: String,
    },

    /// The API could not be reached.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with an unexpected status.
    #[error("InfluxDB API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// Request encoding or response decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote object does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// An operation was attempted on a resource that never received a
    /// connection context.
    #[error("the provider has not been configured with a connection context")]
    Unconfigured,
}

impl ProviderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn lookup(kind: &'static str, reference: &str, reason: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// True for a missing remote object, whether it was reported by a typed
    /// client or as a raw 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api { status, .. } => *status == StatusCode::NOT_FOUND.as_u16(),
            _ => false,
        }
    }

    /// Short diagnostic summary for this error class.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Lookup { .. } => "Client Error",
            Self::Transport(_) => "HTTP Error",
            Self::Api { .. } => "API Error",
            Self::Serialization(_) => "Serialization Error",
            Self::NotFound { .. } => "Resource Not Found",
            Self::Unconfigured => "Unconfigured Provider",
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
