//! Provider configuration.
//!
//! Each connection setting comes from the declared provider block first and
//! falls back to its environment variable.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const URL_ENV: &str = "INFLUXDB_URL";
pub const TOKEN_ENV: &str = "INFLUXDB_TOKEN";
pub const ORG_ENV: &str = "INFLUXDB_ORG";
pub const BUCKET_ENV: &str = "INFLUXDB_BUCKET";

/// Declared provider configuration. Every field is optional.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Fully resolved connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub url: String,
    pub token: String,
    pub org: Option<String>,
    pub bucket: Option<String>,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "The provider cannot create the InfluxDB client as there is a missing or empty value for the InfluxDB URL. \
         Set the url value in the configuration or use the INFLUXDB_URL environment variable."
    )]
    MissingUrl,

    #[error(
        "The provider cannot create the InfluxDB client as there is a missing or empty value for the InfluxDB Token. \
         Set the token value in the configuration or use the INFLUXDB_TOKEN environment variable."
    )]
    MissingToken,
}

impl ConfigError {
    pub fn summary(&self) -> &'static str {
        match self {
            ConfigError::MissingUrl => "Missing InfluxDB URL",
            ConfigError::MissingToken => "Missing InfluxDB Token",
        }
    }
}

impl ProviderConfig {
    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ConnectionSettings, Vec<ConfigError>> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment fallback.
    ///
    /// A declared value wins even when it is empty. All missing required
    /// settings are reported together.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<ConnectionSettings, Vec<ConfigError>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |declared: &Option<String>, key: &str| -> String {
            declared
                .clone()
                .or_else(|| lookup(key))
                .unwrap_or_default()
        };

        let url = pick(&self.url, URL_ENV);
        let token = pick(&self.token, TOKEN_ENV);
        let org = Some(pick(&self.org, ORG_ENV)).filter(|v| !v.is_empty());
        let bucket = Some(pick(&self.bucket, BUCKET_ENV)).filter(|v| !v.is_empty());

        let mut errors = Vec::new();
        if url.is_empty() {
            errors.push(ConfigError::MissingUrl);
        }
        if token.is_empty() {
            errors.push(ConfigError::MissingToken);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ConnectionSettings {
            url,
            token,
            org,
            bucket,
        })
    }
}
