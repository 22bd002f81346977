//! InfluxDB provider.
//!
//! Reconciles declared buckets, tasks, checks, notification endpoints and
//! notification rules against the InfluxDB v2 management API.
//!
//! A [`Provider`] is configured once from declared settings with environment
//! fallback. It then hands out [`Resource`]s that share one
//! [`ConnectionContext`], each driving a [`reconciler::Reconciler`] through the
//! create, read, update, delete and import lifecycle.

pub mod clients;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod flux;
pub mod plan;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod schema;

pub use config::{ConnectionSettings, ProviderConfig};
pub use context::ConnectionContext;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ProviderError, Result};
pub use provider::{Call, Provider, ResourceKind};
pub use resource::{CallResponse, Resource};
