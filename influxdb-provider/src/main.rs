//! influxdb-provider: command-line host for the InfluxDB provider.
//!
//! Runs a single lifecycle call against one resource type:
//! - reads desired/stored documents from JSON files (`-` for stdin)
//! - configures the provider from flags with INFLUXDB_* environment fallback
//! - prints `{state, diagnostics}` as JSON on stdout
//!
//! Logs go to stderr so stdout stays machine readable.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use influxdb_provider::{Call, CallResponse, Diagnostics, Provider, ProviderConfig, ResourceKind};

/// InfluxDB provider host
#[derive(Parser, Debug)]
#[command(name = "influxdb-provider", version, about)]
struct Args {
    /// InfluxDB server URL (falls back to INFLUXDB_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// InfluxDB auth token (falls back to INFLUXDB_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Default organization (falls back to INFLUXDB_ORG)
    #[arg(long, global = true)]
    org: Option<String>,

    /// Default bucket (falls back to INFLUXDB_BUCKET)
    #[arg(long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print provider metadata and schemas
    Schema {
        /// Only this resource type
        #[arg(long, value_parser = parse_kind)]
        resource: Option<ResourceKind>,
    },
    /// Merge a declared document with stored state
    Plan {
        #[command(flatten)]
        target: Target,
        /// Declared document
        #[arg(long)]
        desired: PathBuf,
        /// Stored state
        #[arg(long)]
        stored: Option<PathBuf>,
    },
    /// Create a resource
    Create {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        desired: PathBuf,
    },
    /// Refresh stored state
    Read {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        stored: PathBuf,
    },
    /// Update an existing resource
    Update {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        desired: PathBuf,
        #[arg(long)]
        stored: PathBuf,
    },
    /// Delete a resource
    Delete {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        stored: PathBuf,
    },
    /// Seed state from an existing remote ID
    Import {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
    },
}

#[derive(ClapArgs, Debug)]
struct Target {
    /// Resource type, e.g. influxdb_bucket
    #[arg(long = "resource", value_parser = parse_kind)]
    kind: ResourceKind,
}

fn parse_kind(s: &str) -> std::result::Result<ResourceKind, String> {
    s.parse().map_err(|e: influxdb_provider::ProviderError| e.to_string())
}

#[derive(Serialize)]
struct Output<'a> {
    state: &'a Option<Value>,
    diagnostics: &'a Diagnostics,
}

fn read_document(path: &Path) -> Result<Value> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read document from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_response(response: &CallResponse<Value>) -> Result<ExitCode> {
    print_json(&Output {
        state: &response.state,
        diagnostics: &response.diagnostics,
    })?;
    Ok(if response.has_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "influxdb_provider=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ProviderConfig {
        url: args.url,
        token: args.token,
        org: args.org,
        bucket: args.bucket,
    };
    let mut provider = Provider::new();

    let (kind, call) = match args.command {
        Command::Schema { resource } => {
            let kinds: Vec<ResourceKind> = match resource {
                Some(kind) => vec![kind],
                None => provider.resource_kinds().to_vec(),
            };
            let resources: serde_json::Map<String, Value> = kinds
                .iter()
                .map(|kind| -> Result<(String, Value)> {
                    Ok((kind.type_name(), serde_json::to_value(kind.schema())?))
                })
                .collect::<Result<_>>()?;
            print_json(&json!({
                "provider": provider.metadata(),
                "schema": provider.schema(),
                "resources": resources,
            }))?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Plan {
            target,
            desired,
            stored,
        } => {
            let stored = stored.as_deref().map(read_document).transpose()?;
            let desired = read_document(&desired)?;
            (target.kind, Call::Plan { desired, stored })
        }
        Command::Create { target, desired } => (
            target.kind,
            Call::Create {
                desired: read_document(&desired)?,
            },
        ),
        Command::Read { target, stored } => (
            target.kind,
            Call::Read {
                stored: read_document(&stored)?,
            },
        ),
        Command::Update {
            target,
            desired,
            stored,
        } => (
            target.kind,
            Call::Update {
                desired: read_document(&desired)?,
                stored: read_document(&stored)?,
            },
        ),
        Command::Delete { target, stored } => (
            target.kind,
            Call::Delete {
                stored: read_document(&stored)?,
            },
        ),
        Command::Import { target, id } => (target.kind, Call::Import { id }),
    };

    // Plan and import never reach the server.
    if !matches!(call, Call::Plan { .. } | Call::Import { .. }) {
        let diagnostics = provider.configure(&config);
        if diagnostics.has_error() {
            print_json(&Output {
                state: &None,
                diagnostics: &diagnostics,
            })?;
            return Ok(ExitCode::FAILURE);
        }
    }

    info!("Running {} on {}", call.operation(), kind);
    let response = provider.call(kind, call).await;
    debug!(diagnostics = response.diagnostics.len(), "call finished");
    print_response(&response)
}
