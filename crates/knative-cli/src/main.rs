//! Knative CLI
//!
//! The `knative` command inspects a Knative environment and shows how
//! logical URIs resolve and encode, without sending anything.
//!
//! ## Commands
//!
//! - `services`: List the services declared in the environment
//! - `resolve`: Print the physical address of a logical URI
//! - `encode`: Run the CloudEvents producer chain over a payload

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knative_core::{
    KnativeComponent, KnativeConfiguration, LogicalUri, MemoryTransport, Message, Processor,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "knative")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Knative environment and CloudEvents inspection", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML file with component configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment reference (file:, classpath:, path or raw JSON)
    #[arg(short, long, global = true, env = "KNATIVE_ENVIRONMENT")]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List declared services
    Services,

    /// Resolve a logical URI to its physical address
    Resolve {
        /// Logical URI, e.g. knative:endpoint/myEndpoint/a/path
        uri: String,
    },

    /// Encode a payload as the producer of a logical URI would
    Encode {
        /// Logical URI of the producing endpoint
        uri: String,

        /// Payload
        #[arg(short, long, default_value = "")]
        body: String,

        /// Content type of the payload
        #[arg(long)]
        content_type: Option<String>,

        /// Use structured (JSON) content mode
        #[arg(long)]
        structured: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    knative_core::telemetry::init_tracing(cli.json, level);

    let configuration = load_configuration(cli.config.as_deref(), cli.environment.as_deref())?;
    let component = KnativeComponent::new(configuration, Arc::new(MemoryTransport::new()));

    let output = match cli.command {
        Commands::Services => cmd_services(&component)?,
        Commands::Resolve { uri } => cmd_resolve(&component, &uri)?,
        Commands::Encode {
            uri,
            body,
            content_type,
            structured,
        } => cmd_encode(&component, &uri, &body, content_type.as_deref(), structured).await?,
    };
    print!("{output}");

    knative_core::metrics::METRICS.flush();
    Ok(())
}

/// Read the optional TOML configuration and apply the `--environment` override.
fn load_configuration(
    path: Option<&Path>,
    environment: Option<&str>,
) -> Result<KnativeConfiguration> {
    let mut configuration = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<KnativeConfiguration>(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => KnativeConfiguration::default(),
    };

    if let Some(reference) = environment {
        debug!(reference = %reference, "environment overridden from command line");
        configuration.environment = None;
        configuration.environment_path = Some(reference.to_string());
    }
    Ok(configuration)
}

/// List declared services
fn cmd_services(component: &KnativeComponent) -> Result<String> {
    let environment = component
        .environment()
        .context("Failed to load Knative environment")?;

    let mut out = String::new();
    if environment.is_empty() {
        writeln!(out, "No services declared.")?;
        return Ok(out);
    }

    for service in environment.services() {
        let port = match service.port() {
            -1 => "default".to_string(),
            p => p.to_string(),
        };
        let host = if service.host().is_empty() {
            "-"
        } else {
            service.host()
        };
        writeln!(
            out,
            "{:<8} {:<24} {:<6} {}:{}",
            service.kind().as_str(),
            service.name(),
            service.protocol().as_str(),
            host,
            port
        )?;
    }
    Ok(out)
}

/// Resolve a logical URI
fn cmd_resolve(component: &KnativeComponent, uri: &str) -> Result<String> {
    let endpoint = component
        .endpoint(uri)
        .with_context(|| format!("Failed to resolve '{uri}'"))?;

    let mut out = String::new();
    writeln!(out, "source:   {}", endpoint.source())?;
    writeln!(out, "service:  {} ({})", endpoint.service().name(), endpoint.kind())?;
    writeln!(out, "physical: {}", endpoint.physical_uri())?;
    writeln!(out, "version:  {}", endpoint.version())?;
    writeln!(out, "type:     {}", endpoint.event_type())?;
    Ok(out)
}

/// Encode a payload without sending it
async fn cmd_encode(
    component: &KnativeComponent,
    uri: &str,
    body: &str,
    content_type: Option<&str>,
    structured: bool,
) -> Result<String> {
    let mut logical: LogicalUri = uri
        .parse()
        .with_context(|| format!("Invalid logical URI '{uri}'"))?;
    if structured {
        logical = logical.with_param("jsonSerializationEnabled", "true");
    }

    let endpoint = component
        .endpoint(&logical.to_string())
        .with_context(|| format!("Failed to resolve '{uri}'"))?;

    let mut message = Message::new(body);
    if let Some(ct) = content_type {
        message.set_content_type(ct);
    }
    let encoded = endpoint
        .encoder()
        .process(message)
        .await
        .context("Failed to encode message")?;

    let mut out = String::new();
    for (name, value) in encoded.headers() {
        writeln!(out, "{name}: {value}")?;
    }
    writeln!(out)?;
    match encoded.body_str() {
        Some(text) => writeln!(out, "{text}")?,
        None => writeln!(out, "<{} bytes>", encoded.body().len())?,
    }
    Ok(out)
}
