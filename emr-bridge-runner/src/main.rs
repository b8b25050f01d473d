//! emr-bridge — feeds EMR state-change events through the token bridge.
//!
//! ```text
//! emr-bridge handle --domain step --event event.json
//! cat event.json | emr-bridge handle
//! emr-bridge register --resource-id s-1 --token <task token>
//! emr-bridge key --resource-id j-1 --domain cluster
//! ```
//!
//! Logs go to stderr; `handle` prints the outcome as JSON on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use emr_bridge_core::{
    BridgeConfig, ContinuationToken, LogFormat, ResourceDomain, SsmTokenStore,
    StepFunctionsClient, TokenBridge,
};

const DEFAULT_LOG_FILTER: &str = "info,emr_bridge_core=debug";

#[derive(Parser)]
#[command(name = "emr-bridge")]
#[command(about = "Correlate EMR state changes with suspended Step Functions tasks")]
struct Cli {
    /// YAML config file
    #[arg(long, global = true, env = "EMR_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one state-change event
    Handle {
        /// step or cluster
        #[arg(long)]
        domain: Option<ResourceDomain>,

        /// Event JSON file (stdin when omitted)
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// Park a continuation token for a resource
    Register {
        #[arg(long)]
        resource_id: String,

        #[arg(long)]
        token: String,

        #[arg(long)]
        domain: Option<ResourceDomain>,
    },

    /// Print the store key for a resource
    Key {
        #[arg(long)]
        resource_id: String,

        #[arg(long)]
        domain: Option<ResourceDomain>,
    },
}

impl Command {
    fn domain(&self) -> Option<ResourceDomain> {
        match self {
            Command::Handle { domain, .. }
            | Command::Register { domain, .. }
            | Command::Key { domain, .. } => *domain,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(domain) = cli.command.domain() {
        config.domain = domain;
    }

    init_tracing(config.log_format);

    match cli.command {
        Command::Key { resource_id, .. } => {
            let key = emr_bridge_core::ResourceKey::new(config.domain, resource_id);
            println!("{}", config.key_layout().key_for(&key));
        }

        Command::Register {
            resource_id, token, ..
        } => {
            let bridge = build_bridge(&config).await;
            let key = bridge
                .register(&resource_id, &ContinuationToken::new(token))
                .await
                .with_context(|| format!("registering token for {resource_id}"))?;
            println!("{key}");
        }

        Command::Handle { event, .. } => {
            let raw = read_event(event.as_deref()).await?;
            let event: serde_json::Value =
                serde_json::from_str(&raw).context("event is not valid JSON")?;

            let bridge = build_bridge(&config).await;
            let outcome = bridge
                .handle_event(&event)
                .await
                .context("handling state change")?;

            let disposition = outcome.disposition();
            tracing::info!(
                disposition = ?disposition,
                terminal = disposition.is_terminal(),
                "Event handled"
            );
            println!("{}", serde_json::to_string(&outcome)?);
        }
    }

    Ok(())
}

/// File (if any), then `EMR_BRIDGE_*` environment overrides.
fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    let base = match path {
        Some(path) => BridgeConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    base.with_overrides(|name| std::env::var(name).ok())
        .context("applying environment overrides")
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn build_bridge(config: &BridgeConfig) -> TokenBridge {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    tracing::debug!(
        domain = %config.domain,
        prefix = %config.token_prefix,
        region = ?sdk_config.region(),
        "Building token bridge"
    );

    let store = SsmTokenStore::new(aws_sdk_ssm::Client::new(&sdk_config));
    let client = StepFunctionsClient::new(aws_sdk_sfn::Client::new(&sdk_config));

    TokenBridge::new(
        config.domain,
        config.key_layout(),
        Arc::new(store),
        Arc::new(client),
    )
}

async fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading event {}", path.display())),
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("reading event from stdin")?;
            Ok(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_handle() {
        let cli = Cli::parse_from(["emr-bridge", "handle", "--domain", "cluster"]);
        assert_eq!(cli.command.domain(), Some(ResourceDomain::Cluster));
        assert!(matches!(cli.command, Command::Handle { event: None, .. }));
    }

    #[test]
    fn test_cli_parses_register() {
        let cli = Cli::parse_from([
            "emr-bridge",
            "register",
            "--resource-id",
            "s-1",
            "--token",
            "tok",
            "--config",
            "bridge.yaml",
        ]);
        assert_eq!(cli.config.as_deref(), Some(Path::new("bridge.yaml")));
        match cli.command {
            Command::Register {
                resource_id, token, ..
            } => {
                assert_eq!(resource_id, "s-1");
                assert_eq!(token, "tok");
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_domain() {
        let result = Cli::try_parse_from(["emr-bridge", "key", "--resource-id", "x", "--domain", "job"]);
        assert!(result.is_err());
    }
}
