use anyhow::Result;
use apisync::config::{Config, LoggingConfig};
use apisync::ResourceKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "apisync")]
#[command(about = "Snapshot and replay API management configuration")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "apisync.toml")]
    config: PathBuf,

    /// Log output format: pretty or json (overrides config)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Disable the progress spinner
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Coordinates of a service instance plus the session to reach it.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Subscription id
    #[arg(long, env = "APISYNC_SUBSCRIPTION")]
    subscription: String,

    /// Resource group holding the service
    #[arg(long, env = "APISYNC_RESOURCE_GROUP")]
    resource_group: String,

    /// Service name
    #[arg(long, env = "APISYNC_SERVICE")]
    service: String,

    /// Bearer token for the management API
    #[arg(long, env = "APISYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Management endpoint (overrides config)
    #[arg(long, env = "APISYNC_ENDPOINT")]
    endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export a live service into a snapshot directory
    Export {
        #[command(flatten)]
        source: ServiceArgs,

        /// Snapshot output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Resource kinds to export (comma-separated, default: all)
        #[arg(short, long, value_delimiter = ',')]
        kinds: Vec<ResourceKind>,

        /// Keep Key Vault references of secret named values (values are never written)
        #[arg(long)]
        include_secret_references: bool,
    },

    /// Replay a snapshot against a target service
    Import {
        #[command(flatten)]
        target: ServiceArgs,

        /// Snapshot input directory
        #[arg(short, long)]
        input: PathBuf,

        /// Resource kinds to import (comma-separated, default: all)
        #[arg(short, long, value_delimiter = ',')]
        kinds: Vec<ResourceKind>,

        /// CSV of fromId,toId pairs linking APIs into products
        #[arg(long)]
        links: Option<PathBuf>,
    },

    /// Link APIs into products on a target service
    Link {
        #[command(flatten)]
        target: ServiceArgs,

        /// CSV of fromId,toId pairs
        #[arg(short, long)]
        mapping: PathBuf,
    },

    /// Show what a snapshot contains
    Inspect {
        /// Snapshot directory
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn init_tracing(logging: &LoggingConfig, format_override: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| logging.level.clone()),
    );
    let format = format_override.unwrap_or(logging.format.as_str());

    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    init_tracing(&config.logging, cli.log_format.as_deref());

    match cli.command {
        Commands::Export {
            source,
            output,
            kinds,
            include_secret_references,
        } => {
            let mut config = config;
            config.sync.include_secret_references |= include_secret_references;
            commands::run_export(&config, &source, &output, &kinds, cli.no_progress).await?;
        }
        Commands::Import {
            target,
            input,
            kinds,
            links,
        } => {
            commands::run_import(&config, &target, &input, &kinds, links.as_deref(), cli.no_progress)
                .await?;
        }
        Commands::Link { target, mapping } => {
            commands::run_link(&config, &target, &mapping).await?;
        }
        Commands::Inspect { input } => {
            commands::run_inspect(&input)?;
        }
    }

    Ok(())
}
