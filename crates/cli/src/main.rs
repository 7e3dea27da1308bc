//! Observability gateway environment CLI
//!
//! Runs observation cycles, prints urgency scores and drives the two
//! control knobs: class rate limits and per-pod weights and SLOs.

mod commands;
mod config;
mod kube_client;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{class_info, observe, push, rate_limits};
use gateway_lib::GatewayEnvironment;
use kube_client::LazyKubePatcher;
use output::{LogFormat, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Observability gateway environment CLI
#[derive(Parser)]
#[command(name = "gwenv")]
#[command(author, version, about = "Observe and control a tiered ingestion gateway", long_about = None)]
pub struct Cli {
    /// Settings file (TOML, JSON or YAML)
    #[arg(long, env = "GWENV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one observation cycle and print the class summary
    Observe {
        /// Lookback window in minutes (defaults to the configured window)
        #[arg(long)]
        window: Option<u32>,
    },

    /// Observe, then print per-source urgency scores
    Score {
        /// Lookback window in minutes (defaults to the configured window)
        #[arg(long)]
        window: Option<u32>,
    },

    /// Set class token-bucket rate limits from class weights
    RateLimits {
        /// Class weights, e.g. gold=0.5,silver=0.3,bronze=0.2
        #[arg(long)]
        weights: String,

        /// Print the token plan without patching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Push per-source weights to pods
    PushWeights {
        /// JSON plan: class -> pod -> source -> weight
        #[arg(long)]
        file: PathBuf,
    },

    /// Store and push freshness SLO thresholds to pods
    PushSlos {
        /// JSON plan: class -> pod -> [{source, threshold, unit}]
        #[arg(long)]
        file: PathBuf,
    },

    /// Show per-class weights and source counts reported by pods
    ClassInfo,
}

fn init_tracing(verbose: bool, log_format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let settings = config::load_settings(cli.config.as_deref())?;
    let window = settings.window_minutes;

    let patcher = LazyKubePatcher::new(
        config::kubeconfig_path(cli.kubeconfig.as_deref()),
        settings.traffic_policy_namespace.clone(),
    );
    let mut env = GatewayEnvironment::new(settings, Arc::new(patcher))?;

    let result = match cli.command {
        Commands::Observe { window: w } => {
            observe::observe(&mut env, w.unwrap_or(window), cli.format).await
        }
        Commands::Score { window: w } => {
            observe::score(&mut env, w.unwrap_or(window), cli.format).await
        }
        Commands::RateLimits { weights, dry_run } => {
            rate_limits::rate_limits(&mut env, &weights, dry_run, cli.format).await
        }
        Commands::PushWeights { file } => push::push_weights(&mut env, &file, cli.format).await,
        Commands::PushSlos { file } => push::push_slos(&mut env, &file, cli.format).await,
        Commands::ClassInfo => class_info::class_info(&mut env, cli.format).await,
    };

    if cli.dump_metrics {
        eprintln!("{}", env.metrics().encode());
    }

    result
}
