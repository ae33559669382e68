//! # Attacher Configuration Validator
//!
//! Command-line tool for validating attacher configuration before a
//! controller is started with it.

use anyhow::Context;
use attacher_core::config::{AttacherConfig, ConfigManager};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate attacher configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// TOML configuration file; falls back to ATTACHER_CONFIG_PATH
    #[arg(short, long, env = "ATTACHER_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print the built-in defaults
    Defaults,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Defaults) => print_config(&AttacherConfig::default(), &cli.format),
        Some(Commands::Validate) | None => validate(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            println!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<Arc<ConfigManager>> {
    match &cli.config {
        Some(path) => ConfigManager::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => ConfigManager::load_from_env().context("failed to load configuration"),
    }
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating Attacher Configuration");

    let manager = load(cli)?;
    println!("✅ Configuration loaded and validated");
    println!("Environment: {}", manager.environment());
    match manager.source_file() {
        Some(path) => println!("Source File: {}", path.display()),
        None => println!("Source File: (defaults and environment only)"),
    }
    println!();

    print_config(manager.config(), &cli.format)
}

fn print_config(config: &AttacherConfig, format: &str) -> anyhow::Result<()> {
    match format {
        "json" => {
            let rendered = serde_json::to_string_pretty(config)
                .context("failed to render configuration as JSON")?;
            println!("{rendered}");
        }
        "table" => {
            println!("📋 Attacher:");
            println!("  • attacher_name: {}", config.attacher_name);
            println!("  • worker_threads: {}", config.worker_threads);
            println!("  • resync_period: {:?}", config.resync_period());
            println!("  • shutdown_timeout: {:?}", config.shutdown_timeout());
            println!("  • handler_timeout: {:?}", config.handler_timeout());
            println!("📋 Retry:");
            println!("  • interval_start: {:?}", config.retry.interval_start());
            println!("  • interval_max: {:?}", config.retry.interval_max());
            println!("📋 Cache Sync:");
            println!("  • poll_interval: {:?}", config.cache_sync.poll_interval());
            println!("📋 Leader Election:");
            println!("  • enabled: {}", config.leader_election.enabled);
            println!("  • lock_name: {}", config.leader_lock_name());
            if let Some(namespace) = &config.leader_election.namespace {
                println!("  • namespace: {namespace}");
            }
            println!("📋 Logging:");
            println!("  • format: {:?}", config.logging.format);
            println!("  • level: {}", config.logging.level.as_deref().unwrap_or("(environment default)"));
        }
        other => anyhow::bail!("unknown output format: {other}"),
    }
    Ok(())
}
