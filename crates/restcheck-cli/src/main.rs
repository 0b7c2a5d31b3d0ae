//! restcheck - run hooks for REST API test suites
//!
//! The `restcheck` command drives the run-level lifecycle from a shell, for
//! host runners that are not written in Rust.
//!
//! ## Commands
//!
//! - `clean`: purge the results directory and the run log file
//! - `env`: write `environment.properties` for the report
//! - `publish`: carry history forward, generate both report variants, publish `latest`
//! - `run-hooks`: replay JSON-lines lifecycle events through the manager

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use restcheck_lifecycle::environment::environment_properties;
use restcheck_lifecycle::{
    EnvironmentWriter, ExecutionLifecycleManager, FsJanitor, LifecycleEvent, OutputJanitor,
    PropertiesEnvironmentWriter, RunConfig,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "restcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run hooks and report publication for REST API test suites", long_about = None)]
struct Cli {
    /// TOML run configuration (missing file means defaults)
    #[arg(short, long, global = true, env = "RESTCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and results
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Purge prior run output (results directory contents, run log file)
    Clean,

    /// Write environment metadata into the results directory
    Env {
        /// Extra KEY=VALUE properties
        #[arg(short, long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },

    /// Publish reports from the results on disk
    Publish {
        /// Launch the platform opener on the published report
        #[arg(long)]
        open: bool,
    },

    /// Replay lifecycle events, one JSON object per line
    RunHooks {
        /// Events file (default: stdin)
        #[arg(default_value = "-")]
        events: String,
    },
}

fn parse_property(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    restcheck_core::init_tracing(cli.json, level);

    let config = RunConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load run configuration")?;

    match cli.command {
        Commands::Clean => cmd_clean(&config, cli.json).await,
        Commands::Env { properties } => cmd_env(config, properties, cli.json).await,
        Commands::Publish { open } => cmd_publish(config, open, cli.json).await,
        Commands::RunHooks { events } => {
            cmd_run_hooks(config, cli.config.as_deref(), &events, cli.json).await
        }
    }
}

async fn cmd_clean(config: &RunConfig, json: bool) -> Result<()> {
    let mut warnings = FsJanitor.clean_directory(&config.results_dir).await;
    warnings.extend(FsJanitor.force_delete(&config.log_file).await);

    if json {
        println!("{}", serde_json::to_string_pretty(&json!({ "warnings": warnings }))?);
    } else {
        println!("Cleaned {}", config.results_dir.display());
        for warning in &warnings {
            println!("warning: {}", warning);
        }
    }
    Ok(())
}

async fn cmd_env(mut config: RunConfig, properties: Vec<(String, String)>, json: bool) -> Result<()> {
    config.environment.extend(properties);
    let props = environment_properties(&config);
    let path = PropertiesEnvironmentWriter
        .write(&config.results_dir, &props)
        .await
        .context("Failed to write environment metadata")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "path": path, "properties": props }))?
        );
    } else {
        println!("Wrote {} ({} properties)", path.display(), props.len());
    }
    Ok(())
}

async fn cmd_publish(mut config: RunConfig, open: bool, json: bool) -> Result<()> {
    config.open_report |= open;
    let manager = ExecutionLifecycleManager::new(config);
    let published = manager
        .publish_results()
        .await
        .context("Failed to publish reports")?;

    let summary = &published.with_history.summary;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "latest": published.latest,
                "single": published.without_history.dir,
                "history_carried": published.history_carried,
                "summary": summary,
            }))?
        );
    } else {
        println!("Published {}", published.latest.display());
        println!(
            "  {} tests: {} passed, {} failed, {} skipped",
            summary.total, summary.passed, summary.failed, summary.skipped
        );
        println!("  history: {} runs", published.with_history.history.len());
    }
    Ok(())
}

async fn cmd_run_hooks(
    config: RunConfig,
    config_path: Option<&Path>,
    events: &str,
    json: bool,
) -> Result<()> {
    let mut manager = ExecutionLifecycleManager::new(config);
    if let Some(path) = config_path {
        manager = manager.with_config_path(path);
    }

    let reader: Box<dyn tokio::io::AsyncBufRead + Unpin> = if events == "-" {
        Box::new(tokio::io::BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(events)
            .await
            .with_context(|| format!("open {}", events))?;
        Box::new(tokio::io::BufReader::new(file))
    };

    let mut handled = 0usize;
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: LifecycleEvent = serde_json::from_str(line)
            .with_context(|| format!("invalid lifecycle event on line {}", handled + 1))?;
        manager
            .handle(event)
            .await
            .with_context(|| format!("lifecycle hook failed on line {}", handled + 1))?;
        handled += 1;
    }
    info!(event = "hooks.replayed", handled = handled);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "handled": handled,
                "state": manager.state(),
            }))?
        );
    } else {
        println!("Handled {} lifecycle events, state {}", handled, manager.state());
    }
    Ok(())
}
