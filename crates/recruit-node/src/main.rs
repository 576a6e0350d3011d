//! # Recruit Node
//!
//! Runs the request/reply bridge on the in-memory broker.
//!
//! ## Commands
//!
//! - `run` (default) - start the bridge and loopback siblings, log counters
//!   periodically, stop on Ctrl+C
//! - `lookup <target> <id>` - start, perform one typed lookup, print it as JSON
//!   and exit
//! - `metrics` - print the registered Prometheus metrics and exit
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load bridge configuration (file, then `RECRUIT_*` environment)
//! 3. Create the broker and the bridge service
//! 4. Claim the reply queue and start the publisher and dispatcher

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use recruit_node::{load_bridge_config, LookupTarget, NodeOptions, NodeRuntime};
use recruit_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

/// Recruit Node: broker request/reply bridge
#[derive(Parser, Debug)]
#[command(name = "recruit-node")]
#[command(about = "Runs the recruitment request/reply bridge on an in-memory broker")]
struct Args {
    /// Bridge configuration file (TOML)
    #[arg(short, long, env = "RECRUIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or EnvFilter directive (overrides RECRUIT_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Do not start the stand-in sibling services
    #[arg(long)]
    no_loopback: bool,

    /// Upper bound of simulated sibling latency in milliseconds
    #[arg(long, default_value = "25")]
    max_latency_ms: u64,

    /// Seconds between counter log lines in `run`
    #[arg(long, default_value = "30")]
    report_interval: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve until Ctrl+C
    Run,
    /// Perform one lookup and print the result
    Lookup {
        #[arg(value_enum)]
        target: LookupTarget,
        id: String,
    },
    /// Print the Prometheus metrics exposition
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    telemetry.json_logs |= args.json_logs;
    let _telemetry = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = load_bridge_config(args.config.as_deref())?;
    let options = NodeOptions {
        loopback: !args.no_loopback,
        max_latency: Duration::from_millis(args.max_latency_ms),
        ..Default::default()
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Metrics => {
            print!("{}", encode_metrics()?);
            Ok(())
        }
        Command::Lookup { target, id } => {
            let mut node = NodeRuntime::new(config, options)?;
            node.start()?;
            let result = node.lookup(target, &id).await;
            node.shutdown().await;

            let value = result.with_context(|| format!("{target:?} lookup for {id} failed"))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Command::Run => {
            let report_every = Duration::from_secs(args.report_interval.max(1));
            run(config, options, report_every).await
        }
    }
}

async fn run(
    config: recruit_bridge::BridgeConfig,
    options: NodeOptions,
    report_interval: Duration,
) -> Result<()> {
    let mut node = NodeRuntime::new(config, options)?;
    node.start()?;

    info!("Node is running. Press Ctrl+C to stop.");

    let mut ticker = tokio::time::interval(report_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
                break;
            }
            _ = ticker.tick() => {
                let snapshot = node.snapshot();
                info!(
                    pending = snapshot.registry.pending,
                    resolved = snapshot.registry.resolved,
                    removed = snapshot.registry.removed,
                    published = snapshot.publisher.published,
                    unmatched = snapshot.dispatcher.unmatched,
                    malformed = snapshot.dispatcher.malformed,
                    "Bridge counters"
                );
            }
        }
    }

    node.shutdown().await;
    Ok(())
}
