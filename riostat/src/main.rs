//! riostat: iostat-style per-pool rates for a RADOS cluster.
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use riostat::{LogConfig, Sampler, SamplerConfig, init_logging, interval_from_cli};
use riostat_common::EnvParser;
use std::num::NonZeroU64;
use tracing::warn;

const ENV_HELP: &str = "\
Environment:
  RIOSTAT_SOURCE_COMMAND      report command (default: rados df -f json)
  RIOSTAT_FETCH_TIMEOUT_SECS  timeout for one report run in seconds (default: 30)
  RIOSTAT_LOG_LEVEL           stderr log level (default: warn)
  RIOSTAT_LOG_FORMAT          pretty, json or compact (default: compact)
  RIOSTAT_LOG_FILE            also log to this daily rolling file";

#[derive(Parser)]
#[command(
    name = "riostat",
    version,
    about = "Report per-pool I/O rates for a RADOS cluster",
    after_help = ENV_HELP
)]
struct Cli {
    /// Seconds between samples; rates are averaged over this interval [default: 5]
    interval: Option<NonZeroU64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // One parser for logging and sampler settings, so a bad value in either
    // fails startup with the full list.
    let mut env = EnvParser::new();
    let mut log_config = LogConfig::from_env(&mut env, "warn");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    let config = SamplerConfig::load_with(&mut env, interval_from_cli(cli.interval))?;
    let source = config.command_source();
    let stdout = std::io::stdout().lock();

    let mut sampler = Sampler::new(source, stdout, config.interval_secs.value);
    sampler
        .run(shutdown_signal())
        .await
        .with_context(|| format!("sampling stopped after {} cycles", sampler.cycles()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl-C; only fatal errors will stop sampling");
        std::future::pending::<()>().await;
    }
}
