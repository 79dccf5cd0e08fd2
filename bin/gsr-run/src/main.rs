//! Scenario runner CLI.
//!
//! Selects one scenario from the built-in catalog (flag or `DC_TEST`
//! environment variable), runs it against the configured agent binary, and
//! prints a single PASS/FAIL line. The process exit code carries the
//! verdict so CI wrappers need no output parsing.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use gsr_common::config::HarnessConfig;
use gsr_common::logging::{init_tracing, LogFormat};
use gsr_harness::scenarios;
use gsr_harness::ScenarioRunner;

#[derive(Debug, Parser)]
#[command(author, version, about = "Station regression scenario runner", long_about = None)]
struct Cli {
    /// Scenario identifier to run (see --list).
    #[arg(short, long, env = "DC_TEST")]
    scenario: Option<String>,

    /// List available scenarios and exit.
    #[arg(long)]
    list: bool,

    /// Override the global per-scenario timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Override the agent binary path (otherwise STATION_BIN / TEST_VARIANT).
    #[arg(long, value_name = "PATH")]
    agent: Option<std::path::PathBuf>,

    /// Emit structured JSON diagnostics instead of human-readable logs.
    #[arg(long)]
    json: bool,
}

fn list_catalog() {
    for scenario in scenarios::catalog() {
        println!("{:<20} {}", scenario.id, scenario.description);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json {
        LogFormat::StructuredJson
    } else {
        LogFormat::Pretty
    };
    init_tracing("gsr-run", format)?;

    if cli.list {
        list_catalog();
        return Ok(());
    }

    let Some(id) = cli.scenario else {
        bail!("no scenario selected; pass --scenario <ID>, set DC_TEST, or use --list");
    };
    let Some(descriptor) = scenarios::find(&id) else {
        bail!("unknown scenario {id:?}; use --list for the catalog");
    };

    let mut config = HarnessConfig::from_env();
    if let Some(secs) = cli.timeout {
        config.global_timeout = Duration::from_secs(secs);
    }
    if let Some(agent) = cli.agent {
        config.agent_binary = agent;
    }

    let runner = ScenarioRunner::new(config);
    let report = runner.run(descriptor).await?;

    println!(
        "{} {}: {} [confirmations={} tx_events={} uplinks={} fast_syncs={}]",
        report.verdict,
        report.scenario_id,
        report.reason,
        report.counts.confirmations,
        report.counts.tx_events,
        report.counts.uplinks,
        report.counts.fast_syncs,
    );

    if report.verdict.is_pass() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
