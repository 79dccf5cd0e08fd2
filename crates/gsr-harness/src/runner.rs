//! Scenario orchestration.
//!
//! [`ScenarioRunner::run`] materializes one descriptor: fresh workdir and
//! [`ScenarioContext`], mocks started bottom-up (control plane, discovery,
//! concentrator, optional GNSS feed), agent launched, then a four-way race
//! decides the run. Teardown is unconditional.

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use gsr_common::config::HarnessConfig;
use gsr_mocks::concentrator::ConcentratorSim;
use gsr_mocks::context::{Outcome, ScenarioContext, ScenarioCounts, ScenarioDescriptor};
use gsr_mocks::discovery::DiscoveryServer;
use gsr_mocks::gnss::GnssFaultFeed;
use gsr_mocks::muxs::NetworkServerMock;

use crate::process::AgentProcess;

/// Final judgment of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Outcome plus diagnostics for one scenario run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario_id: String,
    pub verdict: Verdict,
    pub reason: String,
    pub counts: ScenarioCounts,
}

/// Executes scenarios against a configured agent binary.
pub struct ScenarioRunner {
    config: HarnessConfig,
}

impl ScenarioRunner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run one scenario to a verdict.
    pub async fn run(&self, descriptor: ScenarioDescriptor) -> anyhow::Result<RunReport> {
        let scenario_id = descriptor.id.clone();
        let span = info_span!("scenario", id = %scenario_id);
        self.run_inner(descriptor).instrument(span).await
    }

    async fn run_inner(&self, descriptor: ScenarioDescriptor) -> anyhow::Result<RunReport> {
        let scenario_id = descriptor.id.clone();
        let pps = descriptor.pps.clone();
        info!(description = %descriptor.description, "scenario starting");

        let workdir = tempfile::tempdir().context("create scenario workdir")?;
        let ctx = ScenarioContext::new(descriptor);

        let muxs = NetworkServerMock::new(ctx.clone()).spawn().await?;
        let discovery = DiscoveryServer::new(muxs.uri()).spawn().await?;
        tokio::fs::write(workdir.path().join("tc.uri"), discovery.uri())
            .await
            .context("write tc.uri pointer")?;
        let concentrator = ConcentratorSim::new(ctx.clone(), workdir.path().join("spidev")).spawn()?;

        let mut feed_task: Option<JoinHandle<()>> = pps.as_ref().map(|plan| {
            GnssFaultFeed::new(
                plan.steps.clone(),
                workdir.path().join("gps.fifo"),
                workdir.path().join("cmd.fifo"),
            )
            .spawn()
        });

        let agent = AgentProcess::launch(&self.config, workdir.path());
        match agent {
            Ok(mut agent) => {
                self.race(&ctx, &mut agent, &mut feed_task).await;
                agent.terminate().await?;
            }
            Err(err) => {
                ctx.finalize(Outcome::fail(format!("agent launch failed: {err:#}")));
            }
        }

        if let Some(task) = feed_task.take() {
            task.abort();
        }
        concentrator.shutdown().await?;
        muxs.shutdown().await?;
        discovery.shutdown().await?;

        let outcome = ctx
            .outcome()
            .unwrap_or_else(|| Outcome::fail("scenario ended without judgment"));
        let counts = ctx.counts();
        let report = RunReport {
            scenario_id,
            verdict: if outcome.pass { Verdict::Pass } else { Verdict::Fail },
            reason: outcome.reason,
            counts,
        };
        info!(
            verdict = %report.verdict,
            reason = %report.reason,
            confirmations = counts.confirmations,
            tx_events = counts.tx_events,
            "scenario finished"
        );
        Ok(report)
    }

    /// Race the scenario to completion. Exactly one branch finalizes; the
    /// finalize slot itself arbitrates any photo finish.
    async fn race(
        &self,
        ctx: &ScenarioContext,
        agent: &mut AgentProcess,
        feed_task: &mut Option<JoinHandle<()>>,
    ) {
        tokio::select! {
            _ = ctx.finalized() => {}
            status = agent.wait() => {
                let status = status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|err| format!("wait failed: {err}"));
                ctx.finalize(Outcome::fail(format!(
                    "agent exited before scenario completion ({status})"
                )));
            }
            _ = feed_complete(feed_task) => {
                self.judge_pps(ctx);
            }
            _ = tokio::time::sleep(self.config.global_timeout) => {
                self.judge_on_timeout(ctx);
            }
        }
    }

    /// PPS verdict once the feed schedule has been written in full.
    fn judge_pps(&self, ctx: &ScenarioContext) {
        let counts = ctx.counts();
        let min = ctx
            .descriptor()
            .pps
            .as_ref()
            .map(|plan| plan.min_fast_syncs)
            .unwrap_or(1);
        let reason = format!(
            "{} fast time-sync replies after feed completion (needed >= {min})",
            counts.fast_syncs
        );
        let outcome = if counts.fast_syncs >= min {
            Outcome::pass(reason)
        } else {
            Outcome::fail(reason)
        };
        ctx.finalize(outcome);
    }

    /// Count-based fallback when no explicit finalize arrived in time. A
    /// scenario whose counts already sit inside the accepted band still
    /// passes; anything else is a timeout failure.
    fn judge_on_timeout(&self, ctx: &ScenarioContext) {
        let counts = ctx.counts();
        let descriptor = ctx.descriptor();
        warn!(
            timeout_secs = self.config.global_timeout.as_secs(),
            confirmations = counts.confirmations,
            "global timeout reached"
        );
        let reason = format!(
            "timeout after {:?}: {} transmissions confirmed (expected {}-{})",
            self.config.global_timeout,
            counts.confirmations,
            descriptor.expected_tx.start(),
            descriptor.expected_tx.end(),
        );
        let outcome = if descriptor.pps.is_none() && ctx.counts_within_expectation() {
            Outcome::pass(reason)
        } else {
            Outcome::fail(reason)
        };
        ctx.finalize(outcome);
    }
}

/// Resolves when the GNSS feed schedule completes; pends forever when the
/// scenario has no feed.
async fn feed_complete(task: &mut Option<JoinHandle<()>>) {
    match task {
        Some(handle) => {
            let _ = handle.await;
        }
        None => std::future::pending().await,
    }
}
