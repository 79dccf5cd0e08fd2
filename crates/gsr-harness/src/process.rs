//! Agent subprocess lifecycle.
//!
//! The agent is opaque: the harness starts it inside the scenario workdir,
//! forwards the PPS thresholds through its environment, and later tears it
//! down. Its stdout/stderr pass through untouched so a failing run keeps
//! the agent's own log.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use gsr_common::config::{HarnessConfig, ENV_PPS_RESET_FAIL_THRES, ENV_PPS_RESET_THRES};

/// Fixed argument contract: foreground, state in the working directory.
const BASE_ARGS: [&str; 3] = ["-p", "--temp", "."];

/// A running agent under test.
pub struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    /// Launch the agent inside `workdir`.
    pub fn launch(config: &HarnessConfig, workdir: &Path) -> anyhow::Result<Self> {
        let mut command = Command::new(&config.agent_binary);
        command
            .current_dir(workdir)
            .args(BASE_ARGS)
            .args(&config.agent_args)
            .env(ENV_PPS_RESET_THRES, config.pps_reset_thres.to_string())
            .env(
                ENV_PPS_RESET_FAIL_THRES,
                config.pps_reset_fail_thres.to_string(),
            )
            .kill_on_drop(true);

        let child = command.spawn().with_context(|| {
            format!("spawn agent binary {}", config.agent_binary.display())
        })?;
        info!(
            binary = %config.agent_binary.display(),
            pid = child.id().unwrap_or(0),
            workdir = %workdir.display(),
            "agent started"
        );
        Ok(Self { child })
    }

    /// Wait for the agent to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the agent and reap it. Safe to call after the agent has already
    /// exited.
    pub async fn terminate(mut self) -> anyhow::Result<()> {
        if let Err(err) = self.child.start_kill() {
            // InvalidInput means the child was already reaped.
            debug!(error = %err, "agent kill skipped");
        }
        let status = self.child.wait().await.context("reap agent")?;
        debug!(%status, "agent terminated");
        Ok(())
    }
}
