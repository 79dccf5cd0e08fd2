//! GNSS/PPS fault-injection feed.
//!
//! Writes framed fix sentences to the agent's GNSS pipe and out-of-band
//! JSON commands to its command pipe on a timed schedule. The feed performs
//! no validation itself; recovery behaviour is judged through the LNS
//! mock's fast/slow time-sync counters.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gsr_msg::nmea::gga_fix;

/// One step of the feed schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStep {
    /// Emit one fix sentence with the given quality indicator, then wait
    /// one cadence period.
    Fix { quality: u8 },
    /// Emit nothing for the given number of seconds (injected fix loss).
    Gap { seconds: u64 },
    /// Push an alarm command on the out-of-band channel. Does not consume a
    /// cadence period; pairs with the fix of the same tick.
    Alarm { text: String },
}

/// Standard PPS-recovery schedule: a warm-up phase of fixes with paired
/// alarm commands, then a short tail of plain fixes.
pub fn recovery_schedule() -> Vec<FeedStep> {
    let mut steps = Vec::with_capacity(40);
    for i in 0..15 {
        steps.push(FeedStep::Alarm {
            text: format!("CMD test no.{i}"),
        });
        steps.push(FeedStep::Fix { quality: 2 });
    }
    for _ in 0..5 {
        steps.push(FeedStep::Fix { quality: 2 });
    }
    steps
}

/// Timed writer for the GNSS and command pipes.
pub struct GnssFaultFeed {
    steps: Vec<FeedStep>,
    gps_path: PathBuf,
    cmd_path: PathBuf,
    cadence: Duration,
}

impl GnssFaultFeed {
    pub fn new(
        steps: Vec<FeedStep>,
        gps_path: impl Into<PathBuf>,
        cmd_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            steps,
            gps_path: gps_path.into(),
            cmd_path: cmd_path.into(),
            cadence: Duration::from_secs(1),
        }
    }

    /// Override the fix cadence (tests use millisecond schedules).
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Run the schedule to completion on a background task. The returned
    /// handle resolves when every step has been written; the runner uses
    /// that as the judgment point for PPS scenarios.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run().await {
                warn!(error = %err, "gnss feed terminated early");
            }
        })
    }

    async fn run(self) -> anyhow::Result<()> {
        let mut gps = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.gps_path)
            .await
            .with_context(|| format!("open gnss pipe {}", self.gps_path.display()))?;
        let mut cmd = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.cmd_path)
            .await
            .with_context(|| format!("open command pipe {}", self.cmd_path.display()))?;

        for step in &self.steps {
            match step {
                FeedStep::Fix { quality } => {
                    gps.write_all(gga_fix(*quality).as_bytes()).await?;
                    gps.flush().await?;
                    tokio::time::sleep(self.cadence).await;
                }
                FeedStep::Gap { seconds } => {
                    debug!(seconds, "injected fix gap");
                    tokio::time::sleep(Duration::from_secs(*seconds)).await;
                }
                FeedStep::Alarm { text } => {
                    let mut line = json!({"msgtype": "alarm", "text": text}).to_string();
                    line.push('\n');
                    cmd.write_all(line.as_bytes()).await?;
                    cmd.flush().await?;
                }
            }
        }
        info!("gnss feed schedule complete");
        Ok(())
    }
}
