//! Radio-concentrator mock.
//!
//! Listens on a unix socket inside the scenario workdir. Each accepted
//! connection is one logical radio unit; the first unit gets the uplink
//! generator. Transmit commands from the agent are tallied and never
//! rejected — suppression is the agent's duty-cycle decision, not the
//! mock's.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, WriteHalf};
use tokio::net::UnixStream;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gsr_msg::sim::{decode_sim_message, SimMessage, UplinkFrame};
use gsr_msg::{ParseError, EOS_PORT_MIN};

use crate::context::ScenarioContext;

/// Builder for the concentrator mock.
pub struct ConcentratorSim {
    ctx: Arc<ScenarioContext>,
    socket_path: PathBuf,
}

impl ConcentratorSim {
    pub fn new(ctx: Arc<ScenarioContext>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            socket_path: socket_path.into(),
        }
    }

    /// Bind the unix socket and start accepting radio units.
    pub fn spawn(self) -> anyhow::Result<ConcentratorHandle> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("stale socket at {}", self.socket_path.display()))?;
        }
        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("bind {}", self.socket_path.display()))?;
        info!(path = %self.socket_path.display(), "concentrator sim listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = self.ctx;
        let path = self.socket_path.clone();
        let units = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(accept_loop(listener, ctx, units, shutdown_rx));

        Ok(ConcentratorHandle {
            socket_path: path,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle for the running concentrator mock.
pub struct ConcentratorHandle {
    socket_path: PathBuf,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConcentratorHandle {
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn accept_loop(
    listener: UnixListener,
    ctx: Arc<ScenarioContext>,
    units: Arc<AtomicU32>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let unit = units.fetch_add(1, Ordering::Relaxed);
                        debug!(unit, "radio unit attached");
                        tokio::spawn(unit_session(stream, ctx.clone(), unit, shutdown.clone()));
                    }
                    Err(err) => {
                        warn!(error = %err, "concentrator accept failed");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// One radio-unit connection: the read half tallies transmit commands, the
/// write half belongs to the uplink generator (first unit only; PPS
/// scenarios drive no uplink traffic at all).
async fn unit_session(
    stream: UnixStream,
    ctx: Arc<ScenarioContext>,
    unit: u32,
    shutdown: watch::Receiver<bool>,
) {
    let (read_half, write_half) = tokio::io::split(stream);

    let generator = if unit == 0 && ctx.descriptor().pps.is_none() {
        let ctx = ctx.clone();
        Some(tokio::spawn(async move {
            if let Err(err) = generate_uplinks(ctx, write_half, shutdown).await {
                // A generator fault fails the scenario via the global
                // timeout; it must not take the mock down with it.
                warn!(error = %err, "uplink generation aborted");
            }
        }))
    } else {
        None
    };

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_sim_message(&line) {
                Ok(SimMessage::Tx(tx)) => {
                    ctx.record_tx_event(tx.freq_hz);
                }
                Ok(SimMessage::Rx(_)) => {
                    warn!("agent echoed an rx message; ignoring");
                }
                Err(ParseError::UnknownKind(kind)) => {
                    debug!(kind = %kind, "unknown concentrator message kind");
                }
                Err(err) => {
                    warn!(error = %err, "malformed concentrator message");
                }
            },
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "concentrator read failed");
                break;
            }
        }
    }

    // Connection closed: cancel generation. Aborting twice is harmless.
    if let Some(generator) = generator {
        generator.abort();
    }
    debug!(unit, "radio unit detached");
}

/// Walk the scenario's frequency/interval plan, emitting one synthetic
/// uplink per slot, then a single end-of-scenario sentinel.
async fn generate_uplinks(
    ctx: Arc<ScenarioContext>,
    mut writer: WriteHalf<UnixStream>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let descriptor = ctx.descriptor();
    let plan = descriptor.plan.clone();

    for (idx, pair) in plan.iter().enumerate() {
        let frame = UplinkFrame::new(idx as u32, 1, pair.uplink_hz);
        send_rx(&mut writer, frame).await?;
        debug!(
            fcnt = frame.frame_counter,
            freq_mhz = frame.freq_hz as f64 / 1.0e6,
            "uplink injected"
        );
        tokio::select! {
            _ = tokio::time::sleep(descriptor.interval_at(idx)) => {}
            _ = shutdown.changed() => return Ok(()),
        }
    }

    let last_freq = plan
        .last()
        .map(|pair| pair.uplink_hz)
        .unwrap_or(descriptor.region.freq_range()[0]);
    let sentinel = UplinkFrame::new(plan.len() as u32, EOS_PORT_MIN, last_freq);
    send_rx(&mut writer, sentinel).await?;
    debug!("uplink plan complete, sentinel sent");
    Ok(())
}

async fn send_rx(writer: &mut WriteHalf<UnixStream>, frame: UplinkFrame) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(&SimMessage::Rx(frame.to_rx_packet()))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
