//! LNS control-plane mock.
//!
//! Performs the configuration handshake, schedules downlinks against
//! received uplinks, counts transmit confirmations, serves time-sync, and
//! judges the scenario when the sentinel uplink arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use gsr_common::time::{unix_time_f64, unix_time_micros};
use gsr_msg::mux::{
    decode_station_message, Downlink, MuxsMessage, StationMessage, TimesyncReply, Uplink,
};
use gsr_msg::{ParseError, EOS_PORT_MIN};

use crate::context::{Outcome, ScenarioContext};

const TEST_DEV_EUI: &str = "00-00-00-00-00-00-00-01";
/// RX1 scheduling offset added to the uplink capture-time reference.
const RX1_XTIME_OFFSET: i64 = 1_000_000;

/// Per-connection protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitHandshake,
    Active,
    Done,
}

struct MuxsState {
    ctx: Arc<ScenarioContext>,
    /// Instant of the first time-sync request; anchors the warm-up window.
    first_sync: Mutex<Option<Instant>>,
    /// Sequence numbers of scheduled downlinks awaiting confirmation.
    expected_seqnos: Mutex<Vec<i64>>,
}

/// Builder for the control-plane mock.
pub struct NetworkServerMock {
    ctx: Arc<ScenarioContext>,
}

impl NetworkServerMock {
    pub fn new(ctx: Arc<ScenarioContext>) -> Self {
        Self { ctx }
    }

    /// Bind an ephemeral port and serve the `/router` endpoint.
    pub async fn spawn(self) -> anyhow::Result<MuxsHandle> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "network-server mock listening");

        let state = Arc::new(MuxsState {
            ctx: self.ctx,
            first_sync: Mutex::new(None),
            expected_seqnos: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/router", get(upgrade_handler))
            .with_state(state);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(err) = server.await {
                warn!(error = %err, "network-server mock exited with error");
            }
        });

        Ok(MuxsHandle {
            address: local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle for the running control-plane mock.
pub struct MuxsHandle {
    address: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MuxsHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// URI the discovery mock redirects the agent to.
    pub fn uri(&self) -> String {
        format!("ws://{}/router", self.address)
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(anyhow::Error::from)
    }
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<MuxsState>>,
) -> axum::response::Response {
    ws.on_upgrade(|socket| session(socket, state))
}

async fn session(mut socket: WebSocket, state: Arc<MuxsState>) {
    let mut phase = Phase::AwaitHandshake;

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "control-plane socket error");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                if handle_text(&state, &mut socket, &mut phase, &text)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Message::Ping(payload) => {
                if socket.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Binary(_) | Message::Pong(_) => {}
        }
    }
    debug!("control-plane session ended");
}

/// Dispatch one decoded message. Errors mean the socket is gone.
async fn handle_text(
    state: &Arc<MuxsState>,
    socket: &mut WebSocket,
    phase: &mut Phase,
    text: &str,
) -> Result<(), ()> {
    let message = match decode_station_message(text) {
        Ok(message) => message,
        Err(ParseError::UnknownKind(kind)) => {
            warn!(kind = %kind, "unknown control-plane message kind");
            return Ok(());
        }
        Err(err) => {
            warn!(error = %err, "malformed control-plane message");
            return Ok(());
        }
    };

    if *phase == Phase::Done {
        debug!("message after finalize ignored");
        return Ok(());
    }

    match message {
        StationMessage::Version(version) => {
            info!(
                station = version.station.as_deref().unwrap_or("?"),
                protocol = version.protocol.unwrap_or(0),
                "handshake request"
            );
            let descriptor = state.ctx.descriptor();
            let config = descriptor
                .region
                .router_config(descriptor.duty_cycle, unix_time_f64());
            send(socket, &MuxsMessage::RouterConfig(config)).await?;
            *phase = Phase::Active;
        }
        StationMessage::Updf(uplink) => {
            if *phase != Phase::Active {
                warn!("uplink before handshake completed");
                return Ok(());
            }
            state.ctx.record_uplink();
            info!(
                fcnt = uplink.fcnt,
                port = uplink.fport,
                freq_mhz = uplink.freq_hz as f64 / 1.0e6,
                "uplink notification"
            );
            if uplink.fport >= EOS_PORT_MIN {
                judge(state);
                *phase = Phase::Done;
            } else {
                let downlink = build_downlink(state, &uplink);
                state.expected_seqnos.lock().push(downlink.seqno);
                send(socket, &MuxsMessage::Dnmsg(downlink)).await?;
            }
        }
        StationMessage::Dntxed(confirmation) => {
            state.ctx.record_confirmation(confirmation.seqno);
            let expected = state.expected_seqnos.lock().contains(&confirmation.seqno);
            if !expected {
                warn!(seqno = confirmation.seqno, "confirmation for unscheduled downlink");
            }
        }
        StationMessage::Timesync(request) => {
            let reply = timesync_reply(state, request.txtime, request.gpstime).await;
            send(socket, &MuxsMessage::Timesync(reply)).await?;
        }
        StationMessage::Alarm(alarm) => {
            // Accepted and logged only; never gates the verdict.
            debug!(text = %alarm.text, "alarm from agent");
        }
    }
    Ok(())
}

/// Compare the confirmation counter against the scenario's accepted band
/// and finalize. First finalize wins; later sentinels are ignored upstream.
fn judge(state: &Arc<MuxsState>) {
    let descriptor = state.ctx.descriptor();
    let counts = state.ctx.counts();
    let (min, max) = (
        *descriptor.expected_tx.start(),
        *descriptor.expected_tx.end(),
    );
    let reason = format!(
        "{}: {} transmissions confirmed (expected {min}-{max})",
        descriptor.id, counts.confirmations
    );
    let outcome = if descriptor.expected_tx.contains(&counts.confirmations) {
        Outcome::pass(reason)
    } else {
        Outcome::fail(reason)
    };
    state.ctx.finalize(outcome);
}

fn build_downlink(state: &Arc<MuxsState>, uplink: &Uplink) -> Downlink {
    let freq = state
        .ctx
        .descriptor()
        .downlink_freq(uplink.fcnt as usize);
    Downlink {
        dev_eui: TEST_DEV_EUI.to_owned(),
        device_class: 0,
        diid: i64::from(uplink.fcnt),
        pdu: "0A0B0C0D0E0F".to_owned(),
        priority: 0,
        rx_delay: 1,
        rx1_dr: 5,
        rx1_freq: freq,
        xtime: uplink.upinfo.xtime + RX1_XTIME_OFFSET,
        seqno: i64::from(uplink.fcnt),
        mux_time: unix_time_f64(),
        rctx: uplink.upinfo.rctx,
    }
}

/// Answer a time-sync request. In PPS scenarios the reply is held back for
/// `sync_delay` during the warm-up window anchored at the first request;
/// afterwards replies are immediate and counted as fast.
async fn timesync_reply(state: &Arc<MuxsState>, txtime: i64, gpstime: Option<i64>) -> TimesyncReply {
    if let Some(pps) = &state.ctx.descriptor().pps {
        let first = {
            let mut slot = state.first_sync.lock();
            *slot.get_or_insert_with(Instant::now)
        };
        if first.elapsed() < pps.warmup {
            debug!("delaying time-sync reply inside warm-up window");
            tokio::time::sleep(pps.sync_delay).await;
        } else {
            let count = state.ctx.record_fast_sync();
            debug!(count, "fast time-sync reply");
        }
    }
    TimesyncReply {
        txtime,
        gpstime,
        servertime: unix_time_micros(),
    }
}

async fn send(socket: &mut WebSocket, message: &MuxsMessage) -> Result<(), ()> {
    let Ok(text) = serde_json::to_string(message) else {
        warn!("failed to serialise control-plane message");
        return Ok(());
    };
    socket.send(Message::Text(text)).await.map_err(|err| {
        debug!(error = %err, "control-plane send failed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use gsr_msg::regions::{DutyCycleSetting, RegionProfile};
    use serde_json::{json, Value};
    use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

    use crate::context::{FreqPair, PpsPlan, ScenarioDescriptor};

    fn descriptor(expected: std::ops::RangeInclusive<u32>, pps: Option<PpsPlan>) -> ScenarioDescriptor {
        ScenarioDescriptor {
            id: "muxs-test".to_owned(),
            region: RegionProfile::Eu868,
            duty_cycle: DutyCycleSetting::Disabled,
            plan: vec![
                FreqPair::same(864_100_000),
                FreqPair::same(868_100_000),
            ],
            intervals: vec![Duration::from_millis(10)],
            expected_tx: expected,
            pps,
            description: String::new(),
        }
    }

    async fn connect(handle: &MuxsHandle) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let (socket, _) = connect_async(&handle.uri()).await.unwrap();
        socket
    }

    fn updf(fcnt: u32, fport: u8) -> String {
        json!({
            "msgtype": "updf",
            "FCnt": fcnt,
            "FPort": fport,
            "Freq": 864_100_000u64,
            "upinfo": {"rctx": 7, "xtime": 500_000}
        })
        .to_string()
    }

    #[tokio::test]
    async fn handshake_then_downlink_then_judgment() {
        let ctx = ScenarioContext::new(descriptor(1..=1, None));
        let handle = NetworkServerMock::new(ctx.clone()).spawn().await.unwrap();
        let mut socket = connect(&handle).await;

        // Handshake: version -> router_config with the duty-cycle override.
        socket
            .send(WsMessage::Text(
                json!({"msgtype": "version", "station": "2.0.6", "protocol": 2}).to_string(),
            ))
            .await
            .unwrap();
        let WsMessage::Text(reply) = socket.next().await.unwrap().unwrap() else {
            panic!("expected text reply");
        };
        let config: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(config["msgtype"], "router_config");
        assert_eq!(config["duty_cycle_enabled"], json!(false));
        assert_eq!(config["region"], "EU863");

        // Regular uplink -> downlink on the plan's slot-0 frequency.
        socket.send(WsMessage::Text(updf(0, 1))).await.unwrap();
        let WsMessage::Text(reply) = socket.next().await.unwrap().unwrap() else {
            panic!("expected downlink");
        };
        let dn: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(dn["msgtype"], "dnmsg");
        assert_eq!(dn["RX1Freq"], json!(864_100_000));
        assert_eq!(dn["seqno"], json!(0));
        assert_eq!(dn["xtime"], json!(1_500_000));

        // Confirmation, then the sentinel triggers a passing judgment.
        socket
            .send(WsMessage::Text(json!({"msgtype": "dntxed", "seqno": 0}).to_string()))
            .await
            .unwrap();
        socket.send(WsMessage::Text(updf(1, 3))).await.unwrap();

        ctx.finalized().await;
        let outcome = ctx.outcome().unwrap();
        assert!(outcome.pass, "unexpected outcome: {outcome:?}");
        assert_eq!(ctx.counts().confirmations, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sentinel_with_count_outside_band_fails() {
        let ctx = ScenarioContext::new(descriptor(2..=3, None));
        let handle = NetworkServerMock::new(ctx.clone()).spawn().await.unwrap();
        let mut socket = connect(&handle).await;

        socket
            .send(WsMessage::Text(json!({"msgtype": "version"}).to_string()))
            .await
            .unwrap();
        let _config = socket.next().await.unwrap().unwrap();

        socket.send(WsMessage::Text(updf(0, 3))).await.unwrap();
        ctx.finalized().await;
        let outcome = ctx.outcome().unwrap();
        assert!(!outcome.pass);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_kinds_do_not_break_the_session() {
        let ctx = ScenarioContext::new(descriptor(0..=0, None));
        let handle = NetworkServerMock::new(ctx.clone()).spawn().await.unwrap();
        let mut socket = connect(&handle).await;

        socket
            .send(WsMessage::Text(json!({"msgtype": "rmtsh"}).to_string()))
            .await
            .unwrap();
        socket
            .send(WsMessage::Text(json!({"msgtype": "version"}).to_string()))
            .await
            .unwrap();
        let WsMessage::Text(reply) = socket.next().await.unwrap().unwrap() else {
            panic!("expected router_config after unknown kind");
        };
        assert!(reply.contains("router_config"));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn timesync_warmup_delays_then_counts_fast_replies() {
        let pps = PpsPlan {
            warmup: Duration::from_millis(80),
            sync_delay: Duration::from_millis(40),
            ..PpsPlan::default()
        };
        let ctx = ScenarioContext::new(descriptor(0..=0, Some(pps)));
        let handle = NetworkServerMock::new(ctx.clone()).spawn().await.unwrap();
        let mut socket = connect(&handle).await;

        socket
            .send(WsMessage::Text(json!({"msgtype": "version"}).to_string()))
            .await
            .unwrap();
        let _config = socket.next().await.unwrap().unwrap();

        let sync = |txtime: i64| json!({"msgtype": "timesync", "txtime": txtime}).to_string();

        // Inside the warm-up window: reply is delayed, not counted.
        let started = Instant::now();
        socket.send(WsMessage::Text(sync(1))).await.unwrap();
        let WsMessage::Text(reply) = socket.next().await.unwrap().unwrap() else {
            panic!("expected timesync reply");
        };
        assert!(started.elapsed() >= Duration::from_millis(40));
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["txtime"], json!(1));
        assert!(reply["servertime"].as_i64().unwrap() > 0);
        assert_eq!(ctx.counts().fast_syncs, 0);

        // Past the warm-up window: fast reply, counted.
        tokio::time::sleep(Duration::from_millis(100)).await;
        socket.send(WsMessage::Text(sync(2))).await.unwrap();
        let _ = socket.next().await.unwrap().unwrap();
        assert_eq!(ctx.counts().fast_syncs, 1);

        handle.shutdown().await.unwrap();
    }
}
