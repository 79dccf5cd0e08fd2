//! Control-plane messages exchanged with the agent once it has been
//! redirected to the LNS mock.
//!
//! Inbound traffic ([`StationMessage`]) and outbound traffic
//! ([`MuxsMessage`]) are both tagged by the `msgtype` field. Field names
//! follow the agent's wire convention (`FCnt`, `RX1Freq`, ...), so several
//! structs carry serde renames rather than Rust-style names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::regions::RouterConfig;
use crate::ParseError;

const STATION_KINDS: &[&str] = &["version", "updf", "dntxed", "timesync", "alarm"];

/// Message received from the agent on the control-plane socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum StationMessage {
    Version(VersionInfo),
    Updf(Uplink),
    Dntxed(TxConfirmation),
    Timesync(TimesyncRequest),
    Alarm(Alarm),
}

/// Decode one control-plane message, distinguishing unknown kinds from
/// malformed payloads.
pub fn decode_station_message(text: &str) -> Result<StationMessage, ParseError> {
    crate::decode_tagged(text, STATION_KINDS)
}

/// Handshake request identifying the agent build.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub protocol: Option<u32>,
    #[serde(default)]
    pub features: Option<String>,
}

/// Uplink notification relayed by the agent after a radio reception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uplink {
    #[serde(rename = "FCnt")]
    pub fcnt: u32,
    #[serde(rename = "FPort")]
    pub fport: u8,
    #[serde(rename = "Freq")]
    pub freq_hz: u64,
    #[serde(rename = "DR", default)]
    pub dr: Option<u8>,
    pub upinfo: UplinkInfo,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Reception context attached to an uplink notification. `xtime` is the
/// concentrator capture-time reference downlinks are scheduled against.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UplinkInfo {
    #[serde(default)]
    pub rctx: i64,
    #[serde(default)]
    pub xtime: i64,
    #[serde(default)]
    pub gpstime: i64,
    #[serde(default)]
    pub rssi: f64,
    #[serde(default)]
    pub snr: f64,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Transmit-confirmation event reported after a downlink actually aired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxConfirmation {
    pub seqno: i64,
    #[serde(default)]
    pub diid: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Time-sync request; the reply echoes `txtime` and adds `servertime`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimesyncRequest {
    #[serde(default)]
    pub txtime: i64,
    #[serde(default)]
    pub gpstime: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Out-of-band alarm text from the agent. Logged only, never gates a
/// verdict.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Alarm {
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Message sent to the agent on the control-plane socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "snake_case")]
pub enum MuxsMessage {
    RouterConfig(RouterConfig),
    Dnmsg(Downlink),
    Timesync(TimesyncReply),
}

/// Class-A downlink command scheduled against a received uplink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Downlink {
    #[serde(rename = "DevEui")]
    pub dev_eui: String,
    /// Device class; 0 selects class A.
    #[serde(rename = "dC")]
    pub device_class: u8,
    /// Delivery identifier, mirrored back in transmit confirmations.
    pub diid: i64,
    /// Payload as uppercase hex.
    pub pdu: String,
    pub priority: u8,
    #[serde(rename = "RxDelay")]
    pub rx_delay: u8,
    #[serde(rename = "RX1DR")]
    pub rx1_dr: u8,
    #[serde(rename = "RX1Freq")]
    pub rx1_freq: u64,
    /// Capture-time reference of the triggering uplink plus the RX1 offset.
    pub xtime: i64,
    pub seqno: i64,
    #[serde(rename = "MuxTime")]
    pub mux_time: f64,
    pub rctx: i64,
}

/// Time-sync answer carrying the server clock in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesyncReply {
    pub txtime: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpstime: Option<i64>,
    pub servertime: i64,
}
