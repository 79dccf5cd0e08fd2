//! Radio-concentrator link messages (newline-delimited JSON over a unix
//! socket).
//!
//! The harness injects receptions (`rx`) and observes transmit commands
//! (`tx`). The agent may emit additional kinds during bring-up; those
//! surface as [`ParseError::UnknownKind`] diagnostics and are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::frame::build_uplink_frame;
use crate::ParseError;

const SIM_KINDS: &[&str] = &["rx", "tx"];

/// Message exchanged on the concentrator control connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum SimMessage {
    /// Synthetic radio reception pushed to the agent.
    Rx(RxPacket),
    /// Transmit command issued by the agent.
    Tx(TxPacket),
}

/// Decode one concentrator-link message.
pub fn decode_sim_message(text: &str) -> Result<SimMessage, ParseError> {
    crate::decode_tagged(text, SIM_KINDS)
}

/// Wire form of an injected reception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxPacket {
    #[serde(default)]
    pub unit: u8,
    pub freq_hz: u64,
    pub sf: u8,
    pub bw_khz: u32,
    /// LoRaWAN frame as uppercase hex.
    pub pdu: String,
}

/// Wire form of an observed transmit command. Only the frequency matters to
/// the oracle; everything else is retained for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxPacket {
    pub freq_hz: u64,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Generator-owned description of one synthetic uplink.
///
/// The frame counter increments by exactly one per emission; a port at or
/// above [`crate::EOS_PORT_MIN`] marks the end-of-scenario sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkFrame {
    pub frame_counter: u32,
    pub port: u8,
    pub freq_hz: u64,
    pub spreading_factor: u8,
    pub bw_khz: u32,
}

impl UplinkFrame {
    /// Standard test modulation: SF7 / 125 kHz.
    pub fn new(frame_counter: u32, port: u8, freq_hz: u64) -> Self {
        Self {
            frame_counter,
            port,
            freq_hz,
            spreading_factor: 7,
            bw_khz: 125,
        }
    }

    /// Serialize into the wire packet, building the LoRaWAN PDU.
    pub fn to_rx_packet(self) -> RxPacket {
        RxPacket {
            unit: 0,
            freq_hz: self.freq_hz,
            sf: self.spreading_factor,
            bw_khz: self.bw_khz,
            pdu: hex::encode_upper(build_uplink_frame(self.frame_counter, self.port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_packet_round_trips_through_the_tagged_codec() {
        let packet = UplinkFrame::new(3, 1, 867_100_000).to_rx_packet();
        let line = serde_json::to_string(&SimMessage::Rx(packet.clone())).unwrap();
        assert!(line.contains("\"msgtype\":\"rx\""));
        let decoded = decode_sim_message(&line).unwrap();
        assert_eq!(decoded, SimMessage::Rx(packet));
    }

    #[test]
    fn tx_packet_tolerates_agent_extras() {
        let line = r#"{"msgtype":"tx","freq_hz":869525000,"rps":[5,125],"txpow":14}"#;
        let SimMessage::Tx(tx) = decode_sim_message(line).unwrap() else {
            panic!("expected tx");
        };
        assert_eq!(tx.freq_hz, 869_525_000);
        assert!(tx.extra.contains_key("txpow"));
    }

    #[test]
    fn pdu_encodes_frame_counter_and_port() {
        let packet = UplinkFrame::new(5, 3, 864_100_000).to_rx_packet();
        let bytes = hex::decode(&packet.pdu).unwrap();
        assert_eq!(bytes[6], 5); // FCnt low byte
        assert_eq!(bytes[8], 3); // FPort sentinel
    }
}
