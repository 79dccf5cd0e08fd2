//! Regional channel-plan templates used for the configuration handshake.
//!
//! Three built-in profiles cover the three regulatory duty-cycle regimes the
//! harness exercises: EU868 (per-band budgets from 0.1% to 10%), KR920
//! (band-limited), and AS923 (per-channel budgets).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Duty-cycle override injected into the handshake payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DutyCycleSetting {
    /// Leave the field out; the agent falls back to its default (enabled).
    Absent,
    Enabled,
    Disabled,
}

impl DutyCycleSetting {
    /// Wire representation: `None` omits the field entirely.
    pub fn as_flag(self) -> Option<bool> {
        match self {
            DutyCycleSetting::Absent => None,
            DutyCycleSetting::Enabled => Some(true),
            DutyCycleSetting::Disabled => Some(false),
        }
    }
}

/// Built-in regional profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionProfile {
    Eu868,
    Kr920,
    As923,
}

/// Configuration handshake payload sent in answer to the agent's `version`
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(rename = "JoinEui")]
    pub join_eui: Option<Vec<[u64; 2]>>,
    #[serde(rename = "NetID")]
    pub net_id: Option<Vec<u32>>,
    /// Data-rate table: `[spreading_factor, bandwidth_khz, downlink_only]`.
    #[serde(rename = "DRs")]
    pub drs: Vec<[i32; 3]>,
    pub freq_range: [u64; 2],
    pub hwspec: String,
    pub region: String,
    /// Uplink channels: `[freq_hz, min_dr, max_dr]`.
    pub upchannels: Vec<[u64; 3]>,
    pub sx1301_conf: Vec<JsonValue>,
    #[serde(rename = "MuxTime")]
    pub mux_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duty_cycle_enabled: Option<bool>,
}

const LORA_DRS: [[i32; 3]; 16] = [
    [12, 125, 0],
    [11, 125, 0],
    [10, 125, 0],
    [9, 125, 0],
    [8, 125, 0],
    [7, 125, 0],
    [7, 250, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
];

impl RegionProfile {
    /// Region tag carried in the handshake payload.
    pub fn name(self) -> &'static str {
        match self {
            RegionProfile::Eu868 => "EU863",
            RegionProfile::Kr920 => "KR920",
            RegionProfile::As923 => "AS923",
        }
    }

    /// Regulatory frequency range in Hz.
    pub fn freq_range(self) -> [u64; 2] {
        match self {
            RegionProfile::Eu868 => [863_000_000, 870_000_000],
            RegionProfile::Kr920 => [920_900_000, 923_300_000],
            RegionProfile::As923 => [915_000_000, 928_000_000],
        }
    }

    /// Uplink channel table for the profile.
    pub fn upchannels(self) -> Vec<[u64; 3]> {
        let freqs: &[u64] = match self {
            RegionProfile::Eu868 => &[
                868_100_000,
                868_300_000,
                868_500_000,
                867_100_000,
                867_300_000,
                867_500_000,
            ],
            RegionProfile::Kr920 => &[922_100_000, 922_300_000, 922_500_000],
            RegionProfile::As923 => &[923_200_000, 923_400_000, 923_600_000],
        };
        freqs.iter().map(|&f| [f, 0, 5]).collect()
    }

    /// Build the handshake payload with the duty-cycle override merged in.
    pub fn router_config(self, duty_cycle: DutyCycleSetting, mux_time: f64) -> RouterConfig {
        RouterConfig {
            join_eui: None,
            net_id: None,
            drs: LORA_DRS.to_vec(),
            freq_range: self.freq_range(),
            hwspec: "sx1301/1".to_owned(),
            region: self.name().to_owned(),
            upchannels: self.upchannels(),
            sx1301_conf: self.sx1301_conf(),
            mux_time,
            duty_cycle_enabled: duty_cycle.as_flag(),
        }
    }

    /// Concentrator board configuration. Channels are split across the two
    /// radios so every IF offset stays within the multi-SF demodulator range.
    fn sx1301_conf(self) -> Vec<JsonValue> {
        let channels = self.upchannels();
        let split = channels.len().div_ceil(2);
        let (front, back) = channels.split_at(split);
        let radio_freq = |chunk: &[[u64; 3]]| -> u64 {
            if chunk.is_empty() {
                return 0;
            }
            chunk.iter().map(|c| c[0]).sum::<u64>() / chunk.len() as u64
        };
        let radio0 = radio_freq(front);
        let radio1 = radio_freq(back);

        let mut board = serde_json::Map::new();
        board.insert(
            "radio_0".to_owned(),
            json!({"enable": true, "freq": radio0}),
        );
        board.insert(
            "radio_1".to_owned(),
            json!({"enable": !back.is_empty(), "freq": radio1}),
        );
        board.insert("chan_FSK".to_owned(), json!({"enable": false}));
        board.insert("chan_Lora_std".to_owned(), json!({"enable": false}));
        for (idx, chan) in channels.iter().enumerate() {
            let (radio, center) = if idx < split { (0, radio0) } else { (1, radio1) };
            board.insert(
                format!("chan_multiSF_{idx}"),
                json!({
                    "enable": true,
                    "radio": radio,
                    "if": chan[0] as i64 - center as i64,
                }),
            );
        }
        vec![JsonValue::Object(board)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_cycle_flag_only_present_when_set() {
        let enabled = RegionProfile::Eu868.router_config(DutyCycleSetting::Enabled, 0.0);
        let absent = RegionProfile::Eu868.router_config(DutyCycleSetting::Absent, 0.0);
        assert_eq!(enabled.duty_cycle_enabled, Some(true));
        let encoded = serde_json::to_value(&absent).unwrap();
        assert!(encoded.get("duty_cycle_enabled").is_none());
        assert_eq!(encoded["region"], "EU863");
    }

    #[test]
    fn profiles_cover_their_scenario_frequencies() {
        // Every frequency the scenario suites transmit on must fall inside
        // the profile's regulatory range.
        let in_range = |p: RegionProfile, f: u64| {
            let [lo, hi] = p.freq_range();
            (lo..=hi).contains(&f)
        };
        for f in [864_100_000, 868_100_000, 869_525_000] {
            assert!(in_range(RegionProfile::Eu868, f));
        }
        assert!(in_range(RegionProfile::Kr920, 922_100_000));
        for f in [923_200_000, 923_400_000, 923_600_000] {
            assert!(in_range(RegionProfile::As923, f));
        }
    }

    #[test]
    fn board_conf_keeps_if_offsets_in_demodulator_range() {
        for profile in [RegionProfile::Eu868, RegionProfile::Kr920, RegionProfile::As923] {
            let conf = &profile.sx1301_conf()[0];
            for (key, value) in conf.as_object().unwrap() {
                if key.starts_with("chan_multiSF_") {
                    let offset = value["if"].as_i64().unwrap();
                    assert!(offset.abs() <= 400_000, "{profile:?} {key} offset {offset}");
                }
            }
        }
    }
}
