//! Built-in scenario catalog.
//!
//! The tables mirror the regulatory structure of each region: EU868 tracks
//! per-band budgets (0.1% / 1% / 10%), AS923 tracks per-channel budgets,
//! and the duty-cycle-option suite exercises the `duty_cycle_enabled`
//! handshake flag across regions. Expected counts are bands, not exact
//! values; timing jitter legitimately moves results by one frame.

use std::time::Duration;

use gsr_mocks::context::{FreqPair, PpsPlan, ScenarioDescriptor};
use gsr_mocks::gnss::recovery_schedule;
use gsr_msg::regions::{DutyCycleSetting, RegionProfile};

/// EU868 band P (869.4–869.65 MHz): 10% duty cycle.
pub const EU_BAND_10PCT: u64 = 869_525_000;
/// EU868 band M (868.0–868.6 MHz): 1% duty cycle.
pub const EU_BAND_1PCT: u64 = 868_100_000;
/// EU868 band K (863–865 MHz): 0.1% duty cycle.
pub const EU_BAND_01PCT: u64 = 864_100_000;

/// AS923 test channels, each with its own 10% budget.
pub const AS_CH1: u64 = 923_200_000;
pub const AS_CH2: u64 = 923_400_000;
pub const AS_CH3: u64 = 923_600_000;

/// KR920 test channel.
pub const KR_CH1: u64 = 922_100_000;

fn seconds(values: &[f64]) -> Vec<Duration> {
    values.iter().map(|s| Duration::from_secs_f64(*s)).collect()
}

fn repeat_freq(hz: u64, count: usize) -> Vec<FreqPair> {
    vec![FreqPair::same(hz); count]
}

#[allow(clippy::too_many_arguments)]
fn scenario(
    id: &str,
    region: RegionProfile,
    duty_cycle: DutyCycleSetting,
    plan: Vec<FreqPair>,
    intervals: Vec<Duration>,
    expected_tx: std::ops::RangeInclusive<u32>,
    description: &str,
) -> ScenarioDescriptor {
    ScenarioDescriptor {
        id: id.to_owned(),
        region,
        duty_cycle,
        plan,
        intervals,
        expected_tx,
        pps: None,
        description: description.to_owned(),
    }
}

/// EU868 per-band duty-cycle suite.
pub fn eu868_suite() -> Vec<ScenarioDescriptor> {
    vec![
        scenario(
            "eu868-disabled",
            RegionProfile::Eu868,
            DutyCycleSetting::Disabled,
            repeat_freq(EU_BAND_01PCT, 5),
            seconds(&[1.5; 5]),
            4..=5,
            "duty_cycle_enabled: false - all frames pass",
        ),
        scenario(
            "eu868-band-10pct",
            RegionProfile::Eu868,
            DutyCycleSetting::Absent,
            repeat_freq(EU_BAND_10PCT, 5),
            seconds(&[2.0; 5]),
            4..=5,
            "10% band P (869.525MHz) - rapid TX allowed",
        ),
        scenario(
            "eu868-band-1pct",
            RegionProfile::Eu868,
            DutyCycleSetting::Absent,
            repeat_freq(EU_BAND_1PCT, 5),
            seconds(&[2.0; 5]),
            1..=3,
            "1% band M (868.1MHz) - some frames blocked",
        ),
        scenario(
            "eu868-band-01pct",
            RegionProfile::Eu868,
            DutyCycleSetting::Absent,
            repeat_freq(EU_BAND_01PCT, 5),
            seconds(&[2.0; 5]),
            1..=2,
            "0.1% band K (864.1MHz) - heavy blocking",
        ),
        scenario(
            "eu868-multiband",
            RegionProfile::Eu868,
            DutyCycleSetting::Absent,
            vec![
                FreqPair::same(EU_BAND_10PCT),
                FreqPair::same(EU_BAND_1PCT),
                FreqPair::same(EU_BAND_01PCT),
                FreqPair::same(EU_BAND_10PCT),
                FreqPair::same(EU_BAND_1PCT),
            ],
            seconds(&[2.0; 5]),
            3..=5,
            "multi-band - each band has a separate DC budget",
        ),
        scenario(
            "eu868-window",
            RegionProfile::Eu868,
            DutyCycleSetting::Absent,
            repeat_freq(EU_BAND_10PCT, 5),
            seconds(&[1.0, 1.0, 2.5, 2.0, 2.0]),
            3..=5,
            "window test - exhaust DC, wait for recovery",
        ),
    ]
}

/// AS923 per-channel duty-cycle suite.
pub fn as923_suite() -> Vec<ScenarioDescriptor> {
    vec![
        scenario(
            "as923-disabled",
            RegionProfile::As923,
            DutyCycleSetting::Disabled,
            repeat_freq(AS_CH1, 5),
            seconds(&[2.0; 5]),
            4..=5,
            "duty_cycle_enabled: false - all frames pass",
        ),
        scenario(
            "as923-single-ch",
            RegionProfile::As923,
            DutyCycleSetting::Absent,
            repeat_freq(AS_CH1, 5),
            seconds(&[2.0; 5]),
            4..=5,
            "single channel 10% DC - rapid TX allowed",
        ),
        scenario(
            "as923-multi-ch",
            RegionProfile::As923,
            DutyCycleSetting::Absent,
            vec![
                FreqPair::same(AS_CH1),
                FreqPair::same(AS_CH2),
                FreqPair::same(AS_CH3),
                FreqPair::same(AS_CH1),
                FreqPair::same(AS_CH2),
            ],
            seconds(&[2.0; 5]),
            4..=5,
            "multi-channel - separate DC budgets",
        ),
        scenario(
            "as923-window",
            RegionProfile::As923,
            DutyCycleSetting::Absent,
            repeat_freq(AS_CH1, 5),
            seconds(&[1.0, 1.0, 1.0, 2.0, 2.0]),
            3..=5,
            "window test - exhaust channel DC, wait, recover",
        ),
    ]
}

/// Handshake-flag suite: six uplinks at a relaxed pace on one frequency;
/// the verdict hinges purely on whether enforcement was switched off.
pub fn duty_cycle_option_suite() -> Vec<ScenarioDescriptor> {
    let eu = |id: &str, dc, expected, desc: &str| {
        scenario(
            id,
            RegionProfile::Eu868,
            dc,
            repeat_freq(867_100_000, 6),
            seconds(&[2.5; 6]),
            expected,
            desc,
        )
    };
    let kr = |id: &str, dc, expected, desc: &str| {
        scenario(
            id,
            RegionProfile::Kr920,
            dc,
            repeat_freq(KR_CH1, 6),
            seconds(&[2.5; 6]),
            expected,
            desc,
        )
    };
    vec![
        eu(
            "dc-eu868-disabled",
            DutyCycleSetting::Disabled,
            5..=6,
            "EU868 with duty_cycle_enabled: false",
        ),
        eu(
            "dc-eu868-enabled",
            DutyCycleSetting::Enabled,
            0..=1,
            "EU868 with duty_cycle_enabled: true",
        ),
        eu(
            "dc-eu868-default",
            DutyCycleSetting::Absent,
            0..=1,
            "EU868 with no duty_cycle setting (default enabled)",
        ),
        kr(
            "dc-kr920-disabled",
            DutyCycleSetting::Disabled,
            5..=6,
            "KR920 with duty_cycle_enabled: false",
        ),
        kr(
            "dc-kr920-default",
            DutyCycleSetting::Absent,
            0..=1,
            "KR920 with no duty_cycle setting (default enabled)",
        ),
    ]
}

/// GNSS/PPS recovery scenario: no uplink traffic, verdict from the
/// fast-time-sync counter once the feed schedule has completed.
pub fn pps_recovery() -> ScenarioDescriptor {
    ScenarioDescriptor {
        id: "pps-recovery".to_owned(),
        region: RegionProfile::Eu868,
        duty_cycle: DutyCycleSetting::Absent,
        plan: Vec::new(),
        intervals: Vec::new(),
        expected_tx: 0..=0,
        pps: Some(PpsPlan {
            steps: recovery_schedule(),
            ..PpsPlan::default()
        }),
        description: "PPS recovery - timing sync resumes after warm-up jitter".to_owned(),
    }
}

/// Every built-in scenario.
pub fn catalog() -> Vec<ScenarioDescriptor> {
    let mut all = eu868_suite();
    all.extend(as923_suite());
    all.extend(duty_cycle_option_suite());
    all.push(pps_recovery());
    all
}

/// Look up one scenario by identifier.
pub fn find(id: &str) -> Option<ScenarioDescriptor> {
    catalog().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_unique() {
        let all = catalog();
        let mut ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn disabled_scenarios_accept_nearly_every_frame() {
        // N generated uplinks must allow count >= N-1 whenever enforcement
        // is off, in every region.
        for s in catalog() {
            if s.duty_cycle == DutyCycleSetting::Disabled {
                let n = s.plan.len() as u32;
                assert!(n >= 5, "{}", s.id);
                assert!(*s.expected_tx.start() >= n - 1, "{}", s.id);
                assert!(*s.expected_tx.end() <= n, "{}", s.id);
            }
        }
    }

    #[test]
    fn heavy_restriction_band_expects_one_or_two() {
        let s = find("eu868-band-01pct").unwrap();
        assert_eq!(s.expected_tx, 1..=2);
        assert!(s.plan.iter().all(|p| p.uplink_hz == EU_BAND_01PCT));
        assert!(s
            .intervals
            .iter()
            .all(|i| *i < Duration::from_secs(51)), "spacing well below the 0.1% off-time");
    }

    #[test]
    fn multiband_interleaves_distinct_budgets() {
        let s = find("eu868-multiband").unwrap();
        let mut bands: Vec<u64> = s.plan.iter().map(|p| p.uplink_hz).collect();
        bands.sort_unstable();
        bands.dedup();
        assert_eq!(bands, vec![EU_BAND_01PCT, EU_BAND_1PCT, EU_BAND_10PCT]);
        // A less-restricted band must keep its own allowance available.
        assert!(*s.expected_tx.start() >= 3);
    }

    #[test]
    fn window_scenarios_burst_then_back_off() {
        for id in ["eu868-window", "as923-window"] {
            let s = find(id).unwrap();
            let burst = s.intervals.first().unwrap();
            let recovery = s.intervals.iter().max().unwrap();
            assert!(burst < recovery, "{id}: plan must pause beyond the off-time");
            assert!(*s.expected_tx.start() >= 3, "{id}: tx must resume after the gap");
        }
    }

    #[test]
    fn pps_scenario_judges_sync_not_transmissions() {
        let s = pps_recovery();
        let pps = s.pps.as_ref().unwrap();
        assert!(s.plan.is_empty());
        assert_eq!(pps.min_fast_syncs, 1);
        assert!(!pps.steps.is_empty());
    }
}
