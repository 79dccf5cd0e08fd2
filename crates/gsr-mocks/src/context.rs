//! Shared per-scenario state.
//!
//! One [`ScenarioContext`] is created at scenario start, passed to every
//! mock constructor, and discarded at scenario end; nothing survives across
//! scenarios. Counters are independent observation points (the concentrator
//! and the LNS mock can race), so each is its own atomic.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use gsr_msg::regions::{DutyCycleSetting, RegionProfile};

use crate::gnss::FeedStep;

/// One (uplink, downlink) frequency slot of a scenario plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqPair {
    pub uplink_hz: u64,
    pub downlink_hz: u64,
}

impl FreqPair {
    /// Uplink and downlink on the same frequency.
    pub fn same(hz: u64) -> Self {
        Self {
            uplink_hz: hz,
            downlink_hz: hz,
        }
    }
}

/// GNSS/PPS recovery plan attached to a scenario.
#[derive(Debug, Clone)]
pub struct PpsPlan {
    /// Feed schedule written to the GNSS and command pipes.
    pub steps: Vec<FeedStep>,
    /// Window after the first time-sync request during which replies are
    /// deliberately delayed (models NS-side timing jitter).
    pub warmup: Duration,
    /// Artificial reply delay applied inside the warm-up window.
    pub sync_delay: Duration,
    /// Minimum number of fast (non-delayed) replies required to pass.
    pub min_fast_syncs: u32,
}

impl Default for PpsPlan {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            warmup: Duration::from_secs(3),
            sync_delay: Duration::from_millis(2010),
            min_fast_syncs: 1,
        }
    }
}

/// Immutable description of one regression scenario.
#[derive(Debug, Clone)]
pub struct ScenarioDescriptor {
    pub id: String,
    pub region: RegionProfile,
    pub duty_cycle: DutyCycleSetting,
    /// Per-index uplink/downlink frequencies.
    pub plan: Vec<FreqPair>,
    /// Per-index pause after each generated uplink.
    pub intervals: Vec<Duration>,
    /// Accepted confirmation-count band. Ranges, not exact counts; timing
    /// jitter legitimately moves a boundary frame in or out.
    pub expected_tx: RangeInclusive<u32>,
    pub pps: Option<PpsPlan>,
    pub description: String,
}

impl ScenarioDescriptor {
    /// Pause after uplink `idx`; beyond the plan the last interval repeats.
    pub fn interval_at(&self, idx: usize) -> Duration {
        self.intervals
            .get(idx)
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or(Duration::from_millis(1500))
    }

    /// Downlink frequency for sequence index `idx`.
    pub fn downlink_freq(&self, idx: usize) -> u64 {
        self.plan
            .get(idx)
            .or_else(|| self.plan.last())
            .map(|pair| pair.downlink_hz)
            .unwrap_or(0)
    }
}

/// Terminal judgment of a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub pass: bool,
    pub reason: String,
}

impl Outcome {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            pass: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            reason: reason.into(),
        }
    }
}

/// Snapshot of the run-scoped counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioCounts {
    /// Transmit commands observed at the concentrator.
    pub tx_events: u32,
    /// Transmit confirmations observed at the LNS mock.
    pub confirmations: u32,
    /// Fast (non-delayed) time-sync replies served.
    pub fast_syncs: u32,
    /// Uplink notifications received on the control plane.
    pub uplinks: u32,
}

/// Shared state for one scenario run.
pub struct ScenarioContext {
    descriptor: ScenarioDescriptor,
    tx_events: AtomicU32,
    confirmations: AtomicU32,
    fast_syncs: AtomicU32,
    uplinks: AtomicU32,
    outcome: Mutex<Option<Outcome>>,
    finalized_tx: watch::Sender<bool>,
}

impl ScenarioContext {
    pub fn new(descriptor: ScenarioDescriptor) -> Arc<Self> {
        let (finalized_tx, _) = watch::channel(false);
        Arc::new(Self {
            descriptor,
            tx_events: AtomicU32::new(0),
            confirmations: AtomicU32::new(0),
            fast_syncs: AtomicU32::new(0),
            uplinks: AtomicU32::new(0),
            outcome: Mutex::new(None),
            finalized_tx,
        })
    }

    pub fn descriptor(&self) -> &ScenarioDescriptor {
        &self.descriptor
    }

    /// Record a transmit command seen at the concentrator.
    pub fn record_tx_event(&self, freq_hz: u64) -> u32 {
        let count = self.tx_events.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(freq_hz, count, "transmit observed at concentrator");
        count
    }

    /// Record a transmit confirmation seen on the control plane.
    pub fn record_confirmation(&self, seqno: i64) -> u32 {
        let count = self.confirmations.fetch_add(1, Ordering::Relaxed) + 1;
        info!(seqno, count, "transmit confirmed");
        count
    }

    /// Record a fast time-sync reply.
    pub fn record_fast_sync(&self) -> u32 {
        self.fast_syncs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record an uplink notification.
    pub fn record_uplink(&self) -> u32 {
        self.uplinks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn counts(&self) -> ScenarioCounts {
        ScenarioCounts {
            tx_events: self.tx_events.load(Ordering::Relaxed),
            confirmations: self.confirmations.load(Ordering::Relaxed),
            fast_syncs: self.fast_syncs.load(Ordering::Relaxed),
            uplinks: self.uplinks.load(Ordering::Relaxed),
        }
    }

    /// Whether the confirmation count currently sits inside the accepted
    /// band. Used both at explicit finalize and as the timeout fallback.
    pub fn counts_within_expectation(&self) -> bool {
        self.descriptor
            .expected_tx
            .contains(&self.confirmations.load(Ordering::Relaxed))
    }

    /// Terminal, idempotent finalize: the first call wins, later signals are
    /// ignored. Returns whether this call set the outcome.
    pub fn finalize(&self, outcome: Outcome) -> bool {
        let mut slot = self.outcome.lock();
        if let Some(existing) = slot.as_ref() {
            warn!(
                ignored = %outcome.reason,
                kept = %existing.reason,
                "finalize after scenario already decided"
            );
            return false;
        }
        info!(pass = outcome.pass, reason = %outcome.reason, "scenario finalized");
        *slot = Some(outcome);
        drop(slot);
        let _ = self.finalized_tx.send(true);
        true
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.lock().clone()
    }

    /// Wait until some mock (or the runner) finalizes the scenario.
    pub async fn finalized(&self) {
        let mut rx = self.finalized_tx.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(expected: RangeInclusive<u32>) -> ScenarioDescriptor {
        ScenarioDescriptor {
            id: "unit".to_owned(),
            region: RegionProfile::Eu868,
            duty_cycle: DutyCycleSetting::Absent,
            plan: vec![FreqPair::same(868_100_000), FreqPair::same(869_525_000)],
            intervals: vec![Duration::from_secs(2)],
            expected_tx: expected,
            pps: None,
            description: String::new(),
        }
    }

    #[test]
    fn finalize_is_terminal_and_idempotent() {
        let ctx = ScenarioContext::new(descriptor(0..=1));
        assert!(ctx.finalize(Outcome::pass("first")));
        assert!(!ctx.finalize(Outcome::fail("second")));
        let outcome = ctx.outcome().unwrap();
        assert!(outcome.pass);
        assert_eq!(outcome.reason, "first");
    }

    #[test]
    fn expectation_tracks_confirmations_not_tx_events() {
        let ctx = ScenarioContext::new(descriptor(1..=2));
        ctx.record_tx_event(868_100_000);
        ctx.record_tx_event(868_100_000);
        assert!(!ctx.counts_within_expectation());
        ctx.record_confirmation(0);
        assert!(ctx.counts_within_expectation());
        assert_eq!(ctx.counts().tx_events, 2);
        assert_eq!(ctx.counts().confirmations, 1);
    }

    #[test]
    fn plan_lookup_saturates_at_the_last_slot() {
        let ctx = ScenarioContext::new(descriptor(0..=1));
        assert_eq!(ctx.descriptor().downlink_freq(0), 868_100_000);
        assert_eq!(ctx.descriptor().downlink_freq(7), 869_525_000);
        assert_eq!(ctx.descriptor().interval_at(9), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn finalized_wakes_waiters() {
        let ctx = ScenarioContext::new(descriptor(0..=0));
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.finalized().await })
        };
        ctx.finalize(Outcome::pass("done"));
        waiter.await.unwrap();
    }
}
