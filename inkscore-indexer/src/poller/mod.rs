//! Adaptive poller for completed contracts.
//!
//! Every contract in `complete` status gets an in-process poll state
//! `{last_poll_at, interval, consecutive_empty}`. A single scheduler loop
//! ticks every 100 ms, picks the most-overdue due contract, and runs the
//! ingestor in poll mode against it.
//!
//! # Interval Adjustment
//!
//! After a poll returning `k` newly-inserted rows with error flag `e`:
//!
//! | condition | new interval | consecutive_empty |
//! |-----------|--------------|-------------------|
//! | `e` | min(interval×2, MAX) | +1 |
//! | `k ≥ HIGH` | BASE | 0 |
//! | `0 < k < HIGH` | MEDIUM | 0 |
//! | `k = 0`, first empty | LOW | 1 |
//! | `k = 0`, subsequent | min(interval×2, MAX) | +1 |
//!
//! Fast reaction to active contracts, slow drift for silent ones, capped
//! so no contract is starved. Every interval stays within [BASE, MAX].

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::PollerSettings;
use crate::error::Result;
use crate::ingest::Ingestor;
use crate::ports::{ContractStore, CursorStore};
use crate::types::entities::IngestReport;
use crate::types::enums::IngestMode;
use crate::types::primitives::EthAddress;

// ═══════════════════════════════════════════════════════════════════════════════
// POLL STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-contract scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    /// When this contract was last polled; `None` sorts first.
    pub last_poll_at: Option<Instant>,
    /// Current poll interval.
    pub interval: Duration,
    /// Consecutive polls that returned nothing (or failed).
    pub consecutive_empty: u32,
}

/// Compute the next `(interval, consecutive_empty)` from a poll outcome.
///
/// Pure so the adjustment table is testable without a scheduler.
#[must_use]
pub fn next_state(
    settings: &PollerSettings,
    current: Duration,
    consecutive_empty: u32,
    inserted: u64,
    error: bool,
) -> (Duration, u32) {
    let base = settings.base_interval();
    let max = settings.max_interval();

    let (interval, empties) = if error {
        ((current * 2).min(max), consecutive_empty + 1)
    } else if inserted >= settings.high_activity_threshold {
        (base, 0)
    } else if inserted > 0 {
        (settings.medium_interval(), 0)
    } else if consecutive_empty == 0 {
        (settings.low_interval(), 1)
    } else {
        ((current * 2).min(max), consecutive_empty + 1)
    };

    (interval.clamp(base, max), empties)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADAPTIVE POLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Single-threaded scheduling loop polling completed contracts.
pub struct AdaptivePoller {
    contracts: Arc<dyn ContractStore>,
    cursors: Arc<dyn CursorStore>,
    ingestor: Arc<Ingestor>,
    settings: PollerSettings,
    states: DashMap<EthAddress, PollState>,
}

impl std::fmt::Debug for AdaptivePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptivePoller")
            .field("contracts_tracked", &self.states.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AdaptivePoller {
    /// Create a poller over the given stores and ingestor.
    #[must_use]
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        cursors: Arc<dyn CursorStore>,
        ingestor: Arc<Ingestor>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            contracts,
            cursors,
            ingestor,
            settings,
            states: DashMap::new(),
        }
    }

    /// Run the scheduler loop until shutdown.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Adaptive poller starting");

        let mut tick = interval(self.settings.tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = interval(self.settings.refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Adaptive poller stopping");
                    return;
                }
                _ = refresh.tick() => {
                    self.refresh_contracts().await;
                }
                _ = tick.tick() => {
                    if let Some(address) = self.next_due(Instant::now()) {
                        if let Err(e) = self.poll_contract(&address, &shutdown).await {
                            warn!(contract = %address, error = %e, "Poll failed");
                        }
                    }
                }
            }
        }
    }

    /// Sync the tracked set with the store: add newly completed contracts,
    /// drop paused/removed ones.
    async fn refresh_contracts(&self) {
        let pollable = match self.contracts.pollable().await {
            Ok(pollable) => pollable,
            Err(e) => {
                warn!(error = %e, "Failed to refresh pollable contracts");
                return;
            }
        };

        let keep: std::collections::HashSet<EthAddress> =
            pollable.iter().map(|c| c.address).collect();

        self.states.retain(|address, _| keep.contains(address));
        for contract in pollable {
            self.states.entry(contract.address).or_insert(PollState {
                last_poll_at: None,
                interval: self.settings.base_interval(),
                consecutive_empty: 0,
            });
        }
    }

    /// Pick the contract whose overdue amount is largest and positive.
    ///
    /// A contract never polled sorts first. Returns `None` when nothing
    /// is due.
    #[must_use]
    pub fn next_due(&self, now: Instant) -> Option<EthAddress> {
        let mut best: Option<(EthAddress, Duration, bool)> = None;

        for entry in &self.states {
            let (overdue, never_polled) = match entry.value().last_poll_at {
                None => (Duration::MAX, true),
                Some(at) => {
                    let elapsed = now.saturating_duration_since(at);
                    if elapsed <= entry.value().interval {
                        continue; // Not due yet
                    }
                    (elapsed - entry.value().interval, false)
                }
            };

            let better = match &best {
                None => true,
                Some((_, best_overdue, best_never)) => {
                    (never_polled && !best_never)
                        || (never_polled == *best_never && overdue > *best_overdue)
                }
            };
            if better {
                best = Some((*entry.key(), overdue, never_polled));
            }
        }

        best.map(|(address, _, _)| address)
    }

    /// Poll one contract and apply the interval adjustment.
    ///
    /// # Errors
    ///
    /// Returns the ingest error after recording it in the poll state
    /// (backoff applies either way).
    #[instrument(skip(self, cancel), fields(contract = %address))]
    pub async fn poll_contract(
        &self,
        address: &EthAddress,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let Some(contract) = self.contracts.get(address).await? else {
            self.states.remove(address);
            return Ok(IngestReport::default());
        };

        let result = self
            .ingestor
            .ingest(&contract, IngestMode::Poll, None, cancel, None)
            .await;

        let (inserted, errored) = match &result {
            Ok(report) => (report.rows_inserted, false),
            Err(_) => (0, true),
        };

        if let Some(mut state) = self.states.get_mut(address) {
            let (interval, empties) = next_state(
                &self.settings,
                state.interval,
                state.consecutive_empty,
                inserted,
                errored,
            );
            state.last_poll_at = Some(Instant::now());
            state.interval = interval;
            state.consecutive_empty = empties;

            debug!(
                inserted,
                errored,
                interval_ms = interval.as_millis() as u64,
                consecutive_empty = empties,
                "Poll state adjusted"
            );
        }

        if inserted > 0 {
            let total = self
                .cursors
                .get(address)
                .await?
                .map_or(0, |c| c.total_indexed);
            let newest = result.as_ref().ok().and_then(|r| r.newest_block);
            self.contracts.touch_progress(address, newest, total).await?;
        }

        result
    }

    /// Seed or overwrite a contract's poll state (tests and operator
    /// tooling; the scheduler seeds organically via refresh).
    pub fn prime(&self, address: EthAddress, state: PollState) {
        self.states.insert(address, state);
    }

    /// Read a contract's current poll state.
    #[must_use]
    pub fn state(&self, address: &EthAddress) -> Option<PollState> {
        self.states.get(address).map(|s| *s.value())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn settings() -> PollerSettings {
        PollerSettings {
            tick_ms: 100,
            base_interval_ms: 15_000,
            medium_interval_ms: 30_000,
            low_interval_ms: 60_000,
            max_interval_ms: 120_000,
            high_activity_threshold: 5,
            page_cap: 10,
            refresh_interval_ms: 5000,
        }
    }

    // One case per row of the adjustment table, plus the cap edge.
    #[rstest]
    #[case::high_activity_snaps_to_base(60, 1, 7, false, 15, 0)]
    #[case::moderate_activity_uses_medium(120, 4, 3, false, 30, 0)]
    #[case::first_empty_uses_low(15, 0, 0, false, 60, 1)]
    #[case::subsequent_empty_doubles(60, 1, 0, false, 120, 2)]
    #[case::empty_at_cap_stays_there(120, 2, 0, false, 120, 3)]
    #[case::error_backs_off_like_empty(30, 0, 0, true, 60, 1)]
    #[case::error_at_cap_stays_there(120, 3, 0, true, 120, 4)]
    fn adjustment_table(
        #[case] current_secs: u64,
        #[case] consecutive_empty: u32,
        #[case] inserted: u64,
        #[case] errored: bool,
        #[case] expected_secs: u64,
        #[case] expected_empty: u32,
    ) {
        let (interval, empties) = next_state(
            &settings(),
            Duration::from_secs(current_secs),
            consecutive_empty,
            inserted,
            errored,
        );
        assert_eq!(interval, Duration::from_secs(expected_secs));
        assert_eq!(empties, expected_empty);
    }

    #[test]
    fn interval_always_within_bounds() {
        let s = settings();
        for &current_secs in &[15u64, 30, 60, 120] {
            for &k in &[0u64, 1, 4, 5, 50] {
                for &e in &[false, true] {
                    for ce in 0..4u32 {
                        let (interval, _) =
                            next_state(&s, Duration::from_secs(current_secs), ce, k, e);
                        assert!(interval >= s.base_interval(), "below base: {interval:?}");
                        assert!(interval <= s.max_interval(), "above max: {interval:?}");
                    }
                }
            }
        }
    }
}
