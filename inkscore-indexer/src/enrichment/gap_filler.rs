//! Parallel gap filler for the enrichment backlog.
//!
//! A coordinator computes the enrichment deficit per contract (base rows
//! minus enrichment rows), slices it into fixed-size offset batches, and
//! runs them through a bounded worker pool. Each worker:
//!
//! - pages pending rows oldest-first (stable block-timestamp order)
//! - fans out up to 5 concurrent detail fetches with per-call retry
//!   (3 attempts, 2^n backoff) and inter-batch pacing (≥ 500 ms)
//! - tracks fleet-wide consecutive timeouts and slows down under
//!   sustained upstream pressure (>2 ⇒ 1 s, >5 ⇒ 2 s between fan-outs)
//! - writes successes in one idempotent multi-row upsert, retrying the
//!   shared-memory storage error class with jittered backoff
//!
//! Batches that reported failures are retried on subsequent passes
//! (bounded); the run exits when the deficit reaches zero.
//!
//! Offset slicing is computed against the pending set at pass start;
//! rows enriched mid-pass shift later offsets, and the next pass sweeps
//! whatever slipped through.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::EnrichmentSettings;
use crate::enrichment::build_enrichment;
use crate::error::Result;
use crate::ports::{EnrichmentStore, TransactionFeed, TransactionStore};
use crate::store::with_storage_retry;
use crate::types::entities::{EnrichmentRecord, TransactionRecord};
use crate::types::primitives::EthAddress;

/// Retry passes over batches that reported failures.
const MAX_PASSES: u32 = 3;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One slice of a contract's enrichment deficit.
#[derive(Debug, Clone)]
struct Batch {
    contract: EthAddress,
    offset: u64,
    size: u64,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default)]
struct BatchResult {
    processed: u64,
    failed: u64,
}

/// Outcome of a full gap-fill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapFillSummary {
    /// Passes executed (1 when everything enriched first try).
    pub passes: u32,
    /// Enrichment rows written.
    pub processed: u64,
    /// Rows that still failed after the final pass.
    pub failed: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAP FILLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Coordinator + worker pool closing the base/enrichment deficit.
pub struct GapFiller {
    feed: Arc<dyn TransactionFeed>,
    transactions: Arc<dyn TransactionStore>,
    enrichments: Arc<dyn EnrichmentStore>,
    settings: EnrichmentSettings,
    /// Fleet-wide consecutive-timeout counter shared by all workers.
    consecutive_timeouts: AtomicU32,
}

impl std::fmt::Debug for GapFiller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GapFiller")
            .field("workers", &self.settings.workers)
            .field("batch_size", &self.settings.batch_size)
            .finish_non_exhaustive()
    }
}

impl GapFiller {
    /// Create a gap filler over the given feed and stores.
    ///
    /// The stores handed in here should sit on one shared, deliberately
    /// small connection pool, sized at two connections per worker, to
    /// avoid shared-memory pressure in the storage backend.
    #[must_use]
    pub fn new(
        feed: Arc<dyn TransactionFeed>,
        transactions: Arc<dyn TransactionStore>,
        enrichments: Arc<dyn EnrichmentStore>,
        settings: EnrichmentSettings,
    ) -> Self {
        Self {
            feed,
            transactions,
            enrichments,
            settings,
            consecutive_timeouts: AtomicU32::new(0),
        }
    }

    /// Run gap-fill passes on an interval until shutdown.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            workers = self.settings.workers,
            "Gap filler starting"
        );

        loop {
            match self.run_once(&shutdown).await {
                Ok(summary) if summary.processed > 0 || summary.failed > 0 => {
                    info!(?summary, "Gap-fill pass finished");
                }
                Ok(_) => debug!("No enrichment deficit"),
                Err(e) => warn!(error = %e, "Gap-fill pass failed"),
            }

            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Gap filler stopping");
                    return;
                }
                () = sleep(self.settings.gap_interval()) => {}
            }
        }
    }

    /// Execute passes until the deficit is zero, failures stop shrinking,
    /// or the pass budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error when the deficit query itself fails; batch-level
    /// failures are tallied, not raised.
    #[instrument(skip_all)]
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<GapFillSummary> {
        let mut summary = GapFillSummary::default();

        for pass in 0..MAX_PASSES {
            if cancel.is_cancelled() {
                break;
            }

            let deficits = self.enrichments.deficit_by_contract().await?;
            if deficits.is_empty() {
                break;
            }

            summary.passes = pass + 1;
            let batches = slice_batches(&deficits, self.settings.batch_size);
            info!(
                pass = pass + 1,
                contracts = deficits.len(),
                batches = batches.len(),
                "Dispatching gap-fill batches"
            );

            let results: Vec<BatchResult> = futures::stream::iter(
                batches.into_iter().map(|batch| self.process_batch(batch, cancel)),
            )
            .buffer_unordered(self.settings.workers.max(1))
            .collect()
            .await;

            let pass_processed: u64 = results.iter().map(|r| r.processed).sum();
            let pass_failed: u64 = results.iter().map(|r| r.failed).sum();
            summary.processed += pass_processed;
            summary.failed = pass_failed;

            metrics::counter!("gap_fill_rows_written").increment(pass_processed);

            if pass_failed == 0 && pass_processed == 0 {
                break; // Nothing moved; don't spin on an immovable deficit
            }
        }

        Ok(summary)
    }

    /// Process one batch: page rows, fetch details, upsert successes.
    async fn process_batch(&self, batch: Batch, cancel: &CancellationToken) -> BatchResult {
        let rows = match self
            .transactions
            .pending_enrichment(&batch.contract, batch.size, batch.offset)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(contract = %batch.contract, error = %e, "Pending query failed");
                return BatchResult {
                    processed: 0,
                    failed: batch.size,
                };
            }
        };

        let mut records: Vec<EnrichmentRecord> = Vec::with_capacity(rows.len());
        let mut failed = 0u64;

        for chunk in rows.chunks(self.settings.fetch_fanout.max(1)) {
            if cancel.is_cancelled() {
                break;
            }

            let fetches = chunk.iter().map(|row| self.fetch_with_retry(row));
            for (row, detail) in chunk.iter().zip(join_all(fetches).await) {
                match detail {
                    Some(detail) => records.push(build_enrichment(&detail, row)),
                    None => failed += 1,
                }
            }

            sleep(self.current_pace()).await;
        }

        let processed = match with_storage_retry(3, || self.enrichments.upsert_batch(&records))
            .await
        {
            Ok(written) => written,
            Err(e) => {
                warn!(contract = %batch.contract, error = %e, "Batch upsert failed");
                failed += records.len() as u64;
                0
            }
        };

        debug!(
            contract = %batch.contract,
            offset = batch.offset,
            processed,
            failed,
            "Batch finished"
        );
        BatchResult { processed, failed }
    }

    /// Fetch detail for one row with per-call retry and timeout tracking.
    ///
    /// Permanent upstream rejections (unknown hash) are not retried; they
    /// count as a batch failure and are reported upward.
    async fn fetch_with_retry(&self, row: &TransactionRecord) -> Option<routescan_client::TxDetail> {
        let hash = row.tx_hash.to_hex();

        let attempts = self.settings.detail_retries.max(1);
        for attempt in 0..attempts {
            match timeout(self.settings.gap_timeout(), self.feed.fetch_detail(&hash)).await {
                Ok(Ok(detail)) => {
                    self.consecutive_timeouts.store(0, Ordering::Relaxed);
                    return Some(detail);
                }
                Ok(Err(e)) if !e.is_transient_upstream() => {
                    debug!(hash = %hash, error = %e, "Permanent detail failure, skipping");
                    return None;
                }
                Ok(Err(e)) => {
                    debug!(hash = %hash, attempt, error = %e, "Transient detail failure");
                }
                Err(_) => {
                    self.consecutive_timeouts.fetch_add(1, Ordering::Relaxed);
                    debug!(hash = %hash, attempt, "Detail fetch timed out");
                }
            }

            if attempt + 1 < attempts {
                sleep(Duration::from_secs(2u64.saturating_pow(attempt))).await;
            }
        }

        None
    }

    /// Pacing between fetch fan-outs, widened under sustained timeouts.
    fn current_pace(&self) -> Duration {
        match self.consecutive_timeouts.load(Ordering::Relaxed) {
            t if t > 5 => Duration::from_secs(2),
            t if t > 2 => Duration::from_secs(1),
            _ => self.settings.pace(),
        }
    }
}

/// Slice per-contract deficits into fixed-size offset batches.
fn slice_batches(deficits: &[(EthAddress, u64)], batch_size: u64) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();

    for (contract, deficit) in deficits {
        let count = deficit.div_ceil(batch_size);
        for i in 0..count {
            batches.push(Batch {
                contract: *contract,
                offset: i * batch_size,
                size: batch_size,
            });
        }
    }
    batches
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> EthAddress {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        EthAddress::new(bytes)
    }

    #[test]
    fn slicing_covers_the_deficit() {
        let deficits = vec![(addr(1), 1200), (addr(2), 500), (addr(3), 1)];
        let batches = slice_batches(&deficits, 500);

        // 3 + 1 + 1 batches
        assert_eq!(batches.len(), 5);
        assert_eq!(batches[0].offset, 0);
        assert_eq!(batches[1].offset, 500);
        assert_eq!(batches[2].offset, 1000);
        assert!(batches.iter().all(|b| b.size == 500));
    }

    #[test]
    fn slicing_handles_zero_batch_size() {
        let deficits = vec![(addr(1), 10)];
        let batches = slice_batches(&deficits, 0);
        assert_eq!(batches.len(), 10); // Clamped to 1
    }
}
