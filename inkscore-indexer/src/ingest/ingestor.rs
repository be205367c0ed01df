//! The transaction ingestor: cursor-driven upstream-to-sink pumping.
//!
//! One public operation, [`Ingestor::ingest`], run in two modes:
//!
//! - **Backfill**: ascending, token-paginated, resumes from the persisted
//!   cursor, ends when the upstream reports no more pages (or the
//!   operator's date window is exhausted)
//! - **Poll**: descending, page-capped, stops at the first hash already
//!   present in the sink; the cursor keeps its completed state
//!
//! # Partial-Failure Semantics
//!
//! Errors are caught at page granularity: a failed page never rolls back
//! prior pages' inserts, and the cursor always reflects the last fully
//! committed page. Cancellation (shutdown or job cancel) is observed at
//! page boundaries and exits cleanly with progress saved.
//!
//! # State machine per contract during a run
//!
//! ```text
//! idle ──▶ fetching ──▶ inserting ──▶ (fetching | complete | error)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use routescan_client::{SortOrder, TxListQuery};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{BackfillSettings, ExplorerSettings, PollerSettings};
use crate::error::Result;
use crate::ingest::canonical::map_item;
use crate::ingest::rpc_scan::RpcScanner;
use crate::ports::{CursorStore, TransactionFeed, TransactionStore};
use crate::store::with_storage_retry;
use crate::types::entities::{Contract, Cursor, IngestReport, TransactionRecord};
use crate::types::enums::IngestMode;
use crate::types::primitives::BlockNumber;

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPORT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Operator-supplied time bounds for a backfill job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window spanning the given dates.
    #[must_use]
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }
}

/// Per-page checkpoint callback for job-driven backfills.
///
/// Invoked after each page commits (rows inserted, cursor advanced).
/// Returning `false` stops the run cleanly at this page boundary; the
/// cursor keeps the token for resumption.
#[async_trait]
pub trait PageHook: Send + Sync {
    /// Observe a committed page. `progress_percent` is coarse (derived
    /// from the upstream total count when available); `resume_token` is
    /// the token the next page would use.
    async fn on_page(&self, progress_percent: f64, resume_token: Option<&str>) -> bool;
}

/// Tuning knobs for the ingestor, derived from settings.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Page size for list queries.
    pub page_limit: u32,
    /// Minimum delay between upstream requests.
    pub min_request_delay: Duration,
    /// Hard page cap in poll mode.
    pub poll_page_cap: u32,
    /// Rows per sink insert chunk.
    pub insert_chunk_size: usize,
    /// Chain id stamped on rows whose item omits it.
    pub default_chain_id: u64,
}

impl IngestorConfig {
    /// Build from the settings sections that feed the ingestor.
    #[must_use]
    pub fn from_settings(
        explorer: &ExplorerSettings,
        backfill: &BackfillSettings,
        poller: &PollerSettings,
    ) -> Self {
        Self {
            page_limit: explorer.page_limit,
            min_request_delay: explorer.min_request_delay(),
            poll_page_cap: poller.page_cap,
            insert_chunk_size: backfill.insert_chunk_size,
            default_chain_id: explorer.chain_ids.first().copied().unwrap_or(0),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INGESTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Pulls raw transactions for one contract from the explorer (primary) or
/// the chain RPC (fallback) into the base-row store.
///
/// The two paths are interchangeable at the row level; both go through the
/// canonical mapping. After three consecutive RPC failures the fallback is
/// latched off for the remainder of the process lifetime.
pub struct Ingestor {
    feed: Arc<dyn TransactionFeed>,
    cursors: Arc<dyn CursorStore>,
    transactions: Arc<dyn TransactionStore>,
    rpc: Option<Arc<RpcScanner>>,
    rpc_latched: AtomicBool,
    rpc_failures: AtomicU32,
    config: IngestorConfig,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("rpc_enabled", &self.rpc.is_some())
            .field("rpc_latched", &self.rpc_latched.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Create a new ingestor over the given feed and stores.
    #[must_use]
    pub fn new(
        feed: Arc<dyn TransactionFeed>,
        cursors: Arc<dyn CursorStore>,
        transactions: Arc<dyn TransactionStore>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            feed,
            cursors,
            transactions,
            rpc: None,
            rpc_latched: AtomicBool::new(false),
            rpc_failures: AtomicU32::new(0),
            config,
        }
    }

    /// Attach the chain-RPC fallback scanner.
    #[must_use]
    pub fn with_rpc_scanner(mut self, scanner: Arc<RpcScanner>) -> Self {
        self.rpc = Some(scanner);
        self
    }

    /// Whether the RPC fallback is currently usable.
    fn rpc_available(&self) -> bool {
        self.rpc.is_some() && !self.rpc_latched.load(Ordering::Relaxed)
    }

    /// Ingest transactions for one contract.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the upstream stays unavailable past
    /// its retry budget (the orchestrator retries the contract later), or
    /// a storage error when the sink fails past the jittered retry.
    #[instrument(skip_all, fields(contract = %contract.address, mode = %mode))]
    pub async fn ingest(
        &self,
        contract: &Contract,
        mode: IngestMode,
        window: Option<TimeWindow>,
        cancel: &CancellationToken,
        hook: Option<&dyn PageHook>,
    ) -> Result<IngestReport> {
        match mode {
            IngestMode::Backfill => self.run_backfill(contract, window, cancel, hook).await,
            IngestMode::Poll => self.run_poll(contract, cancel).await,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // BACKFILL MODE
    // ───────────────────────────────────────────────────────────────────────────

    async fn run_backfill(
        &self,
        contract: &Contract,
        window: Option<TimeWindow>,
        cancel: &CancellationToken,
        hook: Option<&dyn PageHook>,
    ) -> Result<IngestReport> {
        let address = contract.address;
        let cursor = self
            .cursors
            .get(&address)
            .await?
            .unwrap_or_else(|| Cursor::empty(address));

        let mut report = IngestReport::default();
        if cursor.is_complete {
            debug!("Cursor already complete, nothing to backfill");
            report.completed = true;
            return Ok(report);
        }

        let window = window.unwrap_or_default();
        let mut token = cursor.last_page_token.clone();
        let mut streamed = cursor.total_indexed;
        let mut count_hint: Option<u64> = None;

        loop {
            if cancel.is_cancelled() {
                info!("Cancellation observed at page boundary");
                report.cancelled = true;
                return Ok(report);
            }

            let mut query = TxListQuery::for_contract(&address.to_hex())
                .with_sort(SortOrder::Asc)
                .with_limit(self.config.page_limit)
                .with_time_window(
                    window.start.map(|d| d.timestamp()),
                    window.end.map(|d| d.timestamp()),
                );
            if let Some(t) = &token {
                query = query.with_next_token(t.clone());
            }

            let page = match self.feed.fetch_page(&query).await {
                Ok(page) => page,
                Err(e) if e.is_transient_upstream() && self.rpc_available() => {
                    warn!(error = %e, "Explorer unreachable, switching to RPC scan");
                    return self.rpc_fallback(contract, report, cancel).await;
                }
                Err(e) => return Err(e),
            };

            report.pages_fetched += 1;
            if count_hint.is_none() {
                count_hint = page.count;
            }

            let returned = page.items.len() as u64;
            let (rows, skipped) = self.map_page(&page.items, contract);
            let inserted = self.insert_chunks(&rows).await?;
            let newest = rows.iter().map(|r| r.block_number).max();

            report.rows_returned += returned;
            report.rows_inserted += inserted;
            report.rows_skipped += skipped;
            report.newest_block = report.newest_block.max(newest);
            streamed += returned;

            // The explorer stream, not the sink, defines progress: the
            // cursor advances by rows returned even when every row was a
            // conflict-ignored duplicate.
            let next = page.link.next_token.clone();
            let complete = next.is_none();
            self.cursors
                .upsert(&address, next.as_deref(), newest, returned, complete)
                .await?;

            metrics::counter!("ingest_rows_returned").increment(returned);
            metrics::counter!("ingest_rows_inserted").increment(inserted);

            if let Some(hook) = hook {
                let progress = count_hint
                    .filter(|c| *c > 0)
                    .map_or(0.0, |c| (streamed as f64 / c as f64 * 100.0).min(100.0));
                if !hook.on_page(progress, next.as_deref()).await {
                    info!("Page hook requested stop");
                    report.cancelled = true;
                    return Ok(report);
                }
            }

            if complete {
                info!(
                    pages = report.pages_fetched,
                    rows = report.rows_returned,
                    "Backfill reached end of stream"
                );
                report.completed = true;
                return Ok(report);
            }

            token = next;
            sleep(self.config.min_request_delay).await;
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // POLL MODE
    // ───────────────────────────────────────────────────────────────────────────

    async fn run_poll(
        &self,
        contract: &Contract,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let address = contract.address;
        let cursor = self
            .cursors
            .get(&address)
            .await?
            .unwrap_or_else(|| Cursor::empty(address));

        let mut report = IngestReport::default();
        let mut token: Option<String> = None;
        let mut newest = cursor.last_block_indexed;
        let mut caught_up = false;

        for _ in 0..self.config.poll_page_cap {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let mut query = TxListQuery::for_contract(&address.to_hex())
                .with_sort(SortOrder::Desc)
                .with_limit(self.config.page_limit);
            if let Some(t) = &token {
                query = query.with_next_token(t.clone());
            }

            let page = self.feed.fetch_page(&query).await?;
            report.pages_fetched += 1;

            // Early termination: the first already-known hash marks where
            // the previous poll (or the backfill) left off.
            let mut fresh: Vec<TransactionRecord> = Vec::new();
            for item in &page.items {
                match map_item(item, &address, self.config.default_chain_id) {
                    Ok(row) => {
                        if self.transactions.contains(&row.tx_hash).await? {
                            caught_up = true;
                            break;
                        }
                        fresh.push(row);
                    }
                    Err(_) => report.rows_skipped += 1,
                }
            }

            let inserted = self.insert_chunks(&fresh).await?;
            report.rows_returned += fresh.len() as u64;
            report.rows_inserted += inserted;
            newest = newest.max(fresh.iter().map(|r| r.block_number).max());

            if caught_up || page.link.next_token.is_none() {
                break;
            }
            token = page.link.next_token.clone();
            sleep(self.config.min_request_delay).await;
        }

        // The cursor stays complete; only the block high-water mark and
        // the additive total move.
        self.cursors
            .upsert(&address, None, newest, report.rows_inserted, true)
            .await?;

        report.newest_block = newest;
        report.completed = !report.cancelled;
        metrics::counter!("poll_rows_inserted").increment(report.rows_inserted);
        Ok(report)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // RPC FALLBACK
    // ───────────────────────────────────────────────────────────────────────────

    /// Continue a backfill over the chain RPC after the explorer went away.
    async fn rpc_fallback(
        &self,
        contract: &Contract,
        mut report: IngestReport,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let Some(scanner) = &self.rpc else {
            return Ok(report);
        };

        let cursor = self.cursors.get(&contract.address).await?;
        let from_block = cursor
            .as_ref()
            .and_then(|c| c.last_block_indexed)
            .map(|b| b.next())
            .or(contract.deploy_block)
            .unwrap_or(BlockNumber::new(0));

        match scanner.scan(contract, from_block, cancel).await {
            Ok(scan_report) => {
                self.rpc_failures.store(0, Ordering::Relaxed);
                report.pages_fetched += scan_report.pages_fetched;
                report.rows_returned += scan_report.rows_returned;
                report.rows_inserted += scan_report.rows_inserted;
                report.rows_skipped += scan_report.rows_skipped;
                report.newest_block = report.newest_block.max(scan_report.newest_block);
                report.completed = scan_report.completed;
                report.cancelled = scan_report.cancelled;
                Ok(report)
            }
            Err(e) => {
                let failures = self.rpc_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= 3 {
                    warn!(failures, "RPC fallback latched off for this run");
                    self.rpc_latched.store(true, Ordering::Relaxed);
                }
                Err(e)
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // SHARED HELPERS
    // ───────────────────────────────────────────────────────────────────────────

    /// Map a page of items, tallying skips (logged once per page).
    fn map_page(
        &self,
        items: &[routescan_client::TxItem],
        contract: &Contract,
    ) -> (Vec<TransactionRecord>, u64) {
        let mut rows = Vec::with_capacity(items.len());
        let mut skipped = 0u64;

        for item in items {
            match map_item(item, &contract.address, self.config.default_chain_id) {
                Ok(row) => rows.push(row),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, "Skipped unmappable items in page");
        }
        (rows, skipped)
    }

    /// Insert rows in conflict-ignored chunks, with jittered retry on
    /// transient storage failures.
    async fn insert_chunks(&self, rows: &[TransactionRecord]) -> Result<u64> {
        let mut inserted = 0u64;
        for chunk in rows.chunks(self.config.insert_chunk_size.max(1)) {
            inserted += with_storage_retry(3, || self.transactions.insert_batch(chunk)).await?;
        }
        Ok(inserted)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestor_config_from_settings_picks_first_chain() {
        let explorer = ExplorerSettings {
            base_url: "https://api.example.io".into(),
            ecosystem: "ink".into(),
            chain_ids: vec![57073, 1],
            page_limit: 50,
            min_request_delay_ms: 200,
            max_retries: 5,
            request_timeout_ms: 15000,
        };
        let backfill = BackfillSettings {
            workers: 3,
            scan_interval_ms: 60_000,
            stale_after_ms: 1_800_000,
            job_max_attempts: 3,
            insert_chunk_size: 500,
        };
        let poller = PollerSettings {
            tick_ms: 100,
            base_interval_ms: 15_000,
            medium_interval_ms: 30_000,
            low_interval_ms: 60_000,
            max_interval_ms: 120_000,
            high_activity_threshold: 5,
            page_cap: 10,
            refresh_interval_ms: 5000,
        };

        let config = IngestorConfig::from_settings(&explorer, &backfill, &poller);
        assert_eq!(config.default_chain_id, 57073);
        assert_eq!(config.poll_page_cap, 10);
        assert_eq!(config.insert_chunk_size, 500);
    }
}
