//! Event-driven enrichment listener.
//!
//! One task consumes the base-row notification stream. For each message:
//!
//! 1. Dedupe against the per-process in-flight set
//! 2. Fetch the base row (the notification fires post-insert)
//! 3. Skip if an enrichment row already exists
//! 4. Fetch detail with a 10 s timeout; upsert on success
//! 5. Remove the hash from the in-flight set
//!
//! Transient fetch failures are **not retried** in this mode; the row
//! stays un-enriched and the gap filler catches it later. The listener
//! survives upstream outages without crashing.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::EnrichmentSettings;
use crate::enrichment::build_enrichment;
use crate::error::Result;
use crate::ports::{EnrichmentStore, NotificationSource, RowInserted, TransactionFeed,
    TransactionStore};
use crate::types::primitives::TxHash;

/// How one notification was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// An enrichment row was written.
    Enriched,
    /// The hash is already being processed by this listener.
    DuplicateInFlight,
    /// An enrichment row already exists.
    AlreadyEnriched,
    /// The base row is missing (notification without insert, unexpected).
    MissingBaseRow,
    /// The detail fetch failed or timed out; the gap filler will catch it.
    FetchFailed,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER
// ═══════════════════════════════════════════════════════════════════════════════

/// Single-consumer listener for live-row enrichment.
pub struct EnrichmentListener {
    feed: Arc<dyn TransactionFeed>,
    transactions: Arc<dyn TransactionStore>,
    enrichments: Arc<dyn EnrichmentStore>,
    in_flight: DashSet<TxHash>,
    settings: EnrichmentSettings,
}

impl std::fmt::Debug for EnrichmentListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentListener")
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl EnrichmentListener {
    /// Create a listener over the given feed and stores.
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
            in_flight: DashSet::new(),
            settings,
        }
    }

    /// Consume notifications until shutdown.
    ///
    /// Source errors (channel lost) pause and resume rather than crash;
    /// reconnection is the source adapter's concern.
    #[instrument(skip_all)]
    pub async fn run(
        self: Arc<Self>,
        mut source: Box<dyn NotificationSource>,
        shutdown: CancellationToken,
    ) {
        info!("Enrichment listener starting");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Enrichment listener stopping");
                    return;
                }
                note = source.recv() => match note {
                    Ok(note) => {
                        match self.process(&note).await {
                            Ok(outcome) => {
                                debug!(hash = %note.tx_hash, ?outcome, "Notification handled");
                            }
                            Err(e) => {
                                warn!(hash = %note.tx_hash, error = %e, "Notification failed");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Notification source error, pausing");
                        sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    /// Handle one notification end to end.
    ///
    /// # Errors
    ///
    /// Returns storage errors only; upstream failures map to
    /// [`ListenOutcome::FetchFailed`] without retry.
    #[instrument(skip(self), fields(hash = %note.tx_hash))]
    pub async fn process(&self, note: &RowInserted) -> Result<ListenOutcome> {
        if !self.in_flight.insert(note.tx_hash) {
            return Ok(ListenOutcome::DuplicateInFlight);
        }

        let outcome = self.process_inner(note).await;
        self.in_flight.remove(&note.tx_hash);
        outcome
    }

    async fn process_inner(&self, note: &RowInserted) -> Result<ListenOutcome> {
        let Some(base) = self.transactions.get(&note.tx_hash).await? else {
            warn!("Notification for missing base row");
            return Ok(ListenOutcome::MissingBaseRow);
        };

        if self.enrichments.exists(&note.tx_hash).await? {
            return Ok(ListenOutcome::AlreadyEnriched);
        }

        let fetched = timeout(
            self.settings.event_timeout(),
            self.feed.fetch_detail(&note.tx_hash.to_hex()),
        )
        .await;

        let detail = match fetched {
            Ok(Ok(detail)) => detail,
            Ok(Err(e)) => {
                // No retry in event mode; the gap filler owns recovery.
                debug!(error = %e, "Detail fetch failed, leaving to gap filler");
                metrics::counter!("enrichment_event_fetch_failed").increment(1);
                return Ok(ListenOutcome::FetchFailed);
            }
            Err(_) => {
                debug!("Detail fetch timed out, leaving to gap filler");
                metrics::counter!("enrichment_event_fetch_failed").increment(1);
                return Ok(ListenOutcome::FetchFailed);
            }
        };

        let record = build_enrichment(&detail, &base);
        self.enrichments.upsert(&record).await?;
        metrics::counter!("enrichment_rows_written").increment(1);
        Ok(ListenOutcome::Enriched)
    }
}
