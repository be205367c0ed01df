//! Notification source adapters for the enrichment listener.
//!
//! - [`PgNotificationSource`] - Postgres LISTEN/NOTIFY on the channel the
//!   base-row insert trigger fires
//! - [`PollingNotificationSource`] - at-most-once-per-second table polling
//!   for backends without native notifications
//! - [`ChannelNotificationSource`] - in-process mpsc feed for tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPool};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{InfraError, Result};
use crate::ports::{ContractStore, NotificationSource, RowInserted, TransactionStore};
use crate::types::enums::IndexType;
use crate::types::primitives::{EthAddress, TxHash};

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES LISTEN/NOTIFY
// ═══════════════════════════════════════════════════════════════════════════════

/// Wire payload emitted by the insert trigger.
#[derive(Debug, serde::Deserialize)]
struct NotifyPayload {
    contract_address: String,
    tx_hash: String,
}

/// LISTEN/NOTIFY adapter over a dedicated listener connection.
pub struct PgNotificationSource {
    listener: PgListener,
}

impl std::fmt::Debug for PgNotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgNotificationSource").finish_non_exhaustive()
    }
}

impl PgNotificationSource {
    /// Connect a listener on the given channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener connection cannot be established.
    pub async fn connect(pool: &PgPool, channel: &str) -> Result<Self> {
        let mut listener = PgListener::connect_with(pool)
            .await
            .map_err(InfraError::Database)?;
        listener
            .listen(channel)
            .await
            .map_err(InfraError::Database)?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn recv(&mut self) -> Result<RowInserted> {
        loop {
            // PgListener reconnects transparently between calls; an error
            // here is a transient gap, not a terminal condition.
            let notification = match self.listener.recv().await {
                Ok(notification) => notification,
                Err(e) => {
                    warn!(error = %e, "Notification connection hiccup, retrying");
                    sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let payload: NotifyPayload = match serde_json::from_str(notification.payload()) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Malformed notification payload, dropping");
                    continue;
                }
            };

            let parsed = EthAddress::from_hex(&payload.contract_address)
                .ok()
                .zip(TxHash::from_hex(&payload.tx_hash).ok());
            match parsed {
                Some((contract_address, tx_hash)) => {
                    return Ok(RowInserted {
                        contract_address,
                        tx_hash,
                    });
                }
                None => {
                    warn!("Unparseable identifiers in notification, dropping");
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLLING FALLBACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Polling substitute for LISTEN/NOTIFY, capped at one scan per second.
///
/// Scans volume-indexed contracts for base rows inserted since the last
/// sweep and feeds them to the listener one at a time.
pub struct PollingNotificationSource {
    contracts: Arc<dyn ContractStore>,
    transactions: Arc<dyn TransactionStore>,
    interval: Duration,
    last_sweep: DateTime<Utc>,
    queue: VecDeque<RowInserted>,
}

impl std::fmt::Debug for PollingNotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingNotificationSource")
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl PollingNotificationSource {
    /// Create a polling source. `interval` is clamped to at least 1 s.
    #[must_use]
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        transactions: Arc<dyn TransactionStore>,
        interval: Duration,
    ) -> Self {
        Self {
            contracts,
            transactions,
            interval: interval.max(Duration::from_secs(1)),
            last_sweep: Utc::now(),
            queue: VecDeque::new(),
        }
    }

    async fn sweep(&mut self) -> Result<()> {
        let sweep_started = Utc::now();
        let contracts = self.contracts.list().await?;

        for contract in contracts
            .iter()
            .filter(|c| c.index_type == IndexType::Volume && c.active)
        {
            let rows = self
                .transactions
                .inserted_since(&contract.address, self.last_sweep, 500)
                .await?;
            for row in rows {
                self.queue.push_back(RowInserted {
                    contract_address: row.contract_address,
                    tx_hash: row.tx_hash,
                });
            }
        }

        debug!(queued = self.queue.len(), "Polling sweep complete");
        self.last_sweep = sweep_started;
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for PollingNotificationSource {
    async fn recv(&mut self) -> Result<RowInserted> {
        loop {
            if let Some(note) = self.queue.pop_front() {
                return Ok(note);
            }
            sleep(self.interval).await;
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "Polling sweep failed");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-PROCESS CHANNEL (tests)
// ═══════════════════════════════════════════════════════════════════════════════

/// Test source backed by an in-process channel.
#[derive(Debug)]
pub struct ChannelNotificationSource {
    receiver: mpsc::UnboundedReceiver<RowInserted>,
}

impl ChannelNotificationSource {
    /// Create a source and its sending half.
    #[must_use]
    pub fn new() -> (mpsc::UnboundedSender<RowInserted>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }
}

#[async_trait]
impl NotificationSource for ChannelNotificationSource {
    async fn recv(&mut self) -> Result<RowInserted> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| InfraError::Internal("Notification channel closed".into()).into())
    }
}
