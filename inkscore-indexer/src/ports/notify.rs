//! Notification source port for the event-driven enrichment mode.
//!
//! The storage layer emits a `{contract_address, tx_hash}` message when a
//! base row lands for a volume-indexed contract. The enrichment listener
//! consumes that stream through this trait; adapters exist for Postgres
//! LISTEN/NOTIFY and for a polling fallback on backends without native
//! notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::primitives::{EthAddress, TxHash};

/// One base-row-inserted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowInserted {
    /// The contract the row belongs to.
    pub contract_address: EthAddress,
    /// The inserted transaction hash.
    pub tx_hash: TxHash,
}

/// Port over the base-row notification channel.
///
/// `recv` blocks until a message arrives. Implementations are expected to
/// survive transient backend outages internally (reconnect, resume) and
/// only error when the channel is permanently gone.
#[async_trait]
pub trait NotificationSource: Send {
    /// Receive the next notification.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel is permanently closed.
    async fn recv(&mut self) -> Result<RowInserted>;
}
