//! Upstream feed port over the explorer API.
//!
//! The ingest and enrichment pipelines talk to the explorer through this
//! trait rather than the concrete client, so tests can script pages and
//! details without a network.

use async_trait::async_trait;
use routescan_client::{RoutescanClient, TxDetail, TxListQuery, TxListResponse};

use crate::error::Result;

/// Port over the explorer list and detail endpoints.
///
/// Implementations own their retry policy; callers treat any surfaced
/// error as already-retried and classify it per the error taxonomy.
#[async_trait]
pub trait TransactionFeed: Send + Sync {
    /// Fetch one page of the per-contract transaction listing.
    ///
    /// # Errors
    ///
    /// Returns an error when the upstream is unavailable after the
    /// implementation's retry budget.
    async fn fetch_page(&self, query: &TxListQuery) -> Result<TxListResponse>;

    /// Fetch the full detail for one transaction hash.
    ///
    /// # Errors
    ///
    /// Returns a permanent error for unknown hashes (404) and a transient
    /// error when the upstream is unavailable.
    async fn fetch_detail(&self, hash: &str) -> Result<TxDetail>;
}

#[async_trait]
impl TransactionFeed for RoutescanClient {
    async fn fetch_page(&self, query: &TxListQuery) -> Result<TxListResponse> {
        Ok(self.list_transactions(query).await?)
    }

    async fn fetch_detail(&self, hash: &str) -> Result<TxDetail> {
        Ok(self.transaction_detail(hash).await?)
    }
}
