//! Shared fixtures for the scenario test-suite.
//!
//! [`ScriptedFeed`] stands in for the explorer: listing pages are keyed by
//! the pagination token they answer to, detail responses are scripted per
//! hash in call order. Everything runs against [`MemoryStore`], which
//! mirrors the PostgreSQL adapter's semantics.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use routescan_client::types::{AddressRef, PageLink};
use routescan_client::{RoutescanError, TxDetail, TxItem, TxListQuery, TxListResponse};

use inkscore_indexer::config::{BackfillSettings, EnrichmentSettings, PollerSettings};
use inkscore_indexer::error::Result;
use inkscore_indexer::ingest::{Ingestor, IngestorConfig};
use inkscore_indexer::ports::{ContractStore, TransactionFeed};
use inkscore_indexer::store::MemoryStore;
use inkscore_indexer::types::entities::{Contract, NewContract};
use inkscore_indexer::types::enums::IndexType;
use inkscore_indexer::types::primitives::{EthAddress, TxHash};

pub const CHAIN_ID: u64 = 57073;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Deterministic contract address `n`.
pub fn contract_address(n: u8) -> EthAddress {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xC0;
    bytes[19] = n;
    EthAddress::new(bytes)
}

/// Deterministic wallet address `n`.
pub fn wallet_address(n: u8) -> EthAddress {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xAA;
    bytes[19] = n;
    EthAddress::new(bytes)
}

/// Deterministic transaction hash `n`.
pub fn tx_hash(n: u8) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x11;
    bytes[31] = n;
    TxHash::new(bytes)
}

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM ITEM BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// A well-formed explorer item for hash `n` at block `block`.
pub fn item(n: u8, block: u64) -> TxItem {
    TxItem {
        chain_id: Some(CHAIN_ID),
        block_number: Some(block),
        index: Some(0),
        timestamp: Some(format!("2025-06-01T12:{:02}:00Z", n.min(59))),
        from: Some(AddressRef {
            id: Some(wallet_address(n).to_hex()),
        }),
        to: Some(AddressRef {
            id: Some(contract_address(1).to_hex()),
        }),
        tx_hash: Some(tx_hash(n).to_hex()),
        value: Some("1000000000000000000".into()),
        gas_used: Some("21000".into()),
        method_id: Some("0xa9059cbb".into()),
        method: Some("transfer(address,uint256)".into()),
        status: Some(true),
        nonce: Some(u64::from(n)),
        tx_type: Some(2),
        input: Some("0xa9059cbb".into()),
        ..TxItem::default()
    }
}

/// A listing page answering to `token` (empty string = first page).
pub fn page(items: Vec<TxItem>, count: Option<u64>, next_token: Option<&str>) -> TxListResponse {
    TxListResponse {
        items,
        count,
        link: PageLink {
            next_token: next_token.map(ToString::to_string),
        },
    }
}

/// A minimal detail response for hash `n` with one log and one operation.
pub fn detail(n: u8) -> TxDetail {
    TxDetail {
        tx: TxItem {
            tx_hash: Some(tx_hash(n).to_hex()),
            gas_used: Some("53000".into()),
            value: Some("1000000000000000000".into()),
            method: Some("transfer(address,uint256)".into()),
            method_id: Some("0xa9059cbb".into()),
            ..TxItem::default()
        },
        logs: vec![routescan_client::types::LogEntry {
            address: Some(contract_address(1).to_hex()),
            topics: vec!["0xddf252ad".into()],
            data: Some("0x".into()),
            log_index: Some(0),
        }],
        operations: vec![routescan_client::types::Operation {
            op_type: Some("call".into()),
            from: Some(wallet_address(n).to_hex()),
            to: Some(contract_address(1).to_hex()),
            value: Some("1000000000000000000".into()),
        }],
        contract_verified: Some(true),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPTED FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    /// Serve the value.
    Ok(T),
    /// Fail with a transient upstream error (timeout class).
    Transient,
    /// Fail with a rate-limit error.
    RateLimited,
}

/// Scripted explorer stand-in.
///
/// Listing pages are keyed by the `nextToken` they answer to (empty key =
/// first page). Detail responses are per-hash queues consumed in call
/// order; a hash with an exhausted or missing queue gets a default
/// detail response.
#[derive(Default)]
pub struct ScriptedFeed {
    pages: Mutex<HashMap<String, Scripted<TxListResponse>>>,
    details: Mutex<HashMap<String, VecDeque<Scripted<TxDetail>>>>,
    pages_served: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the page answering to `token` (use `""` for the first page).
    pub fn script_page(&self, token: &str, response: Scripted<TxListResponse>) {
        self.pages.lock().insert(token.to_string(), response);
    }

    /// Append a scripted detail response for a hash.
    pub fn script_detail(&self, hash: &TxHash, response: Scripted<TxDetail>) {
        self.details
            .lock()
            .entry(hash.to_hex())
            .or_default()
            .push_back(response);
    }

    /// Tokens of pages served so far, in order.
    pub fn served(&self) -> Vec<String> {
        self.pages_served.lock().clone()
    }
}

#[async_trait]
impl TransactionFeed for ScriptedFeed {
    async fn fetch_page(&self, query: &TxListQuery) -> Result<TxListResponse> {
        let key = query.next_token.clone().unwrap_or_default();
        self.pages_served.lock().push(key.clone());

        match self.pages.lock().get(&key) {
            Some(Scripted::Ok(response)) => Ok(response.clone()),
            Some(Scripted::Transient) => Err(RoutescanError::Timeout.into()),
            Some(Scripted::RateLimited) => Err(RoutescanError::RateLimited {
                retry_after_secs: None,
            }
            .into()),
            None => Ok(page(vec![], Some(0), None)),
        }
    }

    async fn fetch_detail(&self, hash: &str) -> Result<TxDetail> {
        let scripted = self.details.lock().get_mut(hash).and_then(VecDeque::pop_front);

        match scripted {
            Some(Scripted::Ok(detail)) => Ok(detail),
            Some(Scripted::Transient) => Err(RoutescanError::Timeout.into()),
            Some(Scripted::RateLimited) => Err(RoutescanError::RateLimited {
                retry_after_secs: None,
            }
            .into()),
            None => Ok(TxDetail {
                tx: TxItem {
                    tx_hash: Some(hash.to_string()),
                    ..TxItem::default()
                },
                ..TxDetail::default()
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fast-test ingestor config (no real pacing delays).
pub fn ingestor_config() -> IngestorConfig {
    IngestorConfig {
        page_limit: 50,
        min_request_delay: std::time::Duration::from_millis(1),
        poll_page_cap: 10,
        insert_chunk_size: 500,
        default_chain_id: CHAIN_ID,
    }
}

/// Build an ingestor over a scripted feed and a shared memory store.
pub fn ingestor(feed: Arc<ScriptedFeed>, store: Arc<MemoryStore>) -> Arc<Ingestor> {
    Arc::new(Ingestor::new(
        feed,
        store.clone(),
        store,
        ingestor_config(),
    ))
}

/// Backfill settings tuned for tests.
pub fn backfill_settings() -> BackfillSettings {
    BackfillSettings {
        workers: 3,
        scan_interval_ms: 50,
        stale_after_ms: 1_800_000,
        job_max_attempts: 3,
        insert_chunk_size: 500,
    }
}

/// Poller settings matching the production interval table.
pub fn poller_settings() -> PollerSettings {
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

/// Enrichment settings tuned for tests (short pacing and timeouts).
pub fn enrichment_settings() -> EnrichmentSettings {
    EnrichmentSettings {
        workers: 2,
        batch_size: 500,
        fetch_fanout: 5,
        event_timeout_ms: 1000,
        gap_timeout_ms: 1000,
        pace_ms: 1,
        detail_retries: 1,
        gap_interval_ms: 300_000,
        channel: "new_volume_transaction".into(),
        use_polling_fallback: false,
        poll_interval_ms: 1000,
    }
}

/// Register contract `n` and return it.
pub async fn register_contract(
    store: &Arc<MemoryStore>,
    n: u8,
    index_type: IndexType,
) -> Contract {
    let address = contract_address(n);
    ContractStore::insert(
        store.as_ref(),
        &NewContract {
            address,
            chain_id: CHAIN_ID,
            deploy_block: None,
            index_type,
        },
    )
    .await
    .expect("register contract");

    ContractStore::get(store.as_ref(), &address)
        .await
        .expect("load contract")
        .expect("contract present")
}
