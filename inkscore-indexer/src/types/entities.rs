//! Domain entities for the indexing pipeline.
//!
//! These structs mirror the persisted shapes: contracts, cursors, base
//! transaction rows, enrichment rows, and backfill jobs. Conversion
//! to/from database rows lives in the store adapters; entities stay free
//! of sqlx types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::enums::{ContractStatus, IndexType, JobStatus};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// A contract registered for indexing.
///
/// Identity is the lowercase hex address (unique). `id` is the surrogate
/// key jobs reference. Progress fields are display-oriented; the cursor is
/// authoritative for ingestion position.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    /// Surrogate key.
    pub id: i64,
    /// Lowercase hex address (identity key).
    pub address: EthAddress,
    /// Chain the contract lives on.
    pub chain_id: u64,
    /// Deployment block, when known. Bounds RPC scans.
    pub deploy_block: Option<BlockNumber>,
    /// Operator toggle: whether the contract participates at all.
    pub active: bool,
    /// Operator toggle: whether ingestion loops may touch it.
    pub indexing_enabled: bool,
    /// What the scoring layer aggregates.
    pub index_type: IndexType,
    /// Lifecycle state.
    pub status: ContractStatus,
    /// Highest block reflected in progress displays.
    pub current_block: Option<BlockNumber>,
    /// Estimated total blocks in the backfill range.
    pub total_blocks: Option<u64>,
    /// Display-only progress, 0.0–100.0.
    pub progress_percent: f64,
    /// Snapshot of the cursor's total at last completion.
    pub total_indexed: u64,
    /// When ingestion last wrote rows for this contract.
    pub last_indexed_at: Option<DateTime<Utc>>,
    /// Operator-facing failure summary, set with status = error.
    pub error_message: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time; staleness checks use this.
    pub updated_at: DateTime<Utc>,
}

/// Fields for registering a new contract.
#[derive(Debug, Clone)]
pub struct NewContract {
    /// Lowercase hex address.
    pub address: EthAddress,
    /// Chain the contract lives on.
    pub chain_id: u64,
    /// Deployment block, when known.
    pub deploy_block: Option<BlockNumber>,
    /// What the scoring layer aggregates.
    pub index_type: IndexType,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistent ingestion position for one contract.
///
/// Invariants:
/// - `total_indexed` never decreases (upserts are additive)
/// - `is_complete = true` implies `last_page_token` is `None`
/// - only the single ingest task owning the contract writes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Owning contract address.
    pub contract_address: EthAddress,
    /// Opaque upstream pagination token; `None` once complete.
    pub last_page_token: Option<String>,
    /// Highest block observed by ingestion.
    pub last_block_indexed: Option<BlockNumber>,
    /// Monotonic count of rows the upstream stream has yielded.
    ///
    /// A lower bound on rows inserted: conflict-ignored duplicates still
    /// count, so callers must not treat this as an authoritative row count.
    pub total_indexed: u64,
    /// Whether forward pagination has reached end-of-stream.
    pub is_complete: bool,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl Cursor {
    /// A fresh cursor for a contract that has never been ingested.
    #[must_use]
    pub fn empty(contract_address: EthAddress) -> Self {
        Self {
            contract_address,
            last_page_token: None,
            last_block_indexed: None,
            total_indexed: 0,
            is_complete: false,
            updated_at: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION RECORD (base row)
// ═══════════════════════════════════════════════════════════════════════════════

/// The normalized base transaction row.
///
/// Inserted exactly once (idempotent on hash) and never mutated. Failed
/// transactions (status 0) are preserved; downstream consumers decide.
/// Every monetary and gas field is a [`WeiAmount`] decimal string.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// Primary key.
    pub tx_hash: TxHash,
    /// Sender, lowercase (the scored wallet).
    pub wallet_address: EthAddress,
    /// The queried contract, lowercase. Never derived from from/to.
    pub contract_address: EthAddress,
    /// Recipient; `None` for contract creation.
    pub to_address: Option<EthAddress>,
    /// First 4 bytes of input, lower-hex with 0x prefix.
    pub function_selector: Option<String>,
    /// Method signature prefix, e.g. `transfer`.
    pub function_name: Option<String>,
    /// Call input data (hex).
    pub input_data: Option<String>,
    /// ETH value in wei.
    pub eth_value: WeiAmount,
    /// Gas limit.
    pub gas_limit: Option<WeiAmount>,
    /// Gas used.
    pub gas_used: Option<WeiAmount>,
    /// Gas price.
    pub gas_price: Option<WeiAmount>,
    /// Effective gas price.
    pub effective_gas_price: Option<WeiAmount>,
    /// Max fee per gas.
    pub max_fee_per_gas: Option<WeiAmount>,
    /// Max priority fee per gas.
    pub max_priority_fee_per_gas: Option<WeiAmount>,
    /// Burned fees.
    pub burned_fees: Option<WeiAmount>,
    /// L1 gas used (OP-stack; null elsewhere).
    pub l1_gas_used: Option<WeiAmount>,
    /// L1 gas price (OP-stack; null elsewhere).
    pub l1_gas_price: Option<WeiAmount>,
    /// L1 data fee (OP-stack; null elsewhere).
    pub l1_fee: Option<WeiAmount>,
    /// Block number.
    pub block_number: BlockNumber,
    /// Block hash, when the source reports it.
    pub block_hash: Option<String>,
    /// Block timestamp.
    pub block_timestamp: DateTime<Utc>,
    /// Index within the block.
    pub tx_index: Option<u32>,
    /// Sender nonce.
    pub nonce: Option<u64>,
    /// Transaction type.
    pub tx_type: Option<i32>,
    /// Execution status: 1 success, 0 failure.
    pub status: i16,
    /// Chain id.
    pub chain_id: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENRICHMENT RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-transaction detail produced by the enrichment pipeline.
///
/// Inserted at most once per hash; a later re-enrichment updates only
/// `logs`, `operations`, and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRecord {
    /// Primary key; foreign key to the base row.
    pub tx_hash: TxHash,
    /// Owning contract, lowercase.
    pub contract_address: EthAddress,
    /// ETH value in wei.
    pub value: Option<WeiAmount>,
    /// Gas used.
    pub gas_used: Option<WeiAmount>,
    /// Gas price.
    pub gas_price: Option<WeiAmount>,
    /// Gas limit.
    pub gas_limit: Option<WeiAmount>,
    /// Burned fees.
    pub burned_fees: Option<WeiAmount>,
    /// L1 gas used.
    pub l1_gas_used: Option<WeiAmount>,
    /// L1 gas price.
    pub l1_gas_price: Option<WeiAmount>,
    /// L1 data fee.
    pub l1_fee: Option<WeiAmount>,
    /// Whether the contract is source-verified on the explorer.
    pub contract_verified: bool,
    /// Function selector.
    pub method_id: Option<String>,
    /// Full method signature.
    pub method_full: Option<String>,
    /// Call input data (hex).
    pub input: Option<String>,
    /// Structured log sequence (JSON array).
    pub logs: serde_json::Value,
    /// Structured operation sequence (JSON array).
    pub operations: serde_json::Value,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Last re-enrichment time.
    pub updated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKFILL JOB
// ═══════════════════════════════════════════════════════════════════════════════

/// Mutable payload of a backfill job.
///
/// Stored as JSONB so progress and resume state evolve without schema
/// changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Lowercase hex contract address.
    #[serde(default)]
    pub contract_address: String,
    /// Inclusive lower bound of the requested window.
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound of the requested window.
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
    /// Coarse progress, 0.0–100.0, updated at page granularity.
    #[serde(default)]
    pub progress: f64,
    /// Page token at the last checkpoint, for cancellation resume.
    #[serde(default)]
    pub resume_token: Option<String>,
}

/// An operator-created unit of backfill work.
///
/// Invariant (enforced at creation, not by schema): at most one job per
/// contract is pending or processing at any time.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillJob {
    /// Queue key.
    pub id: i64,
    /// Always `"backfill"` today; reserved for future job kinds.
    pub job_type: String,
    /// The contract this job targets.
    pub contract_id: i64,
    /// 1 = highest; claims order by (priority, created_at).
    pub priority: i32,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Mutable job state.
    pub payload: JobPayload,
    /// Failed attempts so far.
    pub attempts: i32,
    /// Attempt budget before the job is marked failed.
    pub max_attempts: i32,
    /// Last failure summary.
    pub error_message: Option<String>,
    /// Earliest claim time (retry backoff).
    pub run_after: DateTime<Utc>,
    /// Enqueue time.
    pub created_at: DateTime<Utc>,
    /// First claim time.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields for enqueuing a new backfill job.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// The contract this job targets.
    pub contract_id: i64,
    /// 1 = highest.
    pub priority: i32,
    /// Initial payload (window + contract address).
    pub payload: JobPayload,
    /// Attempt budget.
    pub max_attempts: i32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INGEST REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one ingest invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Pages fetched from the upstream.
    pub pages_fetched: u32,
    /// Items the upstream stream yielded (cursor delta basis).
    pub rows_returned: u64,
    /// Rows actually inserted at the sink (conflicts excluded).
    pub rows_inserted: u64,
    /// Items skipped by the canonical mapping (missing hash/sender).
    pub rows_skipped: u64,
    /// Highest block observed.
    pub newest_block: Option<BlockNumber>,
    /// Whether the stream reached its end.
    pub completed: bool,
    /// Whether a cancellation stopped the run at a page boundary.
    pub cancelled: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_cursor_defaults() {
        let addr = EthAddress::from_hex("0x00000000000000000000000000000000000000aa").unwrap();
        let cursor = Cursor::empty(addr);
        assert!(cursor.last_page_token.is_none());
        assert_eq!(cursor.total_indexed, 0);
        assert!(!cursor.is_complete);
    }

    #[test]
    fn job_payload_round_trips_through_json() {
        let payload = JobPayload {
            contract_address: "0x00000000000000000000000000000000000000bb".into(),
            from_date: Some("2025-01-01T00:00:00Z".parse().unwrap()),
            to_date: Some("2025-01-09T00:00:00Z".parse().unwrap()),
            progress: 37.5,
            resume_token: Some("tok-9".into()),
        };

        let json = serde_json::to_value(&payload).unwrap();
        let back: JobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn job_payload_tolerates_sparse_json() {
        let back: JobPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(back.progress, 0.0);
        assert!(back.resume_token.is_none());
    }
}
