//! Storage port traits for data persistence.
//!
//! These traits define the contract for persisting and retrieving domain
//! entities. Infrastructure adapters implement them using concrete storage
//! backends (PostgreSQL in production, in-memory for tests).
//!
//! # Write Ownership
//!
//! - a contract's cursor is written only by the ingest task currently
//!   owning that contract
//! - a contract's status is written only by the backfill orchestrator
//!   (and the operator CLI)
//! - enrichment rows are written only by the enrichment pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::entities::{
    BackfillJob, Contract, Cursor, EnrichmentRecord, NewContract, NewJob, TransactionRecord,
};
use crate::types::enums::{ContractStatus, JobStatus};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for contract registry and lifecycle persistence.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Key contracts by lowercase hex address (unique)
/// - Make [`try_claim`](Self::try_claim) a single conditional update so
///   two workers can never both claim the same contract
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Get a contract by address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get(&self, address: &EthAddress) -> Result<Option<Contract>>;

    /// Get a contract by surrogate id (job resolution).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get_by_id(&self, id: i64) -> Result<Option<Contract>>;

    /// Register a new contract in `pending` state; returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is already registered or the
    /// database operation fails.
    async fn insert(&self, contract: &NewContract) -> Result<i64>;

    /// List every registered contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list(&self) -> Result<Vec<Contract>>;

    /// Contracts eligible for the backfill scan: `pending`, `error`, or
    /// `indexing` whose last update is older than `stale_after` (crash
    /// recovery). Paused or inactive contracts are excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn backfill_candidates(&self, stale_after: chrono::Duration) -> Result<Vec<Contract>>;

    /// Contracts in `complete` status with indexing enabled, i.e. the adaptive
    /// poller's working set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn pollable(&self) -> Result<Vec<Contract>>;

    /// Atomically claim a contract for backfill by flipping
    /// `pending|error → indexing` (also reclaiming stale `indexing` rows
    /// older than `stale_after`). Returns `false` when another worker
    /// holds the claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn try_claim(&self, address: &EthAddress, stale_after: chrono::Duration)
    -> Result<bool>;

    /// Transition `indexing → complete`, snapshotting the cursor total.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_complete(&self, address: &EthAddress, total_indexed: u64) -> Result<()>;

    /// Transition to `error` with an operator-facing message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_error(&self, address: &EthAddress, message: &str) -> Result<()>;

    /// Operator-driven status override (e.g., back to `pending` after a
    /// cursor reset, or `paused`).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn set_status(&self, address: &EthAddress, status: ContractStatus) -> Result<()>;

    /// Refresh display progress fields and `last_indexed_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn touch_progress(
        &self,
        address: &EthAddress,
        current_block: Option<BlockNumber>,
        total_indexed: u64,
    ) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for per-contract ingestion position persistence.
///
/// The upsert is **additive** in `total_indexed` and must be atomic.
/// Concurrent upserts for the same address are disallowed by the
/// single-writer ownership rule; the store does not need to arbitrate
/// them.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Get the cursor for a contract; `None` before first ingestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get(&self, address: &EthAddress) -> Result<Option<Cursor>>;

    /// Advance the cursor: `total_indexed += delta_indexed`, replace the
    /// token and block. Setting `is_complete = true` clears the stored
    /// token regardless of `last_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert(
        &self,
        address: &EthAddress,
        last_token: Option<&str>,
        last_block: Option<BlockNumber>,
        delta_indexed: u64,
        is_complete: bool,
    ) -> Result<()>;

    /// Operator reset: clear token and block, zero the total, unset
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn reset(&self, address: &EthAddress) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for base-row persistence.
///
/// Base rows are append-only and idempotent on hash: implementations use
/// conflict-ignore semantics, and a duplicate insert is not an error.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a batch with conflict-ignore on the hash; returns the number
    /// of rows actually inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_batch(&self, rows: &[TransactionRecord]) -> Result<u64>;

    /// Whether a base row exists for this hash (poll early termination).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn contains(&self, hash: &TxHash) -> Result<bool>;

    /// Fetch one base row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get(&self, hash: &TxHash) -> Result<Option<TransactionRecord>>;

    /// Count base rows for a contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn count_for_contract(&self, address: &EthAddress) -> Result<u64>;

    /// Base rows for a contract that have no enrichment row yet, ordered
    /// by block timestamp ascending (stable), honoring limit/offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn pending_enrichment(
        &self,
        address: &EthAddress,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<TransactionRecord>>;

    /// Base rows inserted after `since` for a contract, backing the polling
    /// fallback's notification substitute.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn inserted_since(
        &self,
        address: &EthAddress,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<TransactionRecord>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENRICHMENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for enrichment-row persistence.
///
/// The upsert is idempotent: on conflict only `logs`, `operations`, and
/// `updated_at` change. All other columns keep their first-write values.
#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// Upsert a single enrichment row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert(&self, record: &EnrichmentRecord) -> Result<()>;

    /// Upsert a batch in one statement; returns rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert_batch(&self, records: &[EnrichmentRecord]) -> Result<u64>;

    /// Whether an enrichment row exists for this hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn exists(&self, hash: &TxHash) -> Result<bool>;

    /// Fetch one enrichment row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get(&self, hash: &TxHash) -> Result<Option<EnrichmentRecord>>;

    /// Count enrichment rows for a contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn count_for_contract(&self, address: &EthAddress) -> Result<u64>;

    /// Per-contract enrichment deficit: base rows minus enrichment rows,
    /// only contracts with a positive deficit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn deficit_by_contract(&self) -> Result<Vec<(EthAddress, u64)>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// JOB STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the backfill job queue.
///
/// The claim must be race-free: two claimants can never both receive the
/// same row (row-level lock or atomic update returning the claimed row).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job; returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn enqueue(&self, job: &NewJob) -> Result<BackfillJob>;

    /// The open (pending or processing) job for a contract, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn open_job_for_contract(&self, contract_id: i64) -> Result<Option<BackfillJob>>;

    /// Atomically claim the next eligible job: pending, attempts below
    /// budget, retry delay elapsed, lowest (priority, created_at). Flips
    /// it to processing and stamps `started_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn claim_next(&self) -> Result<Option<BackfillJob>>;

    /// Update coarse progress and the resume token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn set_progress(
        &self,
        id: i64,
        progress: f64,
        resume_token: Option<&str>,
    ) -> Result<()>;

    /// Mark completed, stamp `completed_at`, clear the error message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_completed(&self, id: i64) -> Result<()>;

    /// Record a failure: increment attempts; below the budget the job
    /// returns to pending with `run_after` pushed out exponentially,
    /// otherwise it becomes failed. Returns the resulting status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn record_failure(&self, id: i64, error: &str) -> Result<JobStatus>;

    /// Return a processing job to pending without consuming an attempt
    /// (graceful shutdown: the worker stopped, the work did not fail).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn release(&self, id: i64) -> Result<()>;

    /// Operator cancel on a pending or processing job. Returns `false`
    /// when the job was already terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn cancel(&self, id: i64) -> Result<bool>;

    /// Reset a failed job to pending with a fresh attempt budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not failed or the database
    /// operation fails.
    async fn retry(&self, id: i64) -> Result<()>;

    /// Fetch one job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get(&self, id: i64) -> Result<Option<BackfillJob>>;

    /// List jobs, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<BackfillJob>>;
}
