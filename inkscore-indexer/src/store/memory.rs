//! In-memory implementation of the store ports.
//!
//! Backs the scenario test-suite and local experimentation without a
//! database. Semantics mirror the PostgreSQL adapter: conflict-ignore
//! base inserts, additive cursor upserts with monotonic completion, and
//! enrichment upserts that only touch `logs`/`operations`/`updated_at`
//! after the first write.
//!
//! Not intended for production use; nothing here survives a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{DomainError, Result};
use crate::ports::{ContractStore, CursorStore, EnrichmentStore, JobStore, TransactionStore};
use crate::types::entities::{
    BackfillJob, Contract, Cursor, EnrichmentRecord, NewContract, NewJob, TransactionRecord,
};
use crate::types::enums::{ContractStatus, JobStatus};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash};

// ═══════════════════════════════════════════════════════════════════════════════
// MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory store implementing every port trait.
///
/// Cloning shares the underlying state, mirroring how a pool-backed store
/// clones cheaply.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    contracts: RwLock<HashMap<EthAddress, Contract>>,
    cursors: RwLock<HashMap<EthAddress, Cursor>>,
    transactions: RwLock<HashMap<TxHash, TransactionRecord>>,
    insertion_log: RwLock<Vec<(DateTime<Utc>, TxHash)>>,
    enrichments: RwLock<HashMap<TxHash, EnrichmentRecord>>,
    jobs: RwLock<HashMap<i64, BackfillJob>>,
    next_contract_id: AtomicI64,
    next_job_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total base rows across all contracts (test helper).
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.inner.transactions.read().len()
    }

    /// Total enrichment rows across all contracts (test helper).
    #[must_use]
    pub fn enrichment_count(&self) -> usize {
        self.inner.enrichments.read().len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ContractStore for MemoryStore {
    async fn get(&self, address: &EthAddress) -> Result<Option<Contract>> {
        Ok(self.inner.contracts.read().get(address).cloned())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Contract>> {
        Ok(self
            .inner
            .contracts
            .read()
            .values()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn insert(&self, contract: &NewContract) -> Result<i64> {
        let mut contracts = self.inner.contracts.write();
        if contracts.contains_key(&contract.address) {
            return Err(DomainError::InvalidStateTransition {
                from: "registered".into(),
                to: "registered".into(),
            }
            .into());
        }

        let id = self.inner.next_contract_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        contracts.insert(
            contract.address,
            Contract {
                id,
                address: contract.address,
                chain_id: contract.chain_id,
                deploy_block: contract.deploy_block,
                active: true,
                indexing_enabled: true,
                index_type: contract.index_type,
                status: ContractStatus::Pending,
                current_block: None,
                total_blocks: None,
                progress_percent: 0.0,
                total_indexed: 0,
                last_indexed_at: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<Contract>> {
        let mut all: Vec<Contract> = self.inner.contracts.read().values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }

    async fn backfill_candidates(&self, stale_after: chrono::Duration) -> Result<Vec<Contract>> {
        let threshold = Utc::now() - stale_after;
        let mut candidates: Vec<Contract> = self
            .inner
            .contracts
            .read()
            .values()
            .filter(|c| c.active && c.indexing_enabled)
            .filter(|c| {
                matches!(c.status, ContractStatus::Pending | ContractStatus::Error)
                    || (c.status == ContractStatus::Indexing && c.updated_at < threshold)
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|c| c.created_at);
        Ok(candidates)
    }

    async fn pollable(&self) -> Result<Vec<Contract>> {
        let mut pollable: Vec<Contract> = self
            .inner
            .contracts
            .read()
            .values()
            .filter(|c| c.active && c.indexing_enabled && c.status == ContractStatus::Complete)
            .cloned()
            .collect();
        pollable.sort_by_key(|c| c.created_at);
        Ok(pollable)
    }

    async fn try_claim(
        &self,
        address: &EthAddress,
        stale_after: chrono::Duration,
    ) -> Result<bool> {
        let threshold = Utc::now() - stale_after;
        let mut contracts = self.inner.contracts.write();
        let Some(contract) = contracts.get_mut(address) else {
            return Ok(false);
        };

        let claimable = contract.active
            && contract.indexing_enabled
            && (matches!(
                contract.status,
                ContractStatus::Pending | ContractStatus::Error
            ) || (contract.status == ContractStatus::Indexing
                && contract.updated_at < threshold));

        if claimable {
            contract.status = ContractStatus::Indexing;
            contract.error_message = None;
            contract.updated_at = Utc::now();
        }
        Ok(claimable)
    }

    async fn mark_complete(&self, address: &EthAddress, total_indexed: u64) -> Result<()> {
        if let Some(contract) = self.inner.contracts.write().get_mut(address) {
            contract.status = ContractStatus::Complete;
            contract.total_indexed = total_indexed;
            contract.progress_percent = 100.0;
            contract.last_indexed_at = Some(Utc::now());
            contract.error_message = None;
            contract.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_error(&self, address: &EthAddress, message: &str) -> Result<()> {
        if let Some(contract) = self.inner.contracts.write().get_mut(address) {
            contract.status = ContractStatus::Error;
            contract.error_message = Some(message.to_string());
            contract.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(&self, address: &EthAddress, status: ContractStatus) -> Result<()> {
        if let Some(contract) = self.inner.contracts.write().get_mut(address) {
            contract.status = status;
            contract.error_message = None;
            contract.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn touch_progress(
        &self,
        address: &EthAddress,
        current_block: Option<BlockNumber>,
        total_indexed: u64,
    ) -> Result<()> {
        if let Some(contract) = self.inner.contracts.write().get_mut(address) {
            if current_block.is_some() {
                contract.current_block = current_block;
            }
            contract.total_indexed = total_indexed;
            contract.last_indexed_at = Some(Utc::now());
            contract.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl CursorStore for MemoryStore {
    async fn get(&self, address: &EthAddress) -> Result<Option<Cursor>> {
        Ok(self.inner.cursors.read().get(address).cloned())
    }

    async fn upsert(
        &self,
        address: &EthAddress,
        last_token: Option<&str>,
        last_block: Option<BlockNumber>,
        delta_indexed: u64,
        is_complete: bool,
    ) -> Result<()> {
        let mut cursors = self.inner.cursors.write();
        let cursor = cursors
            .entry(*address)
            .or_insert_with(|| Cursor::empty(*address));

        // Completion is monotonic; a complete cursor never regains a token.
        cursor.is_complete = cursor.is_complete || is_complete;
        cursor.last_page_token = if cursor.is_complete {
            None
        } else {
            last_token.map(ToString::to_string)
        };
        cursor.last_block_indexed = match (cursor.last_block_indexed, last_block) {
            (Some(current), Some(new)) => Some(current.max(new)),
            (current, new) => new.or(current),
        };
        cursor.total_indexed += delta_indexed;
        cursor.updated_at = Utc::now();
        Ok(())
    }

    async fn reset(&self, address: &EthAddress) -> Result<()> {
        if let Some(cursor) = self.inner.cursors.write().get_mut(address) {
            cursor.last_page_token = None;
            cursor.last_block_indexed = None;
            cursor.total_indexed = 0;
            cursor.is_complete = false;
            cursor.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_batch(&self, rows: &[TransactionRecord]) -> Result<u64> {
        let mut transactions = self.inner.transactions.write();
        let mut log = self.inner.insertion_log.write();
        let mut inserted = 0u64;

        for row in rows {
            if transactions.contains_key(&row.tx_hash) {
                continue; // Conflict-ignore
            }
            transactions.insert(row.tx_hash, row.clone());
            log.push((Utc::now(), row.tx_hash));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn contains(&self, hash: &TxHash) -> Result<bool> {
        Ok(self.inner.transactions.read().contains_key(hash))
    }

    async fn get(&self, hash: &TxHash) -> Result<Option<TransactionRecord>> {
        Ok(self.inner.transactions.read().get(hash).cloned())
    }

    async fn count_for_contract(&self, address: &EthAddress) -> Result<u64> {
        Ok(self
            .inner
            .transactions
            .read()
            .values()
            .filter(|t| t.contract_address == *address)
            .count() as u64)
    }

    async fn pending_enrichment(
        &self,
        address: &EthAddress,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let enrichments = self.inner.enrichments.read();
        let mut pending: Vec<TransactionRecord> = self
            .inner
            .transactions
            .read()
            .values()
            .filter(|t| t.contract_address == *address)
            .filter(|t| !enrichments.contains_key(&t.tx_hash))
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.block_timestamp
                .cmp(&b.block_timestamp)
                .then_with(|| a.tx_hash.to_hex().cmp(&b.tx_hash.to_hex()))
        });

        Ok(pending
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn inserted_since(
        &self,
        address: &EthAddress,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let transactions = self.inner.transactions.read();
        let log = self.inner.insertion_log.read();

        Ok(log
            .iter()
            .filter(|(at, _)| *at > since)
            .filter_map(|(_, hash)| transactions.get(hash))
            .filter(|t| t.contract_address == *address)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENRICHMENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl EnrichmentStore for MemoryStore {
    async fn upsert(&self, record: &EnrichmentRecord) -> Result<()> {
        let mut enrichments = self.inner.enrichments.write();
        match enrichments.get_mut(&record.tx_hash) {
            Some(existing) => {
                // Re-enrichment touches only logs, operations, updated_at.
                existing.logs = record.logs.clone();
                existing.operations = record.operations.clone();
                existing.updated_at = Utc::now();
            }
            None => {
                enrichments.insert(record.tx_hash, record.clone());
            }
        }
        Ok(())
    }

    async fn upsert_batch(&self, records: &[EnrichmentRecord]) -> Result<u64> {
        for record in records {
            EnrichmentStore::upsert(self, record).await?;
        }
        Ok(records.len() as u64)
    }

    async fn exists(&self, hash: &TxHash) -> Result<bool> {
        Ok(self.inner.enrichments.read().contains_key(hash))
    }

    async fn get(&self, hash: &TxHash) -> Result<Option<EnrichmentRecord>> {
        Ok(self.inner.enrichments.read().get(hash).cloned())
    }

    async fn count_for_contract(&self, address: &EthAddress) -> Result<u64> {
        Ok(self
            .inner
            .enrichments
            .read()
            .values()
            .filter(|e| e.contract_address == *address)
            .count() as u64)
    }

    async fn deficit_by_contract(&self) -> Result<Vec<(EthAddress, u64)>> {
        let enrichments = self.inner.enrichments.read();
        let mut deficits: HashMap<EthAddress, u64> = HashMap::new();

        for tx in self.inner.transactions.read().values() {
            if !enrichments.contains_key(&tx.tx_hash) {
                *deficits.entry(tx.contract_address).or_default() += 1;
            }
        }

        let mut result: Vec<(EthAddress, u64)> = deficits.into_iter().collect();
        result.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JOB STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, job: &NewJob) -> Result<BackfillJob> {
        let id = self.inner.next_job_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let created = BackfillJob {
            id,
            job_type: "backfill".into(),
            contract_id: job.contract_id,
            priority: job.priority,
            status: JobStatus::Pending,
            payload: job.payload.clone(),
            attempts: 0,
            max_attempts: job.max_attempts,
            error_message: None,
            run_after: now,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        self.inner.jobs.write().insert(id, created.clone());
        Ok(created)
    }

    async fn open_job_for_contract(&self, contract_id: i64) -> Result<Option<BackfillJob>> {
        Ok(self
            .inner
            .jobs
            .read()
            .values()
            .filter(|j| j.contract_id == contract_id && j.status.is_open())
            .min_by_key(|j| j.created_at)
            .cloned())
    }

    async fn claim_next(&self) -> Result<Option<BackfillJob>> {
        let now = Utc::now();
        let mut jobs = self.inner.jobs.write();

        let candidate = jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending && j.attempts < j.max_attempts && j.run_after <= now
            })
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            })
            .map(|j| j.id);

        let Some(id) = candidate else {
            return Ok(None);
        };

        let job = jobs.get_mut(&id).ok_or(crate::error::InfraError::NotFound)?;
        job.status = JobStatus::Processing;
        job.started_at.get_or_insert(now);
        Ok(Some(job.clone()))
    }

    async fn set_progress(&self, id: i64, progress: f64, resume_token: Option<&str>) -> Result<()> {
        if let Some(job) = self.inner.jobs.write().get_mut(&id) {
            job.payload.progress = progress;
            job.payload.resume_token = resume_token.map(ToString::to_string);
        }
        Ok(())
    }

    async fn mark_completed(&self, id: i64) -> Result<()> {
        if let Some(job) = self.inner.jobs.write().get_mut(&id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.error_message = None;
        }
        Ok(())
    }

    async fn record_failure(&self, id: i64, error: &str) -> Result<JobStatus> {
        let mut jobs = self.inner.jobs.write();
        let job = jobs
            .get_mut(&id)
            .ok_or(crate::error::InfraError::NotFound)?;

        job.attempts += 1;
        job.error_message = Some(error.to_string());
        if job.attempts < job.max_attempts {
            job.status = JobStatus::Pending;
            let delay_secs = 60i64.saturating_mul(2i64.saturating_pow(job.attempts as u32 - 1));
            job.run_after = Utc::now() + chrono::Duration::seconds(delay_secs);
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
        }
        Ok(job.status)
    }

    async fn release(&self, id: i64) -> Result<()> {
        if let Some(job) = self.inner.jobs.write().get_mut(&id)
            && job.status == JobStatus::Processing
        {
            job.status = JobStatus::Pending;
        }
        Ok(())
    }

    async fn cancel(&self, id: i64) -> Result<bool> {
        let mut jobs = self.inner.jobs.write();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };

        if job.status.is_open() {
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn retry(&self, id: i64) -> Result<()> {
        let mut jobs = self.inner.jobs.write();
        let job = jobs
            .get_mut(&id)
            .ok_or(DomainError::JobNotFound(id))?;

        if job.status != JobStatus::Failed {
            return Err(DomainError::InvalidStateTransition {
                from: job.status.to_string(),
                to: JobStatus::Pending.to_string(),
            }
            .into());
        }

        job.status = JobStatus::Pending;
        job.attempts = 0;
        job.error_message = None;
        job.run_after = Utc::now();
        job.completed_at = None;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<BackfillJob>> {
        Ok(self.inner.jobs.read().get(&id).cloned())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<BackfillJob>> {
        let mut jobs: Vec<BackfillJob> = self
            .inner
            .jobs
            .read()
            .values()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::enums::IndexType;
    use crate::types::primitives::WeiAmount;

    fn addr(n: u8) -> EthAddress {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        EthAddress::new(bytes)
    }

    fn hash(n: u8) -> TxHash {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        TxHash::new(bytes)
    }

    fn record(n: u8, contract: EthAddress) -> TransactionRecord {
        TransactionRecord {
            tx_hash: hash(n),
            wallet_address: addr(0xEE),
            contract_address: contract,
            to_address: Some(contract),
            function_selector: None,
            function_name: None,
            input_data: None,
            eth_value: WeiAmount::zero(),
            gas_limit: None,
            gas_used: None,
            gas_price: None,
            effective_gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            burned_fees: None,
            l1_gas_used: None,
            l1_gas_price: None,
            l1_fee: None,
            block_number: BlockNumber::new(u64::from(n)),
            block_hash: None,
            block_timestamp: Utc::now(),
            tx_index: None,
            nonce: None,
            tx_type: None,
            status: 1,
            chain_id: 57073,
        }
    }

    #[tokio::test]
    async fn insert_batch_is_conflict_ignore() {
        let store = MemoryStore::new();
        let contract = addr(1);
        let rows = vec![record(1, contract), record(1, contract), record(2, contract)];

        let inserted = store.insert_batch(&rows).await.unwrap();
        assert_eq!(inserted, 2);

        // Replay inserts nothing new.
        let replayed = store.insert_batch(&rows).await.unwrap();
        assert_eq!(replayed, 0);
        assert_eq!(store.transaction_count(), 2);
    }

    #[tokio::test]
    async fn cursor_upsert_is_additive_and_monotonic() {
        let store = MemoryStore::new();
        let contract = addr(2);

        CursorStore::upsert(&store, &contract, Some("tok-1"), Some(BlockNumber::new(10)), 50, false)
            .await
            .unwrap();
        CursorStore::upsert(&store, &contract, None, Some(BlockNumber::new(20)), 25, true)
            .await
            .unwrap();

        let cursor = CursorStore::get(&store, &contract).await.unwrap().unwrap();
        assert_eq!(cursor.total_indexed, 75);
        assert!(cursor.is_complete);
        assert!(cursor.last_page_token.is_none());

        // A later poll write cannot un-complete the cursor.
        CursorStore::upsert(&store, &contract, Some("stray"), None, 1, true)
            .await
            .unwrap();
        let cursor = CursorStore::get(&store, &contract).await.unwrap().unwrap();
        assert!(cursor.is_complete);
        assert!(cursor.last_page_token.is_none());
        assert_eq!(cursor.total_indexed, 76);
    }

    #[tokio::test]
    async fn try_claim_is_exclusive() {
        let store = MemoryStore::new();
        let contract = addr(3);
        store
            .insert(&NewContract {
                address: contract,
                chain_id: 57073,
                deploy_block: None,
                index_type: IndexType::Count,
            })
            .await
            .unwrap();

        let stale = chrono::Duration::minutes(30);
        assert!(store.try_claim(&contract, stale).await.unwrap());
        // Second claim finds the contract already indexing and not stale.
        assert!(!store.try_claim(&contract, stale).await.unwrap());
    }

    #[tokio::test]
    async fn enrichment_upsert_preserves_first_write() {
        let store = MemoryStore::new();
        let contract = addr(4);
        store.insert_batch(&[record(9, contract)]).await.unwrap();

        let first = EnrichmentRecord {
            tx_hash: hash(9),
            contract_address: contract,
            value: Some(WeiAmount::parse("100").unwrap()),
            gas_used: None,
            gas_price: None,
            gas_limit: None,
            burned_fees: None,
            l1_gas_used: None,
            l1_gas_price: None,
            l1_fee: None,
            contract_verified: true,
            method_id: Some("0xdeadbeef".into()),
            method_full: None,
            input: None,
            logs: serde_json::json!([]),
            operations: serde_json::json!([]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        EnrichmentStore::upsert(&store, &first).await.unwrap();

        let mut second = first.clone();
        second.value = Some(WeiAmount::parse("999").unwrap());
        second.logs = serde_json::json!([{"address": "0xfeed"}]);
        EnrichmentStore::upsert(&store, &second).await.unwrap();

        let stored = EnrichmentStore::get(&store, &hash(9)).await.unwrap().unwrap();
        // Value kept from the first write; logs from the second.
        assert_eq!(stored.value, Some(WeiAmount::parse("100").unwrap()));
        assert_eq!(stored.logs, serde_json::json!([{"address": "0xfeed"}]));
    }

    #[tokio::test]
    async fn job_claim_orders_by_priority_then_age() {
        let store = MemoryStore::new();
        let low = store
            .enqueue(&NewJob {
                contract_id: 1,
                priority: 5,
                payload: Default::default(),
                max_attempts: 3,
            })
            .await
            .unwrap();
        let high = store
            .enqueue(&NewJob {
                contract_id: 2,
                priority: 1,
                payload: Default::default(),
                max_attempts: 3,
            })
            .await
            .unwrap();

        let first = store.claim_next().await.unwrap().unwrap();
        assert_eq!(first.id, high.id);
        let second = store.claim_next().await.unwrap().unwrap();
        assert_eq!(second.id, low.id);
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn job_failure_retries_until_budget() {
        let store = MemoryStore::new();
        let job = store
            .enqueue(&NewJob {
                contract_id: 1,
                priority: 1,
                payload: Default::default(),
                max_attempts: 2,
            })
            .await
            .unwrap();

        assert_eq!(
            store.record_failure(job.id, "boom").await.unwrap(),
            JobStatus::Pending
        );
        assert_eq!(
            store.record_failure(job.id, "boom again").await.unwrap(),
            JobStatus::Failed
        );

        // Failed jobs can be retried by the operator.
        store.retry(job.id).await.unwrap();
        let retried = JobStore::get(&store, job.id).await.unwrap().unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.attempts, 0);
    }

    #[tokio::test]
    async fn cancel_only_open_jobs() {
        let store = MemoryStore::new();
        let job = store
            .enqueue(&NewJob {
                contract_id: 1,
                priority: 1,
                payload: Default::default(),
                max_attempts: 3,
            })
            .await
            .unwrap();

        assert!(store.cancel(job.id).await.unwrap());
        // Already cancelled: no-op.
        assert!(!store.cancel(job.id).await.unwrap());
    }
}
