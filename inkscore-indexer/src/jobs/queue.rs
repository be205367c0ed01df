//! Operator-facing job queue facade.
//!
//! Wraps the [`JobStore`] port with the business rules the schema does not
//! enforce: at most one open (pending or processing) job per contract,
//! a sane date window, and status-aware cancel/retry transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::error::{DomainError, Result};
use crate::ports::{ContractStore, JobStore};
use crate::types::entities::{BackfillJob, JobPayload, NewJob};
use crate::types::enums::JobStatus;
use crate::types::primitives::EthAddress;

// ═══════════════════════════════════════════════════════════════════════════════
// JOB QUEUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Facade over the job store enforcing creation-time invariants.
#[derive(Clone)]
pub struct JobQueue {
    jobs: Arc<dyn JobStore>,
    contracts: Arc<dyn ContractStore>,
    default_max_attempts: i32,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("default_max_attempts", &self.default_max_attempts)
            .finish_non_exhaustive()
    }
}

impl JobQueue {
    /// Create a queue facade.
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        contracts: Arc<dyn ContractStore>,
        default_max_attempts: i32,
    ) -> Self {
        Self {
            jobs,
            contracts,
            default_max_attempts,
        }
    }

    /// Enqueue a backfill job for a contract.
    ///
    /// # Errors
    ///
    /// - [`DomainError::ContractNotFound`] for unregistered addresses
    /// - [`DomainError::DuplicateJob`] when the contract already has an
    ///   open job (the creation-time exclusivity invariant)
    /// - [`DomainError::InvalidDateRange`] when `from_date > to_date`
    #[instrument(skip(self), fields(address = %address, priority))]
    pub async fn enqueue_backfill(
        &self,
        address: &EthAddress,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
        priority: i32,
    ) -> Result<BackfillJob> {
        if let (Some(from), Some(to)) = (from_date, to_date)
            && from > to
        {
            return Err(DomainError::InvalidDateRange(format!(
                "from_date {from} is after to_date {to}"
            ))
            .into());
        }

        let contract = self
            .contracts
            .get(address)
            .await?
            .ok_or_else(|| DomainError::ContractNotFound(address.to_hex()))?;

        if let Some(open) = self.jobs.open_job_for_contract(contract.id).await? {
            return Err(DomainError::DuplicateJob {
                contract_id: contract.id,
                job_id: open.id,
            }
            .into());
        }

        let job = self
            .jobs
            .enqueue(&NewJob {
                contract_id: contract.id,
                priority,
                payload: JobPayload {
                    contract_address: address.to_hex(),
                    from_date,
                    to_date,
                    progress: 0.0,
                    resume_token: None,
                },
                max_attempts: self.default_max_attempts,
            })
            .await?;

        info!(id = job.id, "Backfill job enqueued");
        Ok(job)
    }

    /// Cancel a pending or processing job.
    ///
    /// A processing worker observes the cancellation at its next page
    /// checkpoint and exits cleanly with the cursor preserved.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobNotFound`] for unknown ids and
    /// [`DomainError::InvalidStateTransition`] for jobs already terminal.
    #[instrument(skip(self), fields(id))]
    pub async fn cancel(&self, id: i64) -> Result<BackfillJob> {
        let job = self
            .jobs
            .get(id)
            .await?
            .ok_or(DomainError::JobNotFound(id))?;

        if !self.jobs.cancel(id).await? {
            return Err(DomainError::InvalidStateTransition {
                from: job.status.to_string(),
                to: JobStatus::Cancelled.to_string(),
            }
            .into());
        }

        info!(id, "Job cancelled");
        self.jobs
            .get(id)
            .await?
            .ok_or_else(|| DomainError::JobNotFound(id).into())
    }

    /// Reset a failed job to pending with a fresh attempt budget.
    ///
    /// # Errors
    ///
    /// Returns an error when the job is missing or not failed.
    #[instrument(skip(self), fields(id))]
    pub async fn retry(&self, id: i64) -> Result<BackfillJob> {
        self.jobs.retry(id).await?;
        info!(id, "Job queued for retry");
        self.jobs
            .get(id)
            .await?
            .ok_or_else(|| DomainError::JobNotFound(id).into())
    }

    /// Fetch one job.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn get(&self, id: i64) -> Result<Option<BackfillJob>> {
        self.jobs.get(id).await
    }

    /// List jobs, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<BackfillJob>> {
        self.jobs.list(status).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::store::MemoryStore;
    use crate::types::entities::NewContract;
    use crate::types::enums::IndexType;

    async fn setup() -> (JobQueue, EthAddress) {
        let store = Arc::new(MemoryStore::new());
        let address =
            EthAddress::from_hex("0x00000000000000000000000000000000000000f1").unwrap();
        store
            .insert(&NewContract {
                address,
                chain_id: 57073,
                deploy_block: None,
                index_type: IndexType::Volume,
            })
            .await
            .unwrap();

        let queue = JobQueue::new(store.clone(), store, 3);
        (queue, address)
    }

    #[tokio::test]
    async fn enqueue_rejects_unknown_contract() {
        let (queue, _) = setup().await;
        let unknown =
            EthAddress::from_hex("0x00000000000000000000000000000000000000f2").unwrap();

        let err = queue
            .enqueue_backfill(&unknown, None, None, 1)
            .await
            .expect_err("unknown contract");
        assert!(matches!(
            err,
            AppError::Domain(DomainError::ContractNotFound(_))
        ));
    }

    #[tokio::test]
    async fn enqueue_enforces_single_open_job() {
        let (queue, address) = setup().await;

        queue.enqueue_backfill(&address, None, None, 1).await.unwrap();
        let err = queue
            .enqueue_backfill(&address, None, None, 1)
            .await
            .expect_err("duplicate");
        assert!(matches!(err, AppError::Domain(DomainError::DuplicateJob { .. })));
    }

    #[tokio::test]
    async fn enqueue_rejects_inverted_window() {
        let (queue, address) = setup().await;
        let from = "2025-02-01T00:00:00Z".parse().unwrap();
        let to = "2025-01-01T00:00:00Z".parse().unwrap();

        let err = queue
            .enqueue_backfill(&address, Some(from), Some(to), 1)
            .await
            .expect_err("inverted window");
        assert!(matches!(
            err,
            AppError::Domain(DomainError::InvalidDateRange(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_job_frees_the_slot() {
        let (queue, address) = setup().await;

        let job = queue.enqueue_backfill(&address, None, None, 1).await.unwrap();
        let cancelled = queue.cancel(job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        // The contract can now receive a new job.
        queue.enqueue_backfill(&address, None, None, 1).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_is_rejected_for_terminal_jobs() {
        let (queue, address) = setup().await;

        let job = queue.enqueue_backfill(&address, None, None, 1).await.unwrap();
        queue.cancel(job.id).await.unwrap();

        let err = queue.cancel(job.id).await.expect_err("already terminal");
        assert!(matches!(
            err,
            AppError::Domain(DomainError::InvalidStateTransition { .. })
        ));
    }
}
