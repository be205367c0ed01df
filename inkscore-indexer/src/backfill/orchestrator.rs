//! Backfill orchestrator: bounded worker pool over the ingestor.
//!
//! Work arrives from two sources, interleaved fairly:
//!
//! 1. A periodic scan for contracts in `pending`/`error` (plus stale
//!    `indexing` rows older than 30 minutes for crash recovery)
//! 2. Claimed jobs from the operator job queue
//!
//! Per-contract mutual exclusion has two layers: a process-level in-flight
//! set, and the conditional status transition `pending|error → indexing`
//! in storage (a second claimant finds zero rows affected and skips).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                             │
//! │                                                                 │
//! │  ┌──────────────┐   ┌───────────────┐                           │
//! │  │ Contract scan│──▶│               │    ┌───────────────────┐  │
//! │  └──────────────┘   │  Fair         │───▶│ Worker (≤3)       │  │
//! │  ┌──────────────┐   │  interleave   │    │  claim → ingest → │  │
//! │  │  Job queue   │──▶│               │    │  complete/error   │  │
//! │  └──────────────┘   └───────────────┘    └───────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BackfillSettings;
use crate::error::{DomainError, Result};
use crate::ingest::{Ingestor, PageHook, TimeWindow};
use crate::ports::{ContractStore, CursorStore, JobStore};
use crate::types::entities::{BackfillJob, Contract};
use crate::types::enums::{ContractStatus, IngestMode, JobStatus};
use crate::types::primitives::EthAddress;

// ═══════════════════════════════════════════════════════════════════════════════
// WORK ITEMS
// ═══════════════════════════════════════════════════════════════════════════════

/// One unit of orchestrator work.
#[derive(Debug)]
enum Work {
    /// A contract picked up by the periodic scan.
    Scan(Contract),
    /// A claimed operator job.
    Job(BackfillJob),
}

/// How a job run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    /// The bounded ingest finished.
    Completed,
    /// The operator cancelled mid-run; progress is saved.
    Cancelled,
    /// Shutdown interrupted the run; the job returns to pending.
    Interrupted,
}

/// Page checkpoint hook wiring job progress and cancellation.
struct JobPageHook {
    jobs: Arc<dyn JobStore>,
    job_id: i64,
}

#[async_trait]
impl PageHook for JobPageHook {
    async fn on_page(&self, progress_percent: f64, resume_token: Option<&str>) -> bool {
        if let Err(e) = self
            .jobs
            .set_progress(self.job_id, progress_percent, resume_token)
            .await
        {
            warn!(job_id = self.job_id, error = %e, "Failed to persist job progress");
        }

        // Operator cancellation is observed here, at the page boundary.
        match self.jobs.get(self.job_id).await {
            Ok(Some(job)) => job.status != JobStatus::Cancelled,
            Ok(None) => false,
            Err(e) => {
                warn!(job_id = self.job_id, error = %e, "Failed to read job status");
                true
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs the bounded backfill worker pool.
pub struct Orchestrator {
    contracts: Arc<dyn ContractStore>,
    cursors: Arc<dyn CursorStore>,
    jobs: Arc<dyn JobStore>,
    ingestor: Arc<Ingestor>,
    settings: BackfillSettings,
    in_flight: Arc<DashSet<EthAddress>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workers", &self.settings.workers)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over the given stores and ingestor.
    #[must_use]
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        cursors: Arc<dyn CursorStore>,
        jobs: Arc<dyn JobStore>,
        ingestor: Arc<Ingestor>,
        settings: BackfillSettings,
    ) -> Self {
        Self {
            contracts,
            cursors,
            jobs,
            ingestor,
            settings,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Run the orchestrator until shutdown.
    ///
    /// On shutdown: stop acquiring new work, wait for in-flight workers to
    /// reach their next page boundary and exit, then return.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(workers = self.settings.workers, "Backfill orchestrator starting");

        let semaphore = Arc::new(Semaphore::new(self.settings.workers));
        let mut scan_timer = tokio::time::interval(self.settings.scan_interval());
        scan_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, draining backfill workers");
                    break;
                }
                _ = scan_timer.tick() => {
                    self.dispatch_round(&semaphore, &shutdown).await;
                }
            }
        }

        // Drain: once every permit is reacquired, all workers have exited.
        let workers = u32::try_from(self.settings.workers).unwrap_or(u32::MAX);
        if let Ok(_all) = semaphore.acquire_many(workers).await {
            info!("Backfill workers drained");
        }
    }

    /// Fill free worker slots, alternating between the job queue and the
    /// contract scan so neither source starves the other.
    async fn dispatch_round(self: &Arc<Self>, semaphore: &Arc<Semaphore>, shutdown: &CancellationToken) {
        let candidates = match self
            .contracts
            .backfill_candidates(self.settings.stale_after())
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Contract scan failed");
                Vec::new()
            }
        };

        let mut scan_queue: VecDeque<Contract> = candidates
            .into_iter()
            .filter(|c| !self.in_flight.contains(&c.address))
            .collect();
        let mut prefer_job = true;

        loop {
            if shutdown.is_cancelled() {
                return;
            }
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                return; // Pool saturated
            };

            let work = if prefer_job {
                match self.claim_job().await {
                    Some(job) => Some(Work::Job(job)),
                    None => scan_queue.pop_front().map(Work::Scan),
                }
            } else {
                match scan_queue.pop_front() {
                    Some(contract) => Some(Work::Scan(contract)),
                    None => self.claim_job().await.map(Work::Job),
                }
            };
            prefer_job = !prefer_job;

            let Some(work) = work else {
                return; // Both sources empty
            };

            debug!(?work, "Dispatching work");
            let this = Arc::clone(self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                match work {
                    Work::Scan(contract) => this.process_scan(contract, &shutdown).await,
                    Work::Job(job) => this.process_job(job, &shutdown).await,
                }
                drop(permit);
            });
        }
    }

    async fn claim_job(&self) -> Option<BackfillJob> {
        match self.jobs.claim_next().await {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Job claim failed");
                None
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // SCAN PATH
    // ───────────────────────────────────────────────────────────────────────────

    /// Backfill one contract from the periodic scan.
    #[instrument(skip_all, fields(contract = %contract.address))]
    pub async fn process_scan(&self, contract: Contract, shutdown: &CancellationToken) {
        let address = contract.address;
        if !self.in_flight.insert(address) {
            return; // Another worker in this process owns it
        }

        let result = self.run_scan(&contract, shutdown).await;
        self.in_flight.remove(&address);

        if let Err(e) = result {
            error!(error = %e, "Backfill failed");
            if let Err(store_err) = self
                .contracts
                .mark_error(&address, &e.operator_message())
                .await
            {
                error!(error = %store_err, "Failed to record contract error");
            }
        }
    }

    async fn run_scan(&self, contract: &Contract, shutdown: &CancellationToken) -> Result<()> {
        let address = contract.address;
        if !self
            .contracts
            .try_claim(&address, self.settings.stale_after())
            .await?
        {
            debug!("Contract claim lost, skipping");
            return Ok(());
        }

        let report = self
            .ingestor
            .ingest(contract, IngestMode::Backfill, None, shutdown, None)
            .await?;

        if report.cancelled {
            // Shutdown mid-run: cursor holds the resume point; the stale
            // scan reclaims the contract after restart.
            info!("Backfill interrupted, progress saved");
            return Ok(());
        }

        let total = self
            .cursors
            .get(&address)
            .await?
            .map_or(0, |c| c.total_indexed);
        self.contracts.mark_complete(&address, total).await?;

        info!(
            rows = report.rows_returned,
            inserted = report.rows_inserted,
            total,
            "Contract backfill complete"
        );
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // JOB PATH
    // ───────────────────────────────────────────────────────────────────────────

    /// Process one claimed job to a terminal (or pending-again) state.
    #[instrument(skip_all, fields(job_id = job.id, contract_id = job.contract_id))]
    pub async fn process_job(&self, job: BackfillJob, shutdown: &CancellationToken) {
        match self.run_job(&job, shutdown).await {
            Ok(JobOutcome::Completed) => {
                if let Err(e) = self.jobs.mark_completed(job.id).await {
                    error!(error = %e, "Failed to mark job completed");
                }
                info!("Job completed");
            }
            Ok(JobOutcome::Cancelled) => {
                // Operator already flipped the status; nothing to write.
                info!("Job cancelled, progress saved");
            }
            Ok(JobOutcome::Interrupted) => {
                if let Err(e) = self.jobs.release(job.id).await {
                    error!(error = %e, "Failed to release job");
                }
                info!("Job released for restart");
            }
            Err(e) => {
                warn!(error = %e, "Job attempt failed");
                match self.jobs.record_failure(job.id, &e.operator_message()).await {
                    Ok(status) => info!(status = %status, "Job failure recorded"),
                    Err(store_err) => error!(error = %store_err, "Failed to record job failure"),
                }
            }
        }
    }

    async fn run_job(&self, job: &BackfillJob, shutdown: &CancellationToken) -> Result<JobOutcome> {
        let contract = self
            .jobs_contract(job)
            .await?
            .ok_or_else(|| DomainError::ContractNotFound(job.payload.contract_address.clone()))?;
        let address = contract.address;

        if !self.in_flight.insert(address) {
            // A scan worker owns the contract right now; retry later
            // without consuming the claim.
            return Err(DomainError::InvalidStateTransition {
                from: "in-flight".into(),
                to: "job".into(),
            }
            .into());
        }

        let result = self.run_job_inner(&contract, job, shutdown).await;
        self.in_flight.remove(&address);

        if result.is_err()
            && let Err(e) = self
                .contracts
                .mark_error(&address, "backfill job failed")
                .await
        {
            error!(error = %e, "Failed to record contract error");
        }
        result
    }

    async fn run_job_inner(
        &self,
        contract: &Contract,
        job: &BackfillJob,
        shutdown: &CancellationToken,
    ) -> Result<JobOutcome> {
        // The claim doubles as the single-writer lock on the cursor. A
        // contract already complete cannot be claimed, and its bounded
        // ingest is a no-op anyway.
        let claimed = self
            .contracts
            .try_claim(&contract.address, self.settings.stale_after())
            .await?;
        if !claimed && contract.status != ContractStatus::Complete {
            return Err(DomainError::InvalidStateTransition {
                from: contract.status.to_string(),
                to: ContractStatus::Indexing.to_string(),
            }
            .into());
        }

        let window = TimeWindow::new(job.payload.from_date, job.payload.to_date);
        let hook = JobPageHook {
            jobs: Arc::clone(&self.jobs),
            job_id: job.id,
        };

        let report = self
            .ingestor
            .ingest(
                contract,
                IngestMode::Backfill,
                Some(window),
                shutdown,
                Some(&hook),
            )
            .await?;

        if report.cancelled {
            // Either the operator cancelled or shutdown hit; the job row
            // distinguishes the two.
            let current = self.jobs.get(job.id).await?;
            return Ok(match current.map(|j| j.status) {
                Some(JobStatus::Cancelled) => JobOutcome::Cancelled,
                _ => JobOutcome::Interrupted,
            });
        }

        self.jobs.set_progress(job.id, 100.0, None).await?;

        if claimed {
            let total = self
                .cursors
                .get(&contract.address)
                .await?
                .map_or(0, |c| c.total_indexed);
            if report.completed {
                self.contracts.mark_complete(&contract.address, total).await?;
            } else {
                self.contracts
                    .touch_progress(&contract.address, report.newest_block, total)
                    .await?;
            }
        }

        Ok(JobOutcome::Completed)
    }

    async fn jobs_contract(&self, job: &BackfillJob) -> Result<Option<Contract>> {
        self.contracts.get_by_id(job.contract_id).await
    }
}
