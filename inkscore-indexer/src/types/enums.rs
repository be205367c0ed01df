//! Status and mode enumerations for the indexing pipeline.
//!
//! Each enum provides:
//! - A stable lowercase string form used for TEXT columns and CLI output
//! - Safe parsing from storage via `FromStr`
//! - JSON serialization via `serde`
//!
//! Statuses are stored as TEXT rather than numeric codes so operator
//! queries against the database read naturally.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a contract's indexing progress.
///
/// ```text
/// pending ──▶ indexing ──▶ complete
///    ▲            │            │
///    │            ▼            ▼
///    └────────  error       (poller)
/// ```
///
/// `complete` is terminal until an operator resets the cursor or the
/// poller extends the indexed range. `paused` is operator-set and skipped
/// by both the backfill scan and the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    /// Never indexed; eligible for backfill.
    Pending,
    /// A backfill worker currently owns this contract.
    Indexing,
    /// Historical backfill finished; the adaptive poller owns it now.
    Complete,
    /// Operator-paused; ignored by all loops.
    Paused,
    /// Last backfill failed; eligible for re-backfill.
    Error,
}

impl ContractStatus {
    /// Stable lowercase form for storage and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Indexing => "indexing",
            Self::Complete => "complete",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "indexing" => Ok(Self::Indexing),
            "complete" => Ok(Self::Complete),
            "paused" => Ok(Self::Paused),
            "error" => Ok(Self::Error),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEX TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// What the downstream scoring layer aggregates for a contract.
///
/// Volume-indexed contracts additionally emit storage notifications on
/// base-row insert, feeding the event-driven enrichment listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Aggregate by transaction count.
    Count,
    /// Aggregate by transferred value; rows are enriched.
    Volume,
}

impl IndexType {
    /// Stable lowercase form for storage and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Volume => "volume",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "volume" => Ok(Self::Volume),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JOB STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of an operator-created backfill job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a worker (or for its retry delay to elapse).
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Finished successfully.
    Completed,
    /// Exhausted its attempts.
    Failed,
    /// Cancelled by an operator.
    Cancelled,
}

impl JobStatus {
    /// Stable lowercase form for storage and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the job still occupies its contract's single open slot.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INGEST MODE
// ═══════════════════════════════════════════════════════════════════════════════

/// How the ingestor walks the upstream stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestMode {
    /// Ascending, cursor-driven, runs to end-of-stream.
    Backfill,
    /// Descending, page-capped, stops at the first known hash.
    Poll,
}

impl IngestMode {
    /// Stable lowercase form for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backfill => "backfill",
            Self::Poll => "poll",
        }
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn contract_status_round_trip() {
        for status in [
            ContractStatus::Pending,
            ContractStatus::Indexing,
            ContractStatus::Complete,
            ContractStatus::Paused,
            ContractStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<ContractStatus>().unwrap(), status);
        }
    }

    #[test]
    fn contract_status_rejects_unknown() {
        assert!("exploded".parse::<ContractStatus>().is_err());
    }

    #[test]
    fn job_status_open_states() {
        assert!(JobStatus::Pending.is_open());
        assert!(JobStatus::Processing.is_open());
        assert!(!JobStatus::Completed.is_open());
        assert!(!JobStatus::Failed.is_open());
        assert!(!JobStatus::Cancelled.is_open());
    }

    #[test]
    fn index_type_round_trip() {
        assert_eq!("volume".parse::<IndexType>().unwrap(), IndexType::Volume);
        assert_eq!("count".parse::<IndexType>().unwrap(), IndexType::Count);
        assert!("weight".parse::<IndexType>().is_err());
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
