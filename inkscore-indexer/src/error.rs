//! Layered error types for the inkscore indexer.
//!
//! This module provides a hierarchical error system:
//!
//! - [`DomainError`] - Business logic errors (invalid input, not found, etc.)
//! - [`InfraError`] - Infrastructure errors (database, explorer, chain RPC)
//! - [`AppError`] - Application-level errors combining domain and infra
//!
//! # Error Philosophy
//!
//! - Domain errors are recoverable and operator-facing
//! - Infrastructure errors are logged but details hidden from operators
//!   (dashboards see `status` and `error_message`, never a stack trace)
//! - The `Result` type alias uses `AppError` for application code
//!
//! # Taxonomy
//!
//! The orchestration layers branch on classification, not on variants:
//!
//! | Class | Handling |
//! |-------|----------|
//! | Transient upstream (timeout, 429, 5xx) | retried by the caller, then per-contract error |
//! | Permanent upstream (other 4xx, 404 detail) | logged and skipped |
//! | Storage transient (connection lost, shared memory) | jittered retry, then per-batch failure |
//! | Storage permanent (constraint violations) | fatal for the task |
//! | Unique conflict | not an error; ON CONFLICT handles it |
//! | Cancellation | not an error; clean exit with progress saved |

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors representing business rule violations.
///
/// These errors are recoverable and safe to show to operators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Invalid address format.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid transaction hash format.
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    /// Invalid amount (negative or malformed decimal).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Contract not found for the given address.
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(i64),

    /// A pending or processing job already exists for the contract.
    #[error("contract {contract_id} already has an open backfill job {job_id}")]
    DuplicateJob {
        /// The contract with the open job.
        contract_id: i64,
        /// The id of the open job.
        job_id: i64,
    },

    /// Invalid state transition.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted new state.
        to: String,
    },

    /// Invalid operator-supplied date range.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// Invalid status string in storage or operator input.
    #[error("invalid status value: {0}")]
    InvalidStatus(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
///
/// These errors are typically logged but their details are hidden from
/// operator-facing status fields.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Explorer API error.
    #[error("explorer error: {0}")]
    Explorer(#[from] routescan_client::RoutescanError),

    /// Chain JSON-RPC error (fallback ingestion path).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found in storage.
    #[error("resource not found")]
    NotFound,

    /// Timeout waiting for operation.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl InfraError {
    /// Whether this error is a transient upstream failure worth retrying
    /// later (timeout, 429, 5xx, connection reset).
    #[must_use]
    pub fn is_transient_upstream(&self) -> bool {
        match self {
            Self::Explorer(e) => e.is_transient(),
            Self::Rpc(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Whether this error is a permanent upstream rejection (4xx other
    /// than 429, 404 on detail) that should be logged and skipped.
    #[must_use]
    pub fn is_permanent_upstream(&self) -> bool {
        match self {
            Self::Explorer(e) => !e.is_transient(),
            _ => false,
        }
    }

    /// Whether this error is a transient storage failure (connection lost,
    /// shared-memory pressure) eligible for a jittered retry.
    #[must_use]
    pub fn is_transient_storage(&self) -> bool {
        match self {
            Self::Database(e) => is_transient_db_error(e),
            _ => false,
        }
    }
}

/// Classify a sqlx error as transient.
///
/// Connection losses, pool timeouts, and the Postgres "out of shared
/// memory" class (SQLSTATE 53xxx) recover on retry; everything else is
/// treated as permanent.
#[must_use]
pub fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| code.starts_with("53") || code == "57P01"),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
///
/// This is the primary error type used throughout the service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown requested.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether the underlying cause is a transient upstream failure.
    #[must_use]
    pub fn is_transient_upstream(&self) -> bool {
        matches!(self, Self::Infra(e) if e.is_transient_upstream())
    }

    /// Short operator-facing message, stripped of infrastructure detail.
    ///
    /// Written to `Contract.error_message` and `Job.error_message`.
    #[must_use]
    pub fn operator_message(&self) -> String {
        match self {
            Self::Domain(e) => e.to_string(),
            Self::Infra(InfraError::Explorer(_)) => "upstream explorer unavailable".into(),
            Self::Infra(InfraError::Rpc(_)) => "chain RPC unavailable".into(),
            Self::Infra(InfraError::Database(_)) => "storage unavailable".into(),
            Self::Infra(InfraError::Timeout(_)) => "operation timed out".into(),
            Self::Infra(_) => "internal failure".into(),
            Self::Config(msg) | Self::Initialization(msg) => msg.clone(),
            Self::ShutdownRequested => "shutdown requested".into(),
        }
    }
}

// Allow converting explorer errors straight into application errors.
impl From<routescan_client::RoutescanError> for AppError {
    fn from(err: routescan_client::RoutescanError) -> Self {
        Self::Infra(InfraError::Explorer(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Infra(InfraError::Database(err))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use routescan_client::RoutescanError;

    use super::*;

    #[test]
    fn domain_error_display() {
        let err = DomainError::ContractNotFound("0x1234".into());
        assert!(err.to_string().contains("0x1234"));
    }

    #[test]
    fn app_error_from_domain() {
        let domain = DomainError::JobNotFound(7);
        let app: AppError = domain.into();
        assert!(matches!(app, AppError::Domain(DomainError::JobNotFound(7))));
    }

    #[test]
    fn transient_upstream_classification() {
        let transient: AppError = RoutescanError::Timeout.into();
        assert!(transient.is_transient_upstream());

        let permanent: AppError = RoutescanError::Http {
            status: 404,
            message: "unknown".into(),
        }
        .into();
        assert!(!permanent.is_transient_upstream());
    }

    #[test]
    fn operator_message_hides_infra_detail() {
        let err: AppError = RoutescanError::Connection("10.0.0.3:443 refused".into()).into();
        let msg = err.operator_message();
        assert!(!msg.contains("10.0.0.3"));
        assert_eq!(msg, "upstream explorer unavailable");
    }

    #[test]
    fn pool_timeout_is_transient_storage() {
        let infra = InfraError::Database(sqlx::Error::PoolTimedOut);
        assert!(infra.is_transient_storage());
    }
}
