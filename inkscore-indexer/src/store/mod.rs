//! Data persistence layer (adapters for store ports).
//!
//! This module provides concrete implementations of the store ports
//! defined in [`crate::ports::store`]:
//!
//! - [`PostgresStore`] - the production adapter over a SQLx pool
//! - [`MemoryStore`] - an in-process adapter for tests and local runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Store Adapters                           │
//! │                                                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │                  PostgresStore                           │  │
//! │   │   ┌───────────┐ ┌─────────┐ ┌──────────────┐ ┌────────┐  │  │
//! │   │   │ Contracts │ │ Cursors │ │ Transactions │ │  Jobs  │  │  │
//! │   │   └───────────┘ └─────────┘ └──────────────┘ └────────┘  │  │
//! │   │   ┌─────────────┐                                        │  │
//! │   │   │ Enrichments │                                        │  │
//! │   │   └─────────────┘                                        │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! │                               │                                 │
//! │                               ▼                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │              SQLx Connection Pool (PostgreSQL)           │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via `sqlx migrate run`
//! or the `migrate` CLI subcommand.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{AppError, Result};

/// Run a storage operation with jittered exponential retry on transient
/// failures (connection loss, pool timeout, shared-memory pressure).
///
/// Permanent storage errors propagate on the first attempt.
///
/// # Errors
///
/// Returns the last error once `max_attempts` transient failures occurred.
pub async fn with_storage_retry<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(AppError::Infra(e)) if e.is_transient_storage() && attempt + 1 < max_attempts => {
                attempt += 1;
                let base_ms = 100u64.saturating_mul(2u64.saturating_pow(attempt));
                let jitter_ms = rand::rng().random_range(0..=base_ms / 2);
                let delay = Duration::from_millis(base_ms + jitter_ms);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient storage failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::InfraError;

    #[tokio::test]
    async fn storage_retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = with_storage_retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::Infra(InfraError::Database(
                        sqlx::Error::PoolTimedOut,
                    )))
                } else {
                    Ok(42u64)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn storage_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<u64> = with_storage_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AppError::Infra(InfraError::Database(
                    sqlx::Error::PoolTimedOut,
                )))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn storage_retry_propagates_permanent_errors_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<u64> = with_storage_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Infra(InfraError::NotFound)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
