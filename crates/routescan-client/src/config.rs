//! Configuration for the explorer client.
//!
//! This module provides [`ClientConfig`] for customizing client behavior:
//!
//! - Request timeouts and retry budget
//! - Page size and inter-request pacing
//! - Deployment identity (ecosystem, chain ids)
//!
//! # Example
//!
//! ```
//! use routescan_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::default()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_page_limit(100);
//! ```

use std::time::Duration;

use crate::error::{Result, RoutescanError};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default timeout for HTTP requests to the explorer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of items requested per page.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Default minimum delay between consecutive requests.
///
/// Keeps a single ingest loop under the upstream rate limit without a
/// central token bucket.
pub const DEFAULT_MIN_REQUEST_DELAY: Duration = Duration::from_millis(200);

/// Default maximum consecutive retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Base delay for the exponential retry backoff (doubles per attempt).
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Cap for the exponential retry backoff.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Minimum allowed timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum allowed timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum allowed page limit (server caps requests above this anyway).
pub const MAX_PAGE_LIMIT: u32 = 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration options for [`RoutescanClient`](crate::RoutescanClient).
///
/// Use the builder pattern to customize settings:
///
/// ```
/// use routescan_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_ecosystem("ink")
///     .with_chain_ids(vec![57073]);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout for HTTP calls.
    ///
    /// Default: 15 seconds. Range: 1-300 seconds.
    pub timeout: Duration,

    /// Number of items requested per page.
    ///
    /// Default: 50. Range: 1-1000.
    pub page_limit: u32,

    /// Minimum delay between consecutive requests from one loop.
    ///
    /// Default: 200 ms.
    pub min_request_delay: Duration,

    /// Maximum consecutive retries for transient failures (429/5xx/connect).
    ///
    /// After this many attempts the last error surfaces to the caller,
    /// which treats it as a per-contract transient failure.
    ///
    /// Default: 5.
    pub max_retries: u32,

    /// Ecosystem identifier sent with every list query.
    ///
    /// Fixed per deployment. Default: `"ink"`.
    pub ecosystem: String,

    /// Chain ids included in list queries.
    ///
    /// Fixed per deployment. Default: `[57073]`.
    pub chain_ids: Vec<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            page_limit: DEFAULT_PAGE_LIMIT,
            min_request_delay: DEFAULT_MIN_REQUEST_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            ecosystem: "ink".into(),
            chain_ids: vec![57073],
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the page limit.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    /// Set the minimum inter-request delay.
    #[must_use]
    pub const fn with_min_request_delay(mut self, delay: Duration) -> Self {
        self.min_request_delay = delay;
        self
    }

    /// Set the maximum consecutive retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the ecosystem identifier.
    #[must_use]
    pub fn with_ecosystem(mut self, ecosystem: impl Into<String>) -> Self {
        self.ecosystem = ecosystem.into();
        self
    }

    /// Set the included chain ids.
    #[must_use]
    pub fn with_chain_ids(mut self, chain_ids: Vec<u64>) -> Self {
        self.chain_ids = chain_ids;
        self
    }

    /// Compute the backoff delay for a retry attempt (zero-based).
    ///
    /// Doubles from [`RETRY_BASE_DELAY`] per attempt, capped at
    /// [`RETRY_MAX_DELAY`].
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        RETRY_BASE_DELAY
            .saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
            .min(RETRY_MAX_DELAY)
    }

    /// Validate the configuration.
    ///
    /// Called automatically when creating a client.
    ///
    /// # Errors
    ///
    /// Returns [`RoutescanError::InvalidConfig`] if:
    /// - Timeout is outside 1-300 seconds
    /// - Page limit is 0 or above 1000
    /// - No chain ids are configured
    /// - The ecosystem string is empty
    pub fn validate(&self) -> Result<()> {
        if self.timeout < MIN_TIMEOUT {
            return Err(RoutescanError::InvalidConfig(format!(
                "timeout must be at least {MIN_TIMEOUT:?}"
            )));
        }

        if self.timeout > MAX_TIMEOUT {
            return Err(RoutescanError::InvalidConfig(format!(
                "timeout must be at most {MAX_TIMEOUT:?}"
            )));
        }

        if self.page_limit == 0 {
            return Err(RoutescanError::InvalidConfig(
                "page_limit must be non-zero".into(),
            ));
        }

        if self.page_limit > MAX_PAGE_LIMIT {
            return Err(RoutescanError::InvalidConfig(format!(
                "page_limit must be at most {MAX_PAGE_LIMIT}"
            )));
        }

        if self.chain_ids.is_empty() {
            return Err(RoutescanError::InvalidConfig(
                "at least one chain id is required".into(),
            ));
        }

        if self.ecosystem.is_empty() {
            return Err(RoutescanError::InvalidConfig(
                "ecosystem cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.page_limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(10))
            .with_page_limit(100)
            .with_ecosystem("testnet")
            .with_chain_ids(vec![1, 2]);

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.page_limit, 100);
        assert_eq!(config.ecosystem, "testnet");
        assert_eq!(config.chain_ids, vec![1, 2]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_timeout_out_of_range() {
        let too_low = ClientConfig::new().with_timeout(Duration::from_millis(500));
        assert!(too_low.validate().is_err());

        let too_high = ClientConfig::new().with_timeout(Duration::from_secs(600));
        assert!(too_high.validate().is_err());
    }

    #[test]
    fn validate_page_limit_bounds() {
        let zero = ClientConfig::new().with_page_limit(0);
        assert!(zero.validate().is_err());

        let too_big = ClientConfig::new().with_page_limit(MAX_PAGE_LIMIT + 1);
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn validate_empty_identity() {
        let no_chains = ClientConfig::new().with_chain_ids(vec![]);
        assert!(no_chains.validate().is_err());

        let no_ecosystem = ClientConfig::new().with_ecosystem("");
        assert!(no_ecosystem.validate().is_err());
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let config = ClientConfig::default();
        assert_eq!(config.retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.retry_delay(1), Duration::from_secs(2));
        assert_eq!(config.retry_delay(2), Duration::from_secs(4));
        assert_eq!(config.retry_delay(4), Duration::from_secs(16));
        // Capped at 30s from attempt 5 onwards
        assert_eq!(config.retry_delay(5), RETRY_MAX_DELAY);
        assert_eq!(config.retry_delay(20), RETRY_MAX_DELAY);
    }
}
