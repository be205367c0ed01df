//! Error types for the explorer client.
//!
//! This module provides the error hierarchy for explorer API operations:
//!
//! - [`RoutescanError`] - The primary error type for all client operations
//! - Classification helpers (`is_transient`, `is_rate_limited`) so callers
//!   can decide between retry, skip, and abort without string matching
//!
//! # Error Philosophy
//!
//! These errors are designed to be:
//! - **Actionable**: Each variant tells you what went wrong and often how to fix it
//! - **Classifiable**: Transient vs permanent is a method call, not a guess
//! - **Informative**: Contains enough context for debugging without leaking secrets

use thiserror::Error;

/// Result type alias using [`RoutescanError`].
pub type Result<T> = std::result::Result<T, RoutescanError>;

/// Errors that can occur when using the explorer client.
///
/// This is the primary error type for all operations in this crate.
///
/// # Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Network | `Connection`, `Timeout` | Network issues, server down |
/// | Protocol | `Http`, `RateLimited` | Server rejected request |
/// | Data | `Decode`, `InvalidResponse` | Malformed data |
/// | Usage | `InvalidConfig` | Programmer error |
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RoutescanError {
    /// Failed to establish connection to the explorer endpoint.
    ///
    /// This usually indicates the endpoint is unreachable or the URL is invalid.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request timed out waiting for response.
    ///
    /// The actual timeout duration is determined by
    /// [`ClientConfig::timeout`](crate::ClientConfig::timeout).
    #[error("request timed out")]
    Timeout,

    /// Non-2xx HTTP status returned by the server.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Body excerpt or status reason.
        message: String,
    },

    /// The server returned 429 Too Many Requests.
    ///
    /// Separated from [`RoutescanError::Http`] because callers back off
    /// differently for rate limits than for server faults.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(": retry after {s}s")).unwrap_or_default())]
    RateLimited {
        /// Value of the `Retry-After` header, when the server sent one.
        retry_after_secs: Option<u64>,
    },

    /// Failed to deserialize the response body.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response was valid JSON but had unexpected structure.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration provided to the client.
    ///
    /// Check the configuration values (URL format, timeout range, etc.).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RoutescanError {
    /// Check if this error is likely transient and worth retrying.
    ///
    /// Returns `true` for network issues, timeouts, rate limits, and 5xx
    /// server faults. Permanent 4xx responses and decode failures return
    /// `false`.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error is a rate-limit response.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error indicates the resource does not exist upstream.
    ///
    /// A 404 on the detail endpoint means the transaction is unknown to the
    /// explorer; callers log and skip rather than retry.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }
}

impl From<reqwest::Error> for RoutescanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_transient() {
        assert!(RoutescanError::Timeout.is_transient());
        assert!(RoutescanError::Connection("refused".into()).is_transient());
        assert!(
            RoutescanError::RateLimited {
                retry_after_secs: Some(3)
            }
            .is_transient()
        );
        assert!(
            RoutescanError::Http {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );

        assert!(
            !RoutescanError::Http {
                status: 404,
                message: "not found".into()
            }
            .is_transient()
        );
        assert!(!RoutescanError::InvalidResponse("missing items".into()).is_transient());
    }

    #[test]
    fn error_is_not_found() {
        let not_found = RoutescanError::Http {
            status: 404,
            message: "not found".into(),
        };
        assert!(not_found.is_not_found());

        let server_fault = RoutescanError::Http {
            status: 500,
            message: "boom".into(),
        };
        assert!(!server_fault.is_not_found());
    }

    #[test]
    fn rate_limited_display() {
        let with_hint = RoutescanError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert!(with_hint.to_string().contains("7s"));

        let without_hint = RoutescanError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(without_hint.to_string(), "rate limited");
    }
}
