//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Explorer API configuration.
    pub explorer: ExplorerSettings,
    /// Chain JSON-RPC configuration (fallback ingestion path).
    pub rpc: RpcSettings,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Backfill orchestrator configuration.
    pub backfill: BackfillSettings,
    /// Adaptive poller configuration.
    pub poller: PollerSettings,
    /// Enrichment pipeline configuration.
    pub enrichment: EnrichmentSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `INDEXER_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("explorer.base_url", "https://api.routescan.io/v2/network/mainnet/evm/all")?
            .set_default("explorer.ecosystem", "ink")?
            .set_default("explorer.chain_ids", vec![57073_i64])?
            .set_default("explorer.page_limit", 50)?
            .set_default("explorer.min_request_delay_ms", 200)?
            .set_default("explorer.max_retries", 5)?
            .set_default("explorer.request_timeout_ms", 15000)?
            .set_default("rpc.url", "https://rpc-gel.inkonchain.com")?
            .set_default("rpc.enabled", true)?
            .set_default("rpc.block_batch_size", 1000)?
            .set_default("rpc.max_concurrent_batches", 3)?
            .set_default("rpc.max_consecutive_failures", 3)?
            .set_default("rpc.request_timeout_ms", 30000)?
            .set_default("database.url", "postgres://localhost/inkscore")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            .set_default("backfill.workers", 3)?
            .set_default("backfill.scan_interval_ms", 60_000)?
            .set_default("backfill.stale_after_ms", 1_800_000)?
            .set_default("backfill.job_max_attempts", 3)?
            .set_default("backfill.insert_chunk_size", 500)?
            .set_default("poller.tick_ms", 100)?
            .set_default("poller.base_interval_ms", 15_000)?
            .set_default("poller.medium_interval_ms", 30_000)?
            .set_default("poller.low_interval_ms", 60_000)?
            .set_default("poller.max_interval_ms", 120_000)?
            .set_default("poller.high_activity_threshold", 5)?
            .set_default("poller.page_cap", 10)?
            .set_default("poller.refresh_interval_ms", 5000)?
            .set_default("enrichment.workers", 4)?
            .set_default("enrichment.batch_size", 500)?
            .set_default("enrichment.fetch_fanout", 5)?
            .set_default("enrichment.event_timeout_ms", 10_000)?
            .set_default("enrichment.gap_timeout_ms", 15_000)?
            .set_default("enrichment.pace_ms", 500)?
            .set_default("enrichment.detail_retries", 3)?
            .set_default("enrichment.gap_interval_ms", 300_000)?
            .set_default("enrichment.channel", "new_volume_transaction")?
            .set_default("enrichment.use_polling_fallback", false)?
            .set_default("enrichment.poll_interval_ms", 1000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (INDEXER_ prefix)
            .add_source(
                Environment::with_prefix("INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Explorer validation
        if self.explorer.base_url.is_empty() {
            errors.push("explorer.base_url cannot be empty".into());
        }
        if self.explorer.chain_ids.is_empty() {
            errors.push("explorer.chain_ids cannot be empty".into());
        }
        if self.explorer.page_limit == 0 {
            errors.push("explorer.page_limit must be non-zero".into());
        }

        // RPC validation
        if self.rpc.enabled && self.rpc.url.is_empty() {
            errors.push("rpc.url cannot be empty when rpc.enabled".into());
        }
        if self.rpc.block_batch_size == 0 {
            errors.push("rpc.block_batch_size must be non-zero".into());
        }

        // Database validation
        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        // Backfill validation
        if self.backfill.workers == 0 {
            errors.push("backfill.workers must be non-zero".into());
        }
        if self.backfill.insert_chunk_size == 0 {
            errors.push("backfill.insert_chunk_size must be non-zero".into());
        }

        // Poller validation: the interval ladder must stay ordered so the
        // adaptive table keeps its bounds invariant.
        if self.poller.base_interval_ms > self.poller.medium_interval_ms
            || self.poller.medium_interval_ms > self.poller.low_interval_ms
            || self.poller.low_interval_ms > self.poller.max_interval_ms
        {
            errors.push("poller intervals must satisfy base <= medium <= low <= max".into());
        }
        if self.poller.page_cap == 0 {
            errors.push("poller.page_cap must be non-zero".into());
        }

        // Enrichment validation
        if self.enrichment.workers == 0 {
            errors.push("enrichment.workers must be non-zero".into());
        }
        if self.enrichment.batch_size == 0 {
            errors.push("enrichment.batch_size must be non-zero".into());
        }
        if self.enrichment.fetch_fanout == 0 {
            errors.push("enrichment.fetch_fanout must be non-zero".into());
        }
        if self.enrichment.poll_interval_ms < 1000 {
            errors.push("enrichment.poll_interval_ms must be at least 1000 (1 Hz cap)".into());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Explorer API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerSettings {
    /// Base URL of the explorer REST API.
    pub base_url: String,
    /// Ecosystem identifier sent with list queries.
    pub ecosystem: String,
    /// Chain ids included in list queries.
    pub chain_ids: Vec<u64>,
    /// Page size for list queries.
    pub page_limit: u32,
    /// Minimum delay between requests in milliseconds.
    pub min_request_delay_ms: u64,
    /// Maximum consecutive retries for transient failures.
    pub max_retries: u32,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl ExplorerSettings {
    /// Get the minimum request delay as a `Duration`.
    #[must_use]
    pub const fn min_request_delay(&self) -> Duration {
        Duration::from_millis(self.min_request_delay_ms)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build the explorer client configuration from these settings.
    #[must_use]
    pub fn client_config(&self) -> routescan_client::ClientConfig {
        routescan_client::ClientConfig::default()
            .with_timeout(self.request_timeout())
            .with_page_limit(self.page_limit)
            .with_min_request_delay(self.min_request_delay())
            .with_max_retries(self.max_retries)
            .with_ecosystem(self.ecosystem.clone())
            .with_chain_ids(self.chain_ids.clone())
    }
}

/// Chain JSON-RPC configuration for the fallback ingestion path.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSettings {
    /// HTTP RPC endpoint URL.
    pub url: String,
    /// Whether the RPC fallback path is available at all.
    pub enabled: bool,
    /// Blocks fetched per batch request.
    pub block_batch_size: u64,
    /// Concurrent block-range batches per contract.
    pub max_concurrent_batches: usize,
    /// Consecutive failures before latching explorer-only for the run.
    pub max_consecutive_failures: u32,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl RpcSettings {
    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Backfill orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillSettings {
    /// Contracts backfilled concurrently.
    pub workers: usize,
    /// Interval between scans for pending work in milliseconds.
    pub scan_interval_ms: u64,
    /// Age after which an `indexing` contract counts as crashed.
    pub stale_after_ms: u64,
    /// Default attempt budget for new jobs.
    pub job_max_attempts: i32,
    /// Rows per sink insert chunk.
    pub insert_chunk_size: usize,
}

impl BackfillSettings {
    /// Get the scan interval as a `Duration`.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Get the staleness threshold as a `chrono::Duration`.
    #[must_use]
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.stale_after_ms).unwrap_or(i64::MAX))
    }
}

/// Adaptive poller configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerSettings {
    /// Scheduler tick in milliseconds.
    pub tick_ms: u64,
    /// Interval after high activity.
    pub base_interval_ms: u64,
    /// Interval after moderate activity.
    pub medium_interval_ms: u64,
    /// Interval after the first empty poll.
    pub low_interval_ms: u64,
    /// Hard interval ceiling.
    pub max_interval_ms: u64,
    /// Row count at or above which a poll counts as high activity.
    pub high_activity_threshold: u64,
    /// Maximum pages per poll invocation.
    pub page_cap: u32,
    /// How often the pollable contract set is refreshed.
    pub refresh_interval_ms: u64,
}

impl PollerSettings {
    /// Get the scheduler tick as a `Duration`.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Get the base interval as a `Duration`.
    #[must_use]
    pub const fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    /// Get the medium interval as a `Duration`.
    #[must_use]
    pub const fn medium_interval(&self) -> Duration {
        Duration::from_millis(self.medium_interval_ms)
    }

    /// Get the low interval as a `Duration`.
    #[must_use]
    pub const fn low_interval(&self) -> Duration {
        Duration::from_millis(self.low_interval_ms)
    }

    /// Get the maximum interval as a `Duration`.
    #[must_use]
    pub const fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    /// Get the refresh interval as a `Duration`.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

/// Enrichment pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentSettings {
    /// Gap-filler worker tasks.
    pub workers: usize,
    /// Rows per gap-filler batch.
    pub batch_size: u64,
    /// Concurrent detail fetches per worker.
    pub fetch_fanout: usize,
    /// Detail fetch timeout in event-driven mode (milliseconds).
    pub event_timeout_ms: u64,
    /// Detail fetch timeout in gap-filler mode (milliseconds).
    pub gap_timeout_ms: u64,
    /// Base pacing between fetch fan-outs (milliseconds).
    pub pace_ms: u64,
    /// Per-call retry attempts in the gap filler.
    pub detail_retries: u32,
    /// Interval between gap-filler passes in service mode (milliseconds).
    pub gap_interval_ms: u64,
    /// Storage notification channel name.
    pub channel: String,
    /// Use the polling fallback instead of LISTEN/NOTIFY.
    pub use_polling_fallback: bool,
    /// Polling fallback cadence (milliseconds, >= 1000).
    pub poll_interval_ms: u64,
}

impl EnrichmentSettings {
    /// Get the event-driven detail timeout as a `Duration`.
    #[must_use]
    pub const fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }

    /// Get the gap-filler detail timeout as a `Duration`.
    #[must_use]
    pub const fn gap_timeout(&self) -> Duration {
        Duration::from_millis(self.gap_timeout_ms)
    }

    /// Get the base pacing as a `Duration`.
    #[must_use]
    pub const fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    /// Get the gap-pass interval as a `Duration`.
    #[must_use]
    pub const fn gap_interval(&self) -> Duration {
        Duration::from_millis(self.gap_interval_ms)
    }

    /// Get the polling fallback cadence as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is enabled.
    pub enabled: bool,
    /// Host to bind the exporter to.
    pub host: String,
    /// Port for the exporter.
    pub port: u16,
}

impl MetricsSettings {
    /// Get the metrics socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn create_valid_settings() -> Settings {
        Settings {
            explorer: ExplorerSettings {
                base_url: "https://api.example.io/v2".into(),
                ecosystem: "ink".into(),
                chain_ids: vec![57073],
                page_limit: 50,
                min_request_delay_ms: 200,
                max_retries: 5,
                request_timeout_ms: 15000,
            },
            rpc: RpcSettings {
                url: "https://rpc.example.io".into(),
                enabled: true,
                block_batch_size: 1000,
                max_concurrent_batches: 3,
                max_consecutive_failures: 3,
                request_timeout_ms: 30000,
            },
            database: DatabaseSettings {
                url: "postgres://localhost/test".into(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_ms: 5000,
                idle_timeout_ms: 600_000,
            },
            backfill: BackfillSettings {
                workers: 3,
                scan_interval_ms: 60_000,
                stale_after_ms: 1_800_000,
                job_max_attempts: 3,
                insert_chunk_size: 500,
            },
            poller: PollerSettings {
                tick_ms: 100,
                base_interval_ms: 15_000,
                medium_interval_ms: 30_000,
                low_interval_ms: 60_000,
                max_interval_ms: 120_000,
                high_activity_threshold: 5,
                page_cap: 10,
                refresh_interval_ms: 5000,
            },
            enrichment: EnrichmentSettings {
                workers: 4,
                batch_size: 500,
                fetch_fanout: 5,
                event_timeout_ms: 10_000,
                gap_timeout_ms: 15_000,
                pace_ms: 500,
                detail_retries: 3,
                gap_interval_ms: 300_000,
                channel: "new_volume_transaction".into(),
                use_polling_fallback: false,
                poll_interval_ms: 1000,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
            },
            metrics: MetricsSettings {
                enabled: false,
                host: "0.0.0.0".into(),
                port: 9090,
            },
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(create_valid_settings().validate().is_ok());
    }

    #[test]
    fn duration_accessors() {
        let settings = create_valid_settings();
        assert_eq!(settings.explorer.min_request_delay(), Duration::from_millis(200));
        assert_eq!(settings.poller.base_interval(), Duration::from_secs(15));
        assert_eq!(settings.enrichment.event_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn validation_catches_zero_connections() {
        let mut settings = create_valid_settings();
        settings.database.max_connections = 0;

        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("max_connections")));
    }

    #[test]
    fn validation_catches_min_exceeds_max() {
        let mut settings = create_valid_settings();
        settings.database.min_connections = 20;
        settings.database.max_connections = 10;

        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("min_connections")));
    }

    #[test]
    fn validation_catches_disordered_poller_ladder() {
        let mut settings = create_valid_settings();
        settings.poller.low_interval_ms = 500_000; // above max

        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("poller intervals")));
    }

    #[test]
    fn validation_enforces_polling_fallback_cadence() {
        let mut settings = create_valid_settings();
        settings.enrichment.poll_interval_ms = 100; // faster than 1 Hz

        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("poll_interval_ms")));
    }

    #[test]
    fn client_config_mirrors_settings() {
        let settings = create_valid_settings();
        let client = settings.explorer.client_config();
        assert_eq!(client.page_limit, 50);
        assert_eq!(client.ecosystem, "ink");
        assert_eq!(client.chain_ids, vec![57073]);
    }
}
