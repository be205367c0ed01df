//! inkscore Transaction Indexer
//!
//! A Rust backend service that continuously ingests contract transactions
//! from an EVM chain into PostgreSQL, enriches them with per-transaction
//! detail (logs, operations, L1/L2 gas), and maintains per-contract
//! progress for the downstream wallet-scoring API.
//!
//! # Architecture
//!
//! The indexer follows a hexagonal architecture:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         INDEXER CORE                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐            │
//! │  │   Backfill   │  │   Adaptive   │  │  Enrichment  │            │
//! │  │ Orchestrator │  │    Poller    │  │   Pipeline   │            │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘            │
//! │         └────────┬────────┘                 │                    │
//! │                  ▼                          ▼                    │
//! │         ┌──────────────┐           ┌──────────────┐   ┌───────┐  │
//! │         │   Ingestor   │           │    Store     │   │ Jobs  │  │
//! │         └──────────────┘           └──────────────┘   └───────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (primitives, enums, entities)
//! - [`error`] - Layered error types and the failure taxonomy
//! - [`config`] - Configuration loading and validation
//! - [`ports`] - Traits decoupling the core from infrastructure
//! - [`store`] - Data persistence (PostgreSQL, in-memory)
//! - [`ingest`] - Transaction ingestion (explorer + RPC fallback)
//! - [`backfill`] - Bounded worker pool over historical ingestion
//! - [`poller`] - Adaptive polling of completed contracts
//! - [`enrichment`] - Event-driven listener and parallel gap filler
//! - [`jobs`] - Operator-triggered backfill job queue
//! - [`runtime`] - Wiring and graceful shutdown
//!
//! # Getting Started
//!
//! ```bash
//! # Set up environment
//! cp .env.example .env
//! # Edit .env with your configuration
//!
//! # Run migrations
//! cargo run -- migrate
//!
//! # Start the indexer
//! cargo run -- run
//! ```

pub mod backfill;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod poller;
pub mod ports;
pub mod runtime;
pub mod store;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }
}
