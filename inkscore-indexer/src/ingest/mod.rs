//! Transaction ingestion: upstream pages to canonical base rows.
//!
//! This module contains the components that:
//! 1. Pull raw transactions from the explorer (primary) or chain RPC (fallback)
//! 2. Normalize them through the canonical mapping
//! 3. Batch-insert into the base store with idempotent conflict handling
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Ingestor                                │
//! │                                                                 │
//! │  ┌──────────────┐   ┌─────────────────┐   ┌──────────────────┐  │
//! │  │  Explorer    │──▶│   Canonical     │──▶│  Chunked insert  │  │
//! │  │  page loop   │   │   mapping       │   │  (conflict skip) │  │
//! │  └──────┬───────┘   └─────────────────┘   └────────┬─────────┘  │
//! │         │ explorer down                            │            │
//! │         ▼                                          ▼            │
//! │  ┌──────────────┐                         ┌──────────────────┐  │
//! │  │  RpcScanner  │────────────────────────▶│   Cursor store   │  │
//! │  │ (block walk) │                         │  (per page)      │  │
//! │  └──────────────┘                         └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod canonical;
mod ingestor;
mod rpc_scan;

pub use canonical::{SkipReason, map_item};
pub use ingestor::{Ingestor, IngestorConfig, PageHook, TimeWindow};
pub use rpc_scan::{ChainRpcClient, RpcScanner};
