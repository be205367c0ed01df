//! Typed HTTP client for the Routescan-style explorer list/detail API.
//!
//! This crate provides [`RoutescanClient`], the upstream access layer for the
//! inkscore indexing pipeline. It speaks the explorer's multi-chain REST API:
//!
//! - **Listing**: per-contract transaction pages with opaque `nextToken`
//!   pagination, union `fromAddresses`/`toAddresses` semantics, and optional
//!   time windows for operator-bounded backfills
//! - **Detail**: per-hash transaction detail with `logs[]` and `operations[]`
//!   used by the enrichment pipeline
//!
//! # Crate Relationships
//!
//! This is a **low-level crate** in the inkscore stack:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Service Layer (inkscore-indexer)                        │
//! │  └─ ingest/enrichment drive this client via a feed port  │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Explorer Layer (routescan-client) ◄── YOU ARE HERE      │
//! │  └─ Direct REST access, retry, tolerant decoding         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use routescan_client::{RoutescanClient, TxListQuery};
//!
//! let client = RoutescanClient::new("https://api.example.io/v2")?;
//!
//! let mut query = TxListQuery::for_contract("0xabc...");
//! loop {
//!     let page = client.list_transactions(&query).await?;
//!     process(page.items);
//!     match page.link.next_token {
//!         Some(token) => query = query.with_next_token(token),
//!         None => break,
//!     }
//! }
//! ```
//!
//! # Design Notes
//!
//! The page token is opaque: this crate never inspects it, only threads it.
//! All monetary fields are decimal strings end to end; nothing in this
//! crate converts wei amounts through floating point.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::RoutescanClient;
pub use config::ClientConfig;
pub use error::{Result, RoutescanError};
pub use types::{SortOrder, TxDetail, TxItem, TxListQuery, TxListResponse};
