//! Request and response types for the explorer list/detail API.
//!
//! This module defines the wire types used by [`RoutescanClient`](crate::RoutescanClient):
//!
//! - [`TxListQuery`] - Parameters for the per-contract transaction listing
//! - [`TxListResponse`] / [`PageLink`] - Paginated listing response
//! - [`TxItem`] - One transaction as the explorer reports it
//! - [`TxDetail`] - Full per-hash detail with logs and operations
//!
//! # Decoding Policy
//!
//! The upstream payloads evolve without notice, so every response type is a
//! **tolerant decoder**: unknown fields are ignored and optional fields
//! default to `None`/empty. Monetary and gas amounts stay decimal strings
//! end to end; this crate never parses them into floats.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// LIST QUERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Sort order for the transaction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first (backfill).
    Asc,
    /// Newest first (poll).
    Desc,
}

impl SortOrder {
    /// Query-parameter representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Parameters for the per-contract transaction listing.
///
/// The explorer treats `fromAddresses`/`toAddresses` with union semantics:
/// passing the contract for both returns every transaction touching it.
///
/// # Example
///
/// ```
/// use routescan_client::types::{SortOrder, TxListQuery};
///
/// let query = TxListQuery::for_contract("0xAbC0000000000000000000000000000000000001")
///     .with_sort(SortOrder::Asc)
///     .with_limit(50);
/// assert_eq!(query.from_addresses, query.to_addresses);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxListQuery {
    /// Sender filter (the contract address, lowercase).
    pub from_addresses: String,
    /// Recipient filter (the contract address, lowercase).
    pub to_addresses: String,
    /// Result ordering.
    pub sort: SortOrder,
    /// Page size override. `None` uses the client default.
    pub limit: Option<u32>,
    /// Opaque pagination token from a previous response.
    pub next_token: Option<String>,
    /// Inclusive lower time bound (unix seconds) for date-bounded backfills.
    pub start_timestamp: Option<i64>,
    /// Inclusive upper time bound (unix seconds) for date-bounded backfills.
    pub end_timestamp: Option<i64>,
}

impl TxListQuery {
    /// Build a query covering every transaction touching `contract`.
    ///
    /// The address is lowercased; the explorer compares case-insensitively
    /// but the rest of the pipeline expects lowercase identity.
    #[must_use]
    pub fn for_contract(contract: &str) -> Self {
        let addr = contract.to_lowercase();
        Self {
            from_addresses: addr.clone(),
            to_addresses: addr,
            sort: SortOrder::Asc,
            limit: None,
            next_token: None,
            start_timestamp: None,
            end_timestamp: None,
        }
    }

    /// Set the sort order.
    #[must_use]
    pub const fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the pagination token.
    #[must_use]
    pub fn with_next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }

    /// Bound the query to a time window (unix seconds, inclusive).
    #[must_use]
    pub const fn with_time_window(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start_timestamp = start;
        self.end_timestamp = end;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIST RESPONSE
// ═══════════════════════════════════════════════════════════════════════════════

/// Pagination link carried in a listing response.
///
/// Pagination terminates iff `next_token` is absent.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PageLink {
    /// Token for the next page, absent on the final page.
    #[serde(default, rename = "nextToken")]
    pub next_token: Option<String>,
}

/// Response from the transaction listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TxListResponse {
    /// Transactions in this page.
    #[serde(default)]
    pub items: Vec<TxItem>,

    /// Total count when requested; the explorer may omit it.
    #[serde(default)]
    pub count: Option<u64>,

    /// Pagination link.
    #[serde(default)]
    pub link: PageLink,
}

impl TxListResponse {
    /// Whether a further page exists.
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.link.next_token.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION ITEMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Address wrapper as the explorer nests it (`{"id": "0x..."}`).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AddressRef {
    /// Hex address; may be absent for contract creations.
    #[serde(default)]
    pub id: Option<String>,
}

/// One transaction as the explorer lists it.
///
/// All monetary and gas fields are decimal strings; L1 fields are only
/// populated on OP-stack deployments.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TxItem {
    /// Chain id of the transaction.
    pub chain_id: Option<u64>,
    /// Block number.
    pub block_number: Option<u64>,
    /// Index within the block.
    pub index: Option<u32>,
    /// ISO-8601 block timestamp.
    pub timestamp: Option<String>,
    /// Sender.
    pub from: Option<AddressRef>,
    /// Recipient; absent for contract creation.
    pub to: Option<AddressRef>,
    /// Transaction hash; some listings carry it as `id` instead.
    pub tx_hash: Option<String>,
    /// Fallback identifier when `txHash` is absent.
    pub id: Option<String>,
    /// ETH value in wei (decimal string).
    pub value: Option<String>,
    /// Gas limit (decimal string).
    pub gas_limit: Option<String>,
    /// Gas used (decimal string).
    pub gas_used: Option<String>,
    /// Gas price (decimal string).
    pub gas_price: Option<String>,
    /// Effective gas price (decimal string).
    pub effective_gas_price: Option<String>,
    /// Max fee per gas (decimal string).
    pub max_fee_per_gas: Option<String>,
    /// Max priority fee per gas (decimal string).
    pub max_priority_fee_per_gas: Option<String>,
    /// Burned fees (decimal string).
    pub burned_fees: Option<String>,
    /// Function selector (`0x`-prefixed 4 bytes).
    pub method_id: Option<String>,
    /// Full method signature, e.g. `transfer(address,uint256)`.
    pub method: Option<String>,
    /// Execution status.
    pub status: Option<bool>,
    /// Sender nonce.
    pub nonce: Option<u64>,
    /// Transaction type.
    #[serde(rename = "type")]
    pub tx_type: Option<i32>,
    /// Call input data (hex).
    pub input: Option<String>,
    /// L1 gas used (OP-stack, decimal string).
    pub l1_gas_used: Option<String>,
    /// L1 gas price (OP-stack, decimal string).
    pub l1_gas_price: Option<String>,
    /// L1 data fee (OP-stack, decimal string).
    pub l1_fee: Option<String>,
}

impl TxItem {
    /// The transaction hash, falling back to `id` when `txHash` is absent.
    ///
    /// Returns `None` when the item carries neither; such rows are dropped
    /// by the canonical mapping.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.tx_hash
            .as_deref()
            .or(self.id.as_deref())
            .filter(|h| !h.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETAIL RESPONSE
// ═══════════════════════════════════════════════════════════════════════════════

/// A log entry from the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntry {
    /// Emitting contract address.
    pub address: Option<String>,
    /// Indexed topics.
    pub topics: Vec<String>,
    /// ABI-encoded data (hex).
    pub data: Option<String>,
    /// Index within the block.
    pub log_index: Option<u32>,
}

/// An internal operation (value transfer, call, create) from the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Operation {
    /// Operation kind as the explorer names it (`call`, `delegatecall`, ...).
    #[serde(rename = "type")]
    pub op_type: Option<String>,
    /// Originating address.
    pub from: Option<String>,
    /// Target address.
    pub to: Option<String>,
    /// Transferred value in wei (decimal string).
    pub value: Option<String>,
}

/// Full per-hash transaction detail.
///
/// Carries the same fields as the listing plus the `logs` and `operations`
/// arrays used for enrichment, and the contract verification flag.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxDetail {
    /// The base transaction fields.
    #[serde(flatten)]
    pub tx: TxItem,
    /// Logs emitted by the transaction.
    pub logs: Vec<LogEntry>,
    /// Internal operations.
    pub operations: Vec<Operation>,
    /// Whether the target contract is source-verified on the explorer.
    pub contract_verified: Option<bool>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_for_contract_lowercases() {
        let query = TxListQuery::for_contract("0xABCDEF0000000000000000000000000000000001");
        assert_eq!(
            query.from_addresses,
            "0xabcdef0000000000000000000000000000000001"
        );
        assert_eq!(query.from_addresses, query.to_addresses);
    }

    #[test]
    fn item_hash_prefers_tx_hash() {
        let item = TxItem {
            tx_hash: Some("0xaaa".into()),
            id: Some("0xbbb".into()),
            ..TxItem::default()
        };
        assert_eq!(item.hash(), Some("0xaaa"));
    }

    #[test]
    fn item_hash_falls_back_to_id() {
        let item = TxItem {
            id: Some("0xbbb".into()),
            ..TxItem::default()
        };
        assert_eq!(item.hash(), Some("0xbbb"));
    }

    #[test]
    fn item_hash_rejects_empty() {
        let item = TxItem {
            tx_hash: Some(String::new()),
            ..TxItem::default()
        };
        assert_eq!(item.hash(), None);
    }

    #[test]
    fn list_response_tolerates_unknown_fields() {
        let json = r#"{
            "items": [{
                "chainId": 57073,
                "blockNumber": 42,
                "txHash": "0x01",
                "value": "1000000000000000000",
                "someFutureField": {"nested": true}
            }],
            "count": 1,
            "link": {"nextToken": "tok-2"},
            "anotherUnknown": []
        }"#;

        let response: TxListResponse = serde_json::from_str(json).expect("tolerant decode");
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].value.as_deref(), Some("1000000000000000000"));
        assert_eq!(response.link.next_token.as_deref(), Some("tok-2"));
        assert!(response.has_next_page());
    }

    #[test]
    fn list_response_final_page() {
        let json = r#"{"items": [], "count": 0, "link": {}}"#;
        let response: TxListResponse = serde_json::from_str(json).expect("decode");
        assert!(!response.has_next_page());
    }

    #[test]
    fn list_response_missing_link() {
        let json = r#"{"items": []}"#;
        let response: TxListResponse = serde_json::from_str(json).expect("decode");
        assert!(!response.has_next_page());
        assert!(response.count.is_none());
    }

    #[test]
    fn detail_flattens_base_fields() {
        let json = r#"{
            "txHash": "0x02",
            "method": "mint(address,uint256)",
            "methodId": "0x40c10f19",
            "gasUsed": "53000",
            "logs": [
                {"address": "0xfeed", "topics": ["0x01"], "data": "0x", "logIndex": 0}
            ],
            "operations": [
                {"type": "call", "from": "0xaaaa", "to": "0xbbbb", "value": "0"}
            ],
            "contractVerified": true
        }"#;

        let detail: TxDetail = serde_json::from_str(json).expect("decode");
        assert_eq!(detail.tx.hash(), Some("0x02"));
        assert_eq!(detail.tx.gas_used.as_deref(), Some("53000"));
        assert_eq!(detail.logs.len(), 1);
        assert_eq!(detail.operations.len(), 1);
        assert_eq!(detail.contract_verified, Some(true));
    }

    #[test]
    fn decimal_fields_stay_strings() {
        // A value above 2^53 that would corrupt through an f64 round-trip.
        let json = r#"{"items": [{"txHash": "0x03", "value": "123456789012345678901234567890"}]}"#;
        let response: TxListResponse = serde_json::from_str(json).expect("decode");
        assert_eq!(
            response.items[0].value.as_deref(),
            Some("123456789012345678901234567890")
        );
    }
}
