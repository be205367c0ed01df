//! Enrichment pipeline: per-transaction detail on top of base rows.
//!
//! Two operating modes coexist:
//!
//! - **Event-driven** ([`EnrichmentListener`]): a storage notification
//!   carries `{contract_address, tx_hash}` for each freshly inserted
//!   base row of a volume-indexed contract; the listener fetches detail
//!   and upserts the enrichment row. Transient failures are *not*
//!   retried here; the gap filler owns recovery.
//! - **Gap filler** ([`GapFiller`]): computes the per-contract deficit
//!   (base rows minus enrichment rows), slices it into offset batches,
//!   and drives a bounded worker pool with paced, retried detail fetches.
//!
//! ```text
//! base insert ──▶ notify ──▶ Listener ──▶ detail fetch ──▶ enrichment row
//!                                │ (dropped on failure)
//!                                ▼
//!                     GapFiller (periodic)  ──▶ deficit → batches → workers
//! ```

mod gap_filler;
mod listener;
mod sources;

pub use gap_filler::{GapFillSummary, GapFiller};
pub use listener::{EnrichmentListener, ListenOutcome};
pub use sources::{ChannelNotificationSource, PgNotificationSource, PollingNotificationSource};

use chrono::Utc;
use routescan_client::TxDetail;

use crate::types::entities::{EnrichmentRecord, TransactionRecord};
use crate::types::primitives::WeiAmount;

/// Build an enrichment row from a detail response and its base row.
///
/// Detail fields win where present; the base row fills gaps so a sparse
/// detail response still produces a useful enrichment row.
#[must_use]
pub fn build_enrichment(detail: &TxDetail, base: &TransactionRecord) -> EnrichmentRecord {
    let wei = |s: &Option<String>| s.as_deref().and_then(|v| WeiAmount::parse(v).ok());
    let now = Utc::now();

    EnrichmentRecord {
        tx_hash: base.tx_hash,
        contract_address: base.contract_address,
        value: wei(&detail.tx.value).or_else(|| Some(base.eth_value.clone())),
        gas_used: wei(&detail.tx.gas_used).or_else(|| base.gas_used.clone()),
        gas_price: wei(&detail.tx.gas_price).or_else(|| base.gas_price.clone()),
        gas_limit: wei(&detail.tx.gas_limit).or_else(|| base.gas_limit.clone()),
        burned_fees: wei(&detail.tx.burned_fees).or_else(|| base.burned_fees.clone()),
        l1_gas_used: wei(&detail.tx.l1_gas_used).or_else(|| base.l1_gas_used.clone()),
        l1_gas_price: wei(&detail.tx.l1_gas_price).or_else(|| base.l1_gas_price.clone()),
        l1_fee: wei(&detail.tx.l1_fee).or_else(|| base.l1_fee.clone()),
        contract_verified: detail.contract_verified.unwrap_or(false),
        method_id: detail
            .tx
            .method_id
            .as_deref()
            .map(str::to_lowercase)
            .or_else(|| base.function_selector.clone()),
        method_full: detail.tx.method.clone(),
        input: detail.tx.input.clone().or_else(|| base.input_data.clone()),
        logs: serde_json::to_value(&detail.logs).unwrap_or_else(|_| serde_json::json!([])),
        operations: serde_json::to_value(&detail.operations)
            .unwrap_or_else(|_| serde_json::json!([])),
        created_at: now,
        updated_at: now,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use routescan_client::TxItem;
    use routescan_client::types::{LogEntry, Operation};

    use super::*;
    use crate::types::primitives::{BlockNumber, EthAddress, TxHash};

    fn base() -> TransactionRecord {
        TransactionRecord {
            tx_hash: TxHash::new([9u8; 32]),
            wallet_address: EthAddress::new([1u8; 20]),
            contract_address: EthAddress::new([2u8; 20]),
            to_address: None,
            function_selector: Some("0xa9059cbb".into()),
            function_name: Some("transfer".into()),
            input_data: Some("0xa9059cbb00".into()),
            eth_value: WeiAmount::parse("1000").unwrap(),
            gas_limit: Some(WeiAmount::parse("21000").unwrap()),
            gas_used: None,
            gas_price: None,
            effective_gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            burned_fees: None,
            l1_gas_used: None,
            l1_gas_price: None,
            l1_fee: None,
            block_number: BlockNumber::new(5),
            block_hash: None,
            block_timestamp: Utc::now(),
            tx_index: None,
            nonce: None,
            tx_type: None,
            status: 1,
            chain_id: 57073,
        }
    }

    #[test]
    fn detail_fields_win_over_base() {
        let detail = TxDetail {
            tx: TxItem {
                gas_used: Some("53000".into()),
                ..TxItem::default()
            },
            logs: vec![LogEntry::default()],
            operations: vec![Operation::default()],
            contract_verified: Some(true),
        };

        let record = build_enrichment(&detail, &base());
        assert_eq!(record.gas_used.unwrap().as_str(), "53000");
        assert!(record.contract_verified);
        assert_eq!(record.logs.as_array().map(Vec::len), Some(1));
        assert_eq!(record.operations.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn base_fields_fill_sparse_detail() {
        let detail = TxDetail::default();

        let record = build_enrichment(&detail, &base());
        assert_eq!(record.value.unwrap().as_str(), "1000");
        assert_eq!(record.gas_limit.unwrap().as_str(), "21000");
        assert_eq!(record.method_id.as_deref(), Some("0xa9059cbb"));
        assert_eq!(record.input.as_deref(), Some("0xa9059cbb00"));
        assert!(!record.contract_verified);
    }
}
