//! Canonical transformation from explorer list items to base rows.
//!
//! One pure function, [`map_item`], owns every normalization rule so the
//! explorer path and the RPC fallback produce interchangeable rows:
//!
//! - `tx_hash ← txHash || id`; items with neither are skipped
//! - addresses lowercase; `contract_address` is the **queried** contract,
//!   never derived from the item's from/to
//! - `function_name ← method.split("(")[0]`
//! - `status ← 1 if true else 0`; failed rows are kept
//! - all wei/gas fields stay decimal strings; absent L1 fields stay null

use chrono::{DateTime, Utc};
use routescan_client::TxItem;

use crate::types::entities::TransactionRecord;
use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

/// Why an item was skipped by the canonical mapping.
///
/// Skips are silent per item; the ingest loop logs one tally per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither `txHash` nor `id` present, or unparseable.
    MissingHash,
    /// No usable sender; the row cannot be attributed to a wallet.
    MissingSender,
    /// Missing or unparseable block timestamp.
    BadTimestamp,
}

/// Map one explorer item into the canonical base row.
///
/// # Errors
///
/// Returns the [`SkipReason`] when the item cannot form a valid row;
/// callers count skips rather than failing the page.
pub fn map_item(
    item: &TxItem,
    contract: &EthAddress,
    default_chain_id: u64,
) -> Result<TransactionRecord, SkipReason> {
    let tx_hash = item
        .hash()
        .and_then(|h| TxHash::from_hex(h).ok())
        .ok_or(SkipReason::MissingHash)?;

    let wallet_address = item
        .from
        .as_ref()
        .and_then(|a| a.id.as_deref())
        .and_then(|s| EthAddress::from_hex(s).ok())
        .ok_or(SkipReason::MissingSender)?;

    let block_timestamp = item
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .ok_or(SkipReason::BadTimestamp)?;

    let to_address = item
        .to
        .as_ref()
        .and_then(|a| a.id.as_deref())
        .and_then(|s| EthAddress::from_hex(s).ok());

    let function_name = item
        .method
        .as_deref()
        .and_then(|m| m.split('(').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);

    Ok(TransactionRecord {
        tx_hash,
        wallet_address,
        contract_address: *contract,
        to_address,
        function_selector: item.method_id.as_deref().map(str::to_lowercase),
        function_name,
        input_data: item.input.clone(),
        eth_value: wei(item.value.as_deref()).unwrap_or_else(WeiAmount::zero),
        gas_limit: wei(item.gas_limit.as_deref()),
        gas_used: wei(item.gas_used.as_deref()),
        gas_price: wei(item.gas_price.as_deref()),
        effective_gas_price: wei(item.effective_gas_price.as_deref()),
        max_fee_per_gas: wei(item.max_fee_per_gas.as_deref()),
        max_priority_fee_per_gas: wei(item.max_priority_fee_per_gas.as_deref()),
        burned_fees: wei(item.burned_fees.as_deref()),
        l1_gas_used: wei(item.l1_gas_used.as_deref()),
        l1_gas_price: wei(item.l1_gas_price.as_deref()),
        l1_fee: wei(item.l1_fee.as_deref()),
        block_number: BlockNumber::new(item.block_number.unwrap_or(0)),
        block_hash: None,
        block_timestamp,
        tx_index: item.index,
        nonce: item.nonce,
        tx_type: item.tx_type,
        status: i16::from(item.status == Some(true)),
        chain_id: item.chain_id.unwrap_or(default_chain_id),
    })
}

/// Parse an upstream decimal string, treating malformed values as absent.
fn wei(value: Option<&str>) -> Option<WeiAmount> {
    value.and_then(|s| WeiAmount::parse(s).ok())
}

/// Parse the upstream ISO-8601 timestamp.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use routescan_client::types::AddressRef;

    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000c1";
    const HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn contract() -> EthAddress {
        EthAddress::from_hex(CONTRACT).unwrap()
    }

    fn base_item() -> TxItem {
        TxItem {
            chain_id: Some(57073),
            block_number: Some(1000),
            index: Some(3),
            timestamp: Some("2025-06-01T12:00:00Z".into()),
            from: Some(AddressRef {
                id: Some("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into()),
            }),
            to: Some(AddressRef {
                id: Some(CONTRACT.to_uppercase().replace("0X", "0x")),
            }),
            tx_hash: Some(HASH.into()),
            value: Some("1500000000000000000".into()),
            gas_used: Some("21000".into()),
            method_id: Some("0xA9059CBB".into()),
            method: Some("transfer(address,uint256)".into()),
            status: Some(true),
            nonce: Some(7),
            tx_type: Some(2),
            input: Some("0xa9059cbb0000".into()),
            ..TxItem::default()
        }
    }

    #[test]
    fn maps_canonical_fields() {
        let record = map_item(&base_item(), &contract(), 57073).unwrap();

        assert_eq!(record.tx_hash.to_hex(), HASH);
        assert_eq!(
            record.wallet_address.to_hex(),
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
        assert_eq!(record.contract_address, contract());
        assert_eq!(record.to_address, Some(contract()));
        assert_eq!(record.function_selector.as_deref(), Some("0xa9059cbb"));
        assert_eq!(record.function_name.as_deref(), Some("transfer"));
        assert_eq!(record.eth_value.as_str(), "1500000000000000000");
        assert_eq!(record.gas_used.as_ref().unwrap().as_str(), "21000");
        assert_eq!(record.block_number.value(), 1000);
        assert_eq!(record.status, 1);
        assert_eq!(record.chain_id, 57073);
        // L1 fields absent upstream stay null.
        assert!(record.l1_fee.is_none());
    }

    #[test]
    fn contract_address_is_the_queried_contract() {
        let mut item = base_item();
        // Neither endpoint of the transfer is the queried contract.
        item.to = Some(AddressRef {
            id: Some("0x00000000000000000000000000000000000000dd".into()),
        });

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert_eq!(record.contract_address, contract());
    }

    #[test]
    fn falls_back_to_id_for_hash() {
        let mut item = base_item();
        item.tx_hash = None;
        item.id = Some(HASH.into());

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert_eq!(record.tx_hash.to_hex(), HASH);
    }

    #[test]
    fn skips_item_without_hash() {
        let mut item = base_item();
        item.tx_hash = None;
        item.id = None;

        assert_eq!(
            map_item(&item, &contract(), 57073),
            Err(SkipReason::MissingHash)
        );
    }

    #[test]
    fn skips_item_with_empty_hash() {
        let mut item = base_item();
        item.tx_hash = Some(String::new());
        item.id = None;

        assert_eq!(
            map_item(&item, &contract(), 57073),
            Err(SkipReason::MissingHash)
        );
    }

    #[test]
    fn skips_item_without_sender() {
        let mut item = base_item();
        item.from = None;

        assert_eq!(
            map_item(&item, &contract(), 57073),
            Err(SkipReason::MissingSender)
        );
    }

    #[test]
    fn failed_transactions_are_kept() {
        let mut item = base_item();
        item.status = Some(false);

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert_eq!(record.status, 0);
    }

    #[test]
    fn missing_status_maps_to_failure() {
        let mut item = base_item();
        item.status = None;

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert_eq!(record.status, 0);
    }

    #[test]
    fn malformed_value_becomes_zero() {
        let mut item = base_item();
        item.value = Some("1.21e18".into());

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert!(record.eth_value.is_zero());
    }

    #[test]
    fn missing_chain_id_uses_default() {
        let mut item = base_item();
        item.chain_id = None;

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert_eq!(record.chain_id, 57073);
    }

    #[test]
    fn method_without_parens_is_kept_whole() {
        let mut item = base_item();
        item.method = Some("fallback".into());

        let record = map_item(&item, &contract(), 57073).unwrap();
        assert_eq!(record.function_name.as_deref(), Some("fallback"));
    }
}
