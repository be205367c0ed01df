//! Chain JSON-RPC fallback for full-block scanning.
//!
//! When the explorer is unreachable (or a contract requires full-block
//! scanning), the ingestor walks blocks directly over standard JSON-RPC:
//! `eth_blockNumber`, `eth_getBlockByNumber(include_txs=true)`, and
//! `eth_getBlockReceipts`. Rows produced here are interchangeable with
//! explorer rows: the same canonical field rules apply, numerics stay
//! decimal strings, and missing fields default to null.
//!
//! Blocks are fetched in batches (one HTTP request carrying
//! `2 × batch_size` RPC calls) with up to three batches in flight per
//! contract. Hex quantities are decoded into decimal strings without ever
//! touching floating point.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::RpcSettings;
use crate::error::{InfraError, Result};
use crate::ports::{CursorStore, TransactionStore};
use crate::store::with_storage_retry;
use crate::types::entities::{Contract, IngestReport, TransactionRecord};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

impl<'a> JsonRpcRequest<'a> {
    fn new(method: &'a str, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// A block as `eth_getBlockByNumber(_, true)` reports it.
///
/// Quantities arrive as hex strings; only the fields the canonical row
/// needs are decoded, everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RpcBlock {
    number: Option<String>,
    hash: Option<String>,
    timestamp: Option<String>,
    transactions: Vec<RpcTransaction>,
}

/// A transaction within a full block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RpcTransaction {
    hash: Option<String>,
    from: Option<String>,
    to: Option<String>,
    value: Option<String>,
    gas: Option<String>,
    gas_price: Option<String>,
    max_fee_per_gas: Option<String>,
    max_priority_fee_per_gas: Option<String>,
    input: Option<String>,
    nonce: Option<String>,
    transaction_index: Option<String>,
    #[serde(rename = "type")]
    tx_type: Option<String>,
    chain_id: Option<String>,
}

/// A receipt as `eth_getBlockReceipts` reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RpcReceipt {
    transaction_hash: Option<String>,
    gas_used: Option<String>,
    effective_gas_price: Option<String>,
    status: Option<String>,
    l1_fee: Option<String>,
    l1_gas_price: Option<String>,
    l1_gas_used: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEX DECODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Decode a `0x`-prefixed hex quantity into a u64.
fn hex_u64(value: Option<&str>) -> Option<u64> {
    let s = value?;
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()
}

/// Decode a `0x`-prefixed hex quantity into a decimal-string wei amount.
///
/// Quantities above u128 range cannot occur for real gas/value fields;
/// a malformed quantity decodes as absent.
fn hex_wei(value: Option<&str>) -> Option<WeiAmount> {
    let s = value?;
    let n = u128::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()?;
    WeiAmount::parse(&n.to_string()).ok()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RPC CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimal JSON-RPC client for the block-scan path.
#[derive(Debug, Clone)]
pub struct ChainRpcClient {
    http: reqwest::Client,
    url: String,
}

impl ChainRpcClient {
    /// Create a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InfraError::Rpc(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Fetch the current chain head.
    async fn block_number(&self) -> Result<u64> {
        let request = JsonRpcRequest::new("eth_blockNumber", serde_json::json!([]), 1);
        let body: serde_json::Value = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| InfraError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| InfraError::Rpc(e.to_string()))?;

        hex_u64(body.get("result").and_then(|v| v.as_str()))
            .ok_or_else(|| InfraError::Rpc("Malformed eth_blockNumber response".into()).into())
    }

    /// Fetch a contiguous block range with receipts in one batch request.
    ///
    /// Each block contributes two calls: `eth_getBlockByNumber` with full
    /// transactions and `eth_getBlockReceipts`.
    async fn fetch_blocks(&self, from: u64, to: u64) -> Result<Vec<(RpcBlock, Vec<RpcReceipt>)>> {
        let count = (to - from + 1) as usize;
        let mut batch = Vec::with_capacity(count * 2);
        for (i, block) in (from..=to).enumerate() {
            let hex = format!("0x{block:x}");
            batch.push(JsonRpcRequest::new(
                "eth_getBlockByNumber",
                serde_json::json!([hex, true]),
                (i * 2) as u64,
            ));
            batch.push(JsonRpcRequest::new(
                "eth_getBlockReceipts",
                serde_json::json!([hex]),
                (i * 2 + 1) as u64,
            ));
        }

        let responses: Vec<serde_json::Value> = self
            .http
            .post(&self.url)
            .json(&batch)
            .send()
            .await
            .map_err(|e| InfraError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| InfraError::Rpc(e.to_string()))?;

        // Responses may arrive out of order; index them by id.
        let mut by_id = std::collections::BTreeMap::new();
        for response in &responses {
            if let Some(id) = response.get("id").and_then(serde_json::Value::as_u64) {
                by_id.insert(id, response);
            }
        }

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let block_value = by_id
                .get(&((i * 2) as u64))
                .and_then(|r| r.get("result"))
                .cloned()
                .ok_or_else(|| InfraError::Rpc(format!("Missing block {}", from + i as u64)))?;
            if block_value.is_null() {
                return Err(InfraError::Rpc(format!("Block {} not found", from + i as u64)).into());
            }
            let block: RpcBlock = serde_json::from_value(block_value)
                .map_err(|e| InfraError::Rpc(format!("Malformed block: {e}")))?;

            let receipts: Vec<RpcReceipt> = by_id
                .get(&((i * 2 + 1) as u64))
                .and_then(|r| r.get("result"))
                .filter(|v| !v.is_null())
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()
                .map_err(|e| InfraError::Rpc(format!("Malformed receipts: {e}")))?
                .unwrap_or_default();

            out.push((block, receipts));
        }
        Ok(out)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RPC SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Full-block scanner producing canonical base rows for one contract.
pub struct RpcScanner {
    client: ChainRpcClient,
    cursors: std::sync::Arc<dyn CursorStore>,
    transactions: std::sync::Arc<dyn TransactionStore>,
    batch_size: u64,
    max_concurrent: usize,
    max_consecutive_failures: u32,
    default_chain_id: u64,
}

impl std::fmt::Debug for RpcScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcScanner")
            .field("batch_size", &self.batch_size)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl RpcScanner {
    /// Create a scanner from RPC settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_settings(
        settings: &RpcSettings,
        cursors: std::sync::Arc<dyn CursorStore>,
        transactions: std::sync::Arc<dyn TransactionStore>,
        default_chain_id: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: ChainRpcClient::new(&settings.url, settings.request_timeout())?,
            cursors,
            transactions,
            batch_size: settings.block_batch_size.max(1),
            max_concurrent: settings.max_concurrent_batches.max(1),
            max_consecutive_failures: settings.max_consecutive_failures.max(1),
            default_chain_id,
        })
    }

    /// Scan blocks from `from_block` to the current head, keeping
    /// transactions whose `to` or `from` equals the contract address.
    ///
    /// # Errors
    ///
    /// Returns an RPC error after the configured number of consecutive
    /// batch failures; the caller latches the fallback off for the run.
    #[instrument(skip_all, fields(contract = %contract.address, from = %from_block))]
    pub async fn scan(
        &self,
        contract: &Contract,
        from_block: BlockNumber,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let head = self.client.block_number().await?;
        let address = contract.address;

        let mut report = IngestReport::default();
        let mut current = from_block.value();
        let mut consecutive_failures = 0u32;

        info!(head, "Starting RPC block scan");

        while current <= head {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            // Up to `max_concurrent` ranges in flight at once.
            let mut ranges = Vec::with_capacity(self.max_concurrent);
            for _ in 0..self.max_concurrent {
                if current > head {
                    break;
                }
                let end = (current + self.batch_size - 1).min(head);
                ranges.push((current, end));
                current = end + 1;
            }

            let fetches = ranges
                .iter()
                .map(|(from, to)| self.client.fetch_blocks(*from, *to));
            let results = join_all(fetches).await;

            let mut rows: Vec<TransactionRecord> = Vec::new();
            for ((from, to), result) in ranges.iter().zip(results) {
                match result {
                    Ok(blocks) => {
                        consecutive_failures = 0;
                        for (block, receipts) in &blocks {
                            rows.extend(self.map_block(block, receipts, &address));
                        }
                        debug!(from, to, "Block range fetched");
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(from, to, failures = consecutive_failures, error = %e, "Block range failed");
                        if consecutive_failures >= self.max_consecutive_failures {
                            return Err(InfraError::Rpc(format!(
                                "RPC failed {consecutive_failures} times consecutively"
                            ))
                            .into());
                        }
                    }
                }
            }

            let returned = rows.len() as u64;
            let mut inserted = 0u64;
            for chunk in rows.chunks(500) {
                inserted += with_storage_retry(3, || self.transactions.insert_batch(chunk)).await?;
            }

            let newest = rows
                .iter()
                .map(|r| r.block_number)
                .max()
                .or(Some(BlockNumber::new(current.saturating_sub(1))));

            report.pages_fetched += ranges.len() as u32;
            report.rows_returned += returned;
            report.rows_inserted += inserted;
            report.newest_block = report.newest_block.max(newest);

            self.cursors
                .upsert(&address, None, newest, returned, current > head)
                .await?;
        }

        report.completed = true;
        info!(
            rows = report.rows_returned,
            inserted = report.rows_inserted,
            "RPC block scan complete"
        );
        Ok(report)
    }

    /// Keep a block's transactions touching the contract, merged with
    /// their receipts, in canonical row shape.
    fn map_block(
        &self,
        block: &RpcBlock,
        receipts: &[RpcReceipt],
        contract: &EthAddress,
    ) -> Vec<TransactionRecord> {
        let block_number = hex_u64(block.number.as_deref()).unwrap_or(0);
        let timestamp = hex_u64(block.timestamp.as_deref())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));
        let Some(block_timestamp) = timestamp else {
            warn!(block_number, "Block missing timestamp, skipping");
            return Vec::new();
        };

        let contract_hex = contract.to_hex();
        let mut rows = Vec::new();

        for tx in &block.transactions {
            let touches = tx
                .to
                .as_deref()
                .is_some_and(|to| to.eq_ignore_ascii_case(&contract_hex))
                || tx
                    .from
                    .as_deref()
                    .is_some_and(|from| from.eq_ignore_ascii_case(&contract_hex));
            if !touches {
                continue;
            }

            let Some(tx_hash) = tx.hash.as_deref().and_then(|h| TxHash::from_hex(h).ok()) else {
                continue;
            };
            let Some(wallet) = tx
                .from
                .as_deref()
                .and_then(|f| EthAddress::from_hex(f).ok())
            else {
                continue;
            };

            let receipt = receipts
                .iter()
                .find(|r| {
                    r.transaction_hash
                        .as_deref()
                        .is_some_and(|h| h.eq_ignore_ascii_case(&tx_hash.to_hex()))
                })
                .cloned()
                .unwrap_or_default();

            let input = tx.input.clone();
            let selector = input
                .as_deref()
                .filter(|i| i.len() >= 10)
                .map(|i| i[..10].to_lowercase());

            rows.push(TransactionRecord {
                tx_hash,
                wallet_address: wallet,
                contract_address: *contract,
                to_address: tx.to.as_deref().and_then(|t| EthAddress::from_hex(t).ok()),
                function_selector: selector,
                function_name: None,
                input_data: input,
                eth_value: hex_wei(tx.value.as_deref()).unwrap_or_else(WeiAmount::zero),
                gas_limit: hex_wei(tx.gas.as_deref()),
                gas_used: hex_wei(receipt.gas_used.as_deref()),
                gas_price: hex_wei(tx.gas_price.as_deref()),
                effective_gas_price: hex_wei(receipt.effective_gas_price.as_deref()),
                max_fee_per_gas: hex_wei(tx.max_fee_per_gas.as_deref()),
                max_priority_fee_per_gas: hex_wei(tx.max_priority_fee_per_gas.as_deref()),
                burned_fees: None,
                l1_gas_used: hex_wei(receipt.l1_gas_used.as_deref()),
                l1_gas_price: hex_wei(receipt.l1_gas_price.as_deref()),
                l1_fee: hex_wei(receipt.l1_fee.as_deref()),
                block_number: BlockNumber::new(block_number),
                block_hash: block.hash.as_deref().map(str::to_lowercase),
                block_timestamp,
                tx_index: hex_u64(tx.transaction_index.as_deref()).map(|i| i as u32),
                nonce: hex_u64(tx.nonce.as_deref()),
                tx_type: hex_u64(tx.tx_type.as_deref()).map(|t| t as i32),
                status: i16::from(hex_u64(receipt.status.as_deref()) == Some(1)),
                chain_id: hex_u64(tx.chain_id.as_deref()).unwrap_or(self.default_chain_id),
            });
        }

        rows
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hex_u64_decodes_quantities() {
        assert_eq!(hex_u64(Some("0x1a4")), Some(420));
        assert_eq!(hex_u64(Some("0x0")), Some(0));
        assert_eq!(hex_u64(Some("zz")), None);
        assert_eq!(hex_u64(None), None);
    }

    #[test]
    fn hex_wei_preserves_large_values() {
        // 2^70 wei exceeds f64 integer precision.
        let wei = hex_wei(Some("0x400000000000000000")).unwrap();
        assert_eq!(wei.as_str(), "1180591620717411303424");
    }

    #[test]
    fn block_decoding_is_tolerant() {
        let json = r#"{
            "number": "0x10",
            "hash": "0xAB",
            "timestamp": "0x665f1e00",
            "transactions": [
                {"hash": "0x01", "from": "0xaa", "unknownField": 7}
            ],
            "extraneous": {"ignored": true}
        }"#;

        let block: RpcBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(hex_u64(block.number.as_deref()), Some(16));
    }

    #[test]
    fn receipt_status_maps_to_smallint() {
        assert_eq!(i16::from(hex_u64(Some("0x1")) == Some(1)), 1);
        assert_eq!(i16::from(hex_u64(Some("0x0")) == Some(1)), 0);
        assert_eq!(i16::from(hex_u64(None) == Some(1)), 0);
    }
}
