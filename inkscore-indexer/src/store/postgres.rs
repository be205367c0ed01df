//! PostgreSQL implementation of store ports using SQLx.
//!
//! This module provides the primary persistence layer. All status columns
//! are TEXT so operator queries read naturally; all wei/gas columns are
//! NUMERIC(78,0) so 256-bit amounts survive losslessly.
//!
//! # Type Conversions
//!
//! PostgreSQL uses signed integers (i16, i32, i64) for numeric columns while
//! the domain uses unsigned types. These casts are safe because:
//! - Block numbers won't exceed i64::MAX (~9 quintillion)
//! - Counts won't exceed i64::MAX
//! - Status is 0 or 1
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless // Using `as i64` for u32 is clear in DB binding context
)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Row};
use tracing::{debug, instrument};

use crate::config::DatabaseSettings;
use crate::error::{InfraError, Result};
use crate::ports::{ContractStore, CursorStore, EnrichmentStore, JobStore, TransactionStore};
use crate::types::entities::{
    BackfillJob, Contract, Cursor, EnrichmentRecord, JobPayload, NewContract, NewJob,
    TransactionRecord,
};
use crate::types::enums::{ContractStatus, IndexType, JobStatus};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL-based store implementation.
///
/// Implements all store port traits using SQLx for database access.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from database settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout())
            .idle_timeout(settings.idle_timeout())
            .connect(&settings.url)
            .await
            .map_err(InfraError::Database)?;

        Ok(Self::new(pool))
    }

    /// Connect a deliberately small pool, shared by the gap-filler
    /// workers, that keeps their aggregate connection use bounded.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect_small(settings: &DatabaseSettings, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(settings.connect_timeout())
            .connect(&settings.url)
            .await
            .map_err(InfraError::Database)?;

        Ok(Self::new(pool))
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InfraError::Internal(format!("Migration error: {e}")))?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

const CONTRACT_COLUMNS: &str = "id, address, chain_id, deploy_block, active, indexing_enabled, \
     index_type, status, current_block, total_blocks, progress_percent, total_indexed, \
     last_indexed_at, error_message, created_at, updated_at";

/// Database row for contracts.
#[derive(Debug, FromRow)]
struct ContractRow {
    id: i64,
    address: String,
    chain_id: i64,
    deploy_block: Option<i64>,
    active: bool,
    indexing_enabled: bool,
    index_type: String,
    status: String,
    current_block: Option<i64>,
    total_blocks: Option<i64>,
    progress_percent: f64,
    total_indexed: i64,
    last_indexed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContractRow> for Contract {
    type Error = InfraError;

    fn try_from(row: ContractRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            address: EthAddress::from_hex(&row.address)
                .map_err(|e| InfraError::Internal(format!("Invalid address in DB: {e}")))?,
            chain_id: row.chain_id as u64,
            deploy_block: row.deploy_block.map(|b| BlockNumber::new(b as u64)),
            active: row.active,
            indexing_enabled: row.indexing_enabled,
            index_type: row
                .index_type
                .parse::<IndexType>()
                .map_err(|e| InfraError::Internal(format!("Invalid index type in DB: {e}")))?,
            status: row
                .status
                .parse::<ContractStatus>()
                .map_err(|e| InfraError::Internal(format!("Invalid status in DB: {e}")))?,
            current_block: row.current_block.map(|b| BlockNumber::new(b as u64)),
            total_blocks: row.total_blocks.map(|b| b as u64),
            progress_percent: row.progress_percent,
            total_indexed: row.total_indexed as u64,
            last_indexed_at: row.last_indexed_at,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ContractStore for PostgresStore {
    #[instrument(skip(self), fields(address = %address))]
    async fn get(&self, address: &EthAddress) -> Result<Option<Contract>> {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE address = $1");
        let row = sqlx::query_as::<_, ContractRow>(&sql)
            .bind(address.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> Result<Option<Contract>> {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1");
        let row = sqlx::query_as::<_, ContractRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, contract), fields(address = %contract.address))]
    async fn insert(&self, contract: &NewContract) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO contracts (address, chain_id, deploy_block, index_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(contract.address.to_hex())
        .bind(contract.chain_id as i64)
        .bind(contract.deploy_block.map(|b| b.value() as i64))
        .bind(contract.index_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!(id, "Contract registered");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Contract>> {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, ContractRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|r| Contract::try_from(r).map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self))]
    async fn backfill_candidates(&self, stale_after: chrono::Duration) -> Result<Vec<Contract>> {
        let sql = format!(
            r#"
            SELECT {CONTRACT_COLUMNS} FROM contracts
            WHERE active AND indexing_enabled
              AND (status IN ('pending', 'error')
                   OR (status = 'indexing' AND updated_at < NOW() - make_interval(secs => $1)))
            ORDER BY created_at ASC
            "#
        );
        let rows = sqlx::query_as::<_, ContractRow>(&sql)
            .bind(stale_after.num_milliseconds() as f64 / 1000.0)
            .fetch_all(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|r| Contract::try_from(r).map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self))]
    async fn pollable(&self) -> Result<Vec<Contract>> {
        let sql = format!(
            r#"
            SELECT {CONTRACT_COLUMNS} FROM contracts
            WHERE active AND indexing_enabled AND status = 'complete'
            ORDER BY created_at ASC
            "#
        );
        let rows = sqlx::query_as::<_, ContractRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|r| Contract::try_from(r).map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn try_claim(
        &self,
        address: &EthAddress,
        stale_after: chrono::Duration,
    ) -> Result<bool> {
        // A second worker attempting the same transition finds zero rows
        // affected and skips the contract.
        let result = sqlx::query(
            r#"
            UPDATE contracts
            SET status = 'indexing', error_message = NULL, updated_at = NOW()
            WHERE address = $1
              AND active AND indexing_enabled
              AND (status IN ('pending', 'error')
                   OR (status = 'indexing' AND updated_at < NOW() - make_interval(secs => $2)))
            "#,
        )
        .bind(address.to_hex())
        .bind(stale_after.num_milliseconds() as f64 / 1000.0)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(address = %address, total_indexed))]
    async fn mark_complete(&self, address: &EthAddress, total_indexed: u64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contracts
            SET status = 'complete', total_indexed = $2, progress_percent = 100.0,
                last_indexed_at = NOW(), error_message = NULL, updated_at = NOW()
            WHERE address = $1
            "#,
        )
        .bind(address.to_hex())
        .bind(total_indexed as i64)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Contract marked complete");
        Ok(())
    }

    #[instrument(skip(self, message), fields(address = %address))]
    async fn mark_error(&self, address: &EthAddress, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contracts
            SET status = 'error', error_message = $2, updated_at = NOW()
            WHERE address = $1
            "#,
        )
        .bind(address.to_hex())
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self), fields(address = %address, status = %status))]
    async fn set_status(&self, address: &EthAddress, status: ContractStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contracts
            SET status = $2, error_message = NULL, updated_at = NOW()
            WHERE address = $1
            "#,
        )
        .bind(address.to_hex())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn touch_progress(
        &self,
        address: &EthAddress,
        current_block: Option<BlockNumber>,
        total_indexed: u64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contracts
            SET current_block = COALESCE($2, current_block),
                total_indexed = $3,
                last_indexed_at = NOW(),
                updated_at = NOW()
            WHERE address = $1
            "#,
        )
        .bind(address.to_hex())
        .bind(current_block.map(|b| b.value() as i64))
        .bind(total_indexed as i64)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Database row for cursors.
#[derive(Debug, FromRow)]
struct CursorRow {
    contract_address: String,
    last_page_token: Option<String>,
    last_block_indexed: Option<i64>,
    total_indexed: i64,
    is_complete: bool,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CursorRow> for Cursor {
    type Error = InfraError;

    fn try_from(row: CursorRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            contract_address: EthAddress::from_hex(&row.contract_address)
                .map_err(|e| InfraError::Internal(format!("Invalid address in DB: {e}")))?,
            last_page_token: row.last_page_token,
            last_block_indexed: row.last_block_indexed.map(|b| BlockNumber::new(b as u64)),
            total_indexed: row.total_indexed as u64,
            is_complete: row.is_complete,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CursorStore for PostgresStore {
    #[instrument(skip(self), fields(address = %address))]
    async fn get(&self, address: &EthAddress) -> Result<Option<Cursor>> {
        let row = sqlx::query_as::<_, CursorRow>(
            r#"
            SELECT contract_address, last_page_token, last_block_indexed,
                   total_indexed, is_complete, updated_at
            FROM cursors
            WHERE contract_address = $1
            "#,
        )
        .bind(address.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(address = %address, delta_indexed, is_complete))]
    async fn upsert(
        &self,
        address: &EthAddress,
        last_token: Option<&str>,
        last_block: Option<BlockNumber>,
        delta_indexed: u64,
        is_complete: bool,
    ) -> Result<()> {
        // Completion is monotonic in storage: once a cursor is complete it
        // stays complete (and tokenless) until an operator reset.
        sqlx::query(
            r#"
            INSERT INTO cursors (contract_address, last_page_token, last_block_indexed,
                                 total_indexed, is_complete, updated_at)
            VALUES ($1, CASE WHEN $5 THEN NULL ELSE $2 END, $3, $4, $5, NOW())
            ON CONFLICT (contract_address) DO UPDATE SET
                is_complete = cursors.is_complete OR EXCLUDED.is_complete,
                last_page_token = CASE
                    WHEN cursors.is_complete OR EXCLUDED.is_complete THEN NULL
                    ELSE EXCLUDED.last_page_token
                END,
                last_block_indexed = GREATEST(
                    COALESCE(EXCLUDED.last_block_indexed, cursors.last_block_indexed),
                    cursors.last_block_indexed
                ),
                total_indexed = cursors.total_indexed + $4,
                updated_at = NOW()
            "#,
        )
        .bind(address.to_hex())
        .bind(last_token)
        .bind(last_block.map(|b| b.value() as i64))
        .bind(delta_indexed as i64)
        .bind(is_complete)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Cursor advanced");
        Ok(())
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn reset(&self, address: &EthAddress) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cursors
            SET last_page_token = NULL, last_block_indexed = NULL,
                total_indexed = 0, is_complete = FALSE, updated_at = NOW()
            WHERE contract_address = $1
            "#,
        )
        .bind(address.to_hex())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Cursor reset");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

const TX_COLUMNS: &str = "tx_hash, wallet_address, contract_address, to_address, \
     function_selector, function_name, input_data, eth_value, gas_limit, gas_used, gas_price, \
     effective_gas_price, max_fee_per_gas, max_priority_fee_per_gas, burned_fees, l1_gas_used, \
     l1_gas_price, l1_fee, block_number, block_hash, block_timestamp, tx_index, nonce, tx_type, \
     status, chain_id";

/// Database row for base transactions.
#[derive(Debug, FromRow)]
struct TransactionRow {
    tx_hash: String,
    wallet_address: String,
    contract_address: String,
    to_address: Option<String>,
    function_selector: Option<String>,
    function_name: Option<String>,
    input_data: Option<String>,
    eth_value: sqlx::types::BigDecimal,
    gas_limit: Option<sqlx::types::BigDecimal>,
    gas_used: Option<sqlx::types::BigDecimal>,
    gas_price: Option<sqlx::types::BigDecimal>,
    effective_gas_price: Option<sqlx::types::BigDecimal>,
    max_fee_per_gas: Option<sqlx::types::BigDecimal>,
    max_priority_fee_per_gas: Option<sqlx::types::BigDecimal>,
    burned_fees: Option<sqlx::types::BigDecimal>,
    l1_gas_used: Option<sqlx::types::BigDecimal>,
    l1_gas_price: Option<sqlx::types::BigDecimal>,
    l1_fee: Option<sqlx::types::BigDecimal>,
    block_number: i64,
    block_hash: Option<String>,
    block_timestamp: DateTime<Utc>,
    tx_index: Option<i32>,
    nonce: Option<i64>,
    tx_type: Option<i32>,
    status: i16,
    chain_id: i64,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = InfraError;

    fn try_from(row: TransactionRow) -> std::result::Result<Self, Self::Error> {
        let addr = |s: &str| {
            EthAddress::from_hex(s)
                .map_err(|e| InfraError::Internal(format!("Invalid address in DB: {e}")))
        };
        Ok(Self {
            tx_hash: TxHash::from_hex(&row.tx_hash)
                .map_err(|e| InfraError::Internal(format!("Invalid hash in DB: {e}")))?,
            wallet_address: addr(&row.wallet_address)?,
            contract_address: addr(&row.contract_address)?,
            to_address: row.to_address.as_deref().map(addr).transpose()?,
            function_selector: row.function_selector,
            function_name: row.function_name,
            input_data: row.input_data,
            eth_value: WeiAmount::from_bigdecimal(&row.eth_value),
            gas_limit: row.gas_limit.as_ref().map(WeiAmount::from_bigdecimal),
            gas_used: row.gas_used.as_ref().map(WeiAmount::from_bigdecimal),
            gas_price: row.gas_price.as_ref().map(WeiAmount::from_bigdecimal),
            effective_gas_price: row
                .effective_gas_price
                .as_ref()
                .map(WeiAmount::from_bigdecimal),
            max_fee_per_gas: row.max_fee_per_gas.as_ref().map(WeiAmount::from_bigdecimal),
            max_priority_fee_per_gas: row
                .max_priority_fee_per_gas
                .as_ref()
                .map(WeiAmount::from_bigdecimal),
            burned_fees: row.burned_fees.as_ref().map(WeiAmount::from_bigdecimal),
            l1_gas_used: row.l1_gas_used.as_ref().map(WeiAmount::from_bigdecimal),
            l1_gas_price: row.l1_gas_price.as_ref().map(WeiAmount::from_bigdecimal),
            l1_fee: row.l1_fee.as_ref().map(WeiAmount::from_bigdecimal),
            block_number: BlockNumber::new(row.block_number as u64),
            block_hash: row.block_hash,
            block_timestamp: row.block_timestamp,
            tx_index: row.tx_index.map(|i| i as u32),
            nonce: row.nonce.map(|n| n as u64),
            tx_type: row.tx_type,
            status: row.status,
            chain_id: row.chain_id as u64,
        })
    }
}

#[async_trait]
impl TransactionStore for PostgresStore {
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_batch(&self, rows: &[TransactionRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        // Conflict-ignore on the hash is authoritative for deduplication:
        // replayed pages and duplicate hashes within a page are absorbed here.
        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;
        let mut inserted = 0u64;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO transactions (
                    tx_hash, wallet_address, contract_address, to_address,
                    function_selector, function_name, input_data, eth_value,
                    gas_limit, gas_used, gas_price, effective_gas_price,
                    max_fee_per_gas, max_priority_fee_per_gas, burned_fees,
                    l1_gas_used, l1_gas_price, l1_fee, block_number, block_hash,
                    block_timestamp, tx_index, nonce, tx_type, status, chain_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                        $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
                ON CONFLICT (tx_hash) DO NOTHING
                "#,
            )
            .bind(row.tx_hash.to_hex())
            .bind(row.wallet_address.to_hex())
            .bind(row.contract_address.to_hex())
            .bind(row.to_address.map(|a| a.to_hex()))
            .bind(row.function_selector.as_deref())
            .bind(row.function_name.as_deref())
            .bind(row.input_data.as_deref())
            .bind(row.eth_value.to_bigdecimal())
            .bind(row.gas_limit.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.gas_used.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.gas_price.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.effective_gas_price.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.max_fee_per_gas.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(
                row.max_priority_fee_per_gas
                    .as_ref()
                    .map(WeiAmount::to_bigdecimal),
            )
            .bind(row.burned_fees.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.l1_gas_used.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.l1_gas_price.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.l1_fee.as_ref().map(WeiAmount::to_bigdecimal))
            .bind(row.block_number.value() as i64)
            .bind(row.block_hash.as_deref())
            .bind(row.block_timestamp)
            .bind(row.tx_index.map(|i| i as i32))
            .bind(row.nonce.map(|n| n as i64))
            .bind(row.tx_type)
            .bind(row.status)
            .bind(row.chain_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(InfraError::Database)?;

        debug!(inserted, "Transaction batch inserted");
        Ok(inserted)
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn contains(&self, hash: &TxHash) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM transactions WHERE tx_hash = $1)")
                .bind(hash.to_hex())
                .fetch_one(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        Ok(exists)
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn get(&self, hash: &TxHash) -> Result<Option<TransactionRecord>> {
        let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE tx_hash = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(hash.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn count_for_contract(&self, address: &EthAddress) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE contract_address = $1")
                .bind(address.to_hex())
                .fetch_one(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        Ok(count as u64)
    }

    #[instrument(skip(self), fields(address = %address, limit, offset))]
    async fn pending_enrichment(
        &self,
        address: &EthAddress,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<TransactionRecord>> {
        // Several column names exist in both tables; qualify the shared
        // list against the base table before joining.
        let qualified = TX_COLUMNS
            .split(", ")
            .map(|col| format!("t.{}", col.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {qualified}
            FROM transactions t
            LEFT JOIN enrichments e ON e.tx_hash = t.tx_hash
            WHERE t.contract_address = $1 AND e.tx_hash IS NULL
            ORDER BY t.block_timestamp ASC, t.tx_hash ASC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(address.to_hex())
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|r| TransactionRecord::try_from(r).map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn inserted_since(
        &self,
        address: &EthAddress,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let sql = format!(
            r#"
            SELECT {TX_COLUMNS} FROM transactions
            WHERE contract_address = $1 AND created_at > $2
            ORDER BY created_at ASC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(address.to_hex())
            .bind(since)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|r| TransactionRecord::try_from(r).map_err(Into::into))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENRICHMENT STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

const ENRICHMENT_COLUMNS: &str = "tx_hash, contract_address, value, gas_used, gas_price, \
     gas_limit, burned_fees, l1_gas_used, l1_gas_price, l1_fee, contract_verified, method_id, \
     method_full, input, logs, operations, created_at, updated_at";

const ENRICHMENT_UPSERT: &str = r#"
    INSERT INTO enrichments (
        tx_hash, contract_address, value, gas_used, gas_price, gas_limit,
        burned_fees, l1_gas_used, l1_gas_price, l1_fee, contract_verified,
        method_id, method_full, input, logs, operations, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW(), NOW())
    ON CONFLICT (tx_hash) DO UPDATE SET
        logs = EXCLUDED.logs,
        operations = EXCLUDED.operations,
        updated_at = NOW()
"#;

/// Database row for enrichments.
#[derive(Debug, FromRow)]
struct EnrichmentRow {
    tx_hash: String,
    contract_address: String,
    value: Option<sqlx::types::BigDecimal>,
    gas_used: Option<sqlx::types::BigDecimal>,
    gas_price: Option<sqlx::types::BigDecimal>,
    gas_limit: Option<sqlx::types::BigDecimal>,
    burned_fees: Option<sqlx::types::BigDecimal>,
    l1_gas_used: Option<sqlx::types::BigDecimal>,
    l1_gas_price: Option<sqlx::types::BigDecimal>,
    l1_fee: Option<sqlx::types::BigDecimal>,
    contract_verified: bool,
    method_id: Option<String>,
    method_full: Option<String>,
    input: Option<String>,
    logs: serde_json::Value,
    operations: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EnrichmentRow> for EnrichmentRecord {
    type Error = InfraError;

    fn try_from(row: EnrichmentRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            tx_hash: TxHash::from_hex(&row.tx_hash)
                .map_err(|e| InfraError::Internal(format!("Invalid hash in DB: {e}")))?,
            contract_address: EthAddress::from_hex(&row.contract_address)
                .map_err(|e| InfraError::Internal(format!("Invalid address in DB: {e}")))?,
            value: row.value.as_ref().map(WeiAmount::from_bigdecimal),
            gas_used: row.gas_used.as_ref().map(WeiAmount::from_bigdecimal),
            gas_price: row.gas_price.as_ref().map(WeiAmount::from_bigdecimal),
            gas_limit: row.gas_limit.as_ref().map(WeiAmount::from_bigdecimal),
            burned_fees: row.burned_fees.as_ref().map(WeiAmount::from_bigdecimal),
            l1_gas_used: row.l1_gas_used.as_ref().map(WeiAmount::from_bigdecimal),
            l1_gas_price: row.l1_gas_price.as_ref().map(WeiAmount::from_bigdecimal),
            l1_fee: row.l1_fee.as_ref().map(WeiAmount::from_bigdecimal),
            contract_verified: row.contract_verified,
            method_id: row.method_id,
            method_full: row.method_full,
            input: row.input,
            logs: row.logs,
            operations: row.operations,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Bind one enrichment record's columns onto the upsert statement.
fn bind_enrichment<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    record: &'q EnrichmentRecord,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(record.tx_hash.to_hex())
        .bind(record.contract_address.to_hex())
        .bind(record.value.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.gas_used.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.gas_price.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.gas_limit.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.burned_fees.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.l1_gas_used.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.l1_gas_price.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.l1_fee.as_ref().map(WeiAmount::to_bigdecimal))
        .bind(record.contract_verified)
        .bind(record.method_id.as_deref())
        .bind(record.method_full.as_deref())
        .bind(record.input.as_deref())
        .bind(&record.logs)
        .bind(&record.operations)
}

#[async_trait]
impl EnrichmentStore for PostgresStore {
    #[instrument(skip(self, record), fields(hash = %record.tx_hash))]
    async fn upsert(&self, record: &EnrichmentRecord) -> Result<()> {
        bind_enrichment(sqlx::query(ENRICHMENT_UPSERT), record)
            .execute(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        debug!("Enrichment upserted");
        Ok(())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_batch(&self, records: &[EnrichmentRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;
        let mut written = 0u64;

        for record in records {
            let result = bind_enrichment(sqlx::query(ENRICHMENT_UPSERT), record)
                .execute(&mut *tx)
                .await
                .map_err(InfraError::Database)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(InfraError::Database)?;

        debug!(written, "Enrichment batch upserted");
        Ok(written)
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn exists(&self, hash: &TxHash) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM enrichments WHERE tx_hash = $1)")
                .bind(hash.to_hex())
                .fetch_one(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        Ok(exists)
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn get(&self, hash: &TxHash) -> Result<Option<EnrichmentRecord>> {
        let sql = format!("SELECT {ENRICHMENT_COLUMNS} FROM enrichments WHERE tx_hash = $1");
        let row = sqlx::query_as::<_, EnrichmentRow>(&sql)
            .bind(hash.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn count_for_contract(&self, address: &EthAddress) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrichments WHERE contract_address = $1")
                .bind(address.to_hex())
                .fetch_one(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        Ok(count as u64)
    }

    #[instrument(skip(self))]
    async fn deficit_by_contract(&self) -> Result<Vec<(EthAddress, u64)>> {
        let rows = sqlx::query(
            r#"
            SELECT t.contract_address, COUNT(*) AS deficit
            FROM transactions t
            LEFT JOIN enrichments e ON e.tx_hash = t.tx_hash
            WHERE e.tx_hash IS NULL
            GROUP BY t.contract_address
            ORDER BY deficit DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|row| {
                let address: String = row.try_get("contract_address").map_err(InfraError::Database)?;
                let deficit: i64 = row.try_get("deficit").map_err(InfraError::Database)?;
                let address = EthAddress::from_hex(&address)
                    .map_err(|e| InfraError::Internal(format!("Invalid address in DB: {e}")))?;
                Ok((address, deficit as u64))
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JOB STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

const JOB_COLUMNS: &str = "id, job_type, contract_id, priority, status, payload, attempts, \
     max_attempts, error_message, run_after, created_at, started_at, completed_at";

/// Database row for jobs.
#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    job_type: String,
    contract_id: i64,
    priority: i32,
    status: String,
    payload: serde_json::Value,
    attempts: i32,
    max_attempts: i32,
    error_message: Option<String>,
    run_after: DateTime<Utc>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for BackfillJob {
    type Error = InfraError;

    fn try_from(row: JobRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_type: row.job_type,
            contract_id: row.contract_id,
            priority: row.priority,
            status: row
                .status
                .parse::<JobStatus>()
                .map_err(|e| InfraError::Internal(format!("Invalid job status in DB: {e}")))?,
            payload: serde_json::from_value::<JobPayload>(row.payload)
                .map_err(|e| InfraError::Internal(format!("Invalid job payload in DB: {e}")))?,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            error_message: row.error_message,
            run_after: row.run_after,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    #[instrument(skip(self, job), fields(contract_id = job.contract_id))]
    async fn enqueue(&self, job: &NewJob) -> Result<BackfillJob> {
        let payload =
            serde_json::to_value(&job.payload).map_err(InfraError::Serialization)?;

        let sql = format!(
            r#"
            INSERT INTO job_queue (job_type, contract_id, priority, payload, max_attempts)
            VALUES ('backfill', $1, $2, $3, $4)
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job.contract_id)
            .bind(job.priority)
            .bind(payload)
            .bind(job.max_attempts)
            .fetch_one(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        debug!(id = row.id, "Job enqueued");
        Ok(row.try_into()?)
    }

    #[instrument(skip(self))]
    async fn open_job_for_contract(&self, contract_id: i64) -> Result<Option<BackfillJob>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS} FROM job_queue
            WHERE contract_id = $1 AND status IN ('pending', 'processing')
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(contract_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn claim_next(&self) -> Result<Option<BackfillJob>> {
        // FOR UPDATE SKIP LOCKED keeps two claimants from both receiving
        // the same row even under concurrent claim traffic.
        let sql = format!(
            r#"
            UPDATE job_queue SET status = 'processing', started_at = COALESCE(started_at, NOW())
            WHERE id = (
                SELECT id FROM job_queue
                WHERE status = 'pending' AND attempts < max_attempts AND run_after <= NOW()
                ORDER BY priority ASC, created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(id, progress))]
    async fn set_progress(&self, id: i64, progress: f64, resume_token: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_queue
            SET payload = jsonb_set(
                    jsonb_set(payload, '{progress}', to_jsonb($2::double precision)),
                    '{resume_token}', COALESCE(to_jsonb($3::text), 'null'::jsonb))
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(progress)
        .bind(resume_token)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self), fields(id))]
    async fn mark_completed(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'completed', completed_at = NOW(), error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Job completed");
        Ok(())
    }

    #[instrument(skip(self, error), fields(id))]
    async fn record_failure(&self, id: i64, error: &str) -> Result<JobStatus> {
        let status: String = sqlx::query_scalar(
            r#"
            UPDATE job_queue
            SET attempts = attempts + 1,
                error_message = $2,
                status = CASE WHEN attempts + 1 < max_attempts THEN 'pending' ELSE 'failed' END,
                run_after = NOW() + make_interval(secs => 60.0 * power(2, attempts)),
                completed_at = CASE WHEN attempts + 1 < max_attempts THEN NULL ELSE NOW() END
            WHERE id = $1
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_one(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(status
            .parse::<JobStatus>()
            .map_err(|e| InfraError::Internal(format!("Invalid job status in DB: {e}")))?)
    }

    #[instrument(skip(self), fields(id))]
    async fn release(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'pending'
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Job released back to pending");
        Ok(())
    }

    #[instrument(skip(self), fields(id))]
    async fn cancel(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'cancelled', completed_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(id))]
    async fn retry(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'pending', attempts = 0, error_message = NULL,
                run_after = NOW(), completed_at = NULL
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        if result.rows_affected() == 0 {
            return Err(crate::error::DomainError::InvalidStateTransition {
                from: "non-failed".into(),
                to: "pending".into(),
            }
            .into());
        }

        Ok(())
    }

    #[instrument(skip(self), fields(id))]
    async fn get(&self, id: i64) -> Result<Option<BackfillJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<BackfillJob>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM job_queue WHERE status = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql =
                    format!("SELECT {JOB_COLUMNS} FROM job_queue ORDER BY created_at DESC");
                sqlx::query_as::<_, JobRow>(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|r| BackfillJob::try_from(r).map_err(Into::into))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    // Note: Full integration tests require a PostgreSQL database
    // and are located in tests/store_integration.rs

    #[test]
    fn postgres_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresStore>();
    }
}
