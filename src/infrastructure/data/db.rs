// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::data::schema::{CycleRecord, TransactionRecord};
use crate::domain::types::ExecutionReceipt;
use alloy::primitives::{Address, U256};
use sqlx::{
    Pool, Row, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

/// One row of the append-only cycle log.
#[derive(Debug, Clone)]
pub struct CycleAudit {
    pub chain_id: u64,
    pub owner: Address,
    pub weights_json: String,
    pub signals_json: String,
    pub actions_json: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultFlow {
    Deposit,
    Redeem,
}

impl VaultFlow {
    fn as_str(&self) -> &'static str {
        match self {
            VaultFlow::Deposit => "deposit",
            VaultFlow::Redeem => "redeem",
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Initialization(format!("DB Connect failed: {}", e)))?
            .create_if_missing(true);

        // Every in-memory connection is its own database; keep a single one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Initialization(format!("DB Connect failed: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Initialization(format!("DB Migration failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn record_cycle(&self, audit: &CycleAudit) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO rebalance_cycles (chain_id, owner_address, weights_json, signals_json, actions_json, summary)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(audit.chain_id as i64)
        .bind(format!("{:#x}", audit.owner))
        .bind(&audit.weights_json)
        .bind(&audit.signals_json)
        .bind(&audit.actions_json)
        .bind(&audit.summary)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("DB cycle insert failed: {e}")))?;
        Ok(row.get("id"))
    }

    pub async fn record_transaction(
        &self,
        chain_id: u64,
        from: Address,
        to: Option<Address>,
        receipt: &ExecutionReceipt,
    ) -> Result<i64, AppError> {
        let tx_hash = format!("{:#x}", receipt.tx_hash);
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (tx_hash, chain_id, phase, from_address, to_address, nonce, status, block_number)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&tx_hash)
        .bind(chain_id as i64)
        .bind(receipt.phase.as_str())
        .bind(format!("{:#x}", from))
        .bind(to.map(|a| format!("{:#x}", a)))
        .bind(receipt.nonce as i64)
        .bind(receipt.status.as_str())
        .bind(receipt.block_number.map(|b| b as i64))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Transaction {
            hash: tx_hash.clone(),
            reason: e.to_string(),
        })?;
        Ok(row.get("id"))
    }

    pub async fn record_vault_flow(
        &self,
        chain_id: u64,
        vault: Address,
        owner: Address,
        flow: VaultFlow,
        amount: U256,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO vault_flows (chain_id, vault_address, owner_address, direction, amount_wei)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(chain_id as i64)
        .bind(format!("{:#x}", vault))
        .bind(format!("{:#x}", owner))
        .bind(flow.as_str())
        .bind(amount.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("DB vault flow insert failed: {e}")))?;
        Ok(())
    }

    /// Net underlying deposited into `vault` by `owner`, or `None` with no history.
    pub async fn vault_principal(
        &self,
        chain_id: u64,
        vault: Address,
        owner: Address,
    ) -> Result<Option<U256>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT direction, amount_wei FROM vault_flows
            WHERE chain_id = ? AND vault_address = ? AND owner_address = ?
            ORDER BY id ASC
            "#,
        )
        .bind(chain_id as i64)
        .bind(format!("{:#x}", vault))
        .bind(format!("{:#x}", owner))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("DB vault flow query failed: {e}")))?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut principal = U256::ZERO;
        for row in rows {
            let direction: String = row.get("direction");
            let raw: String = row.get("amount_wei");
            let amount = U256::from_str(&raw).unwrap_or_default();
            principal = if direction == VaultFlow::Deposit.as_str() {
                principal.saturating_add(amount)
            } else {
                principal.saturating_sub(amount)
            };
        }
        Ok(Some(principal))
    }

    pub async fn recent_cycles(&self, limit: i64) -> Result<Vec<CycleRecord>, AppError> {
        sqlx::query_as::<_, CycleRecord>(
            "SELECT * FROM rebalance_cycles ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("DB cycle query failed: {e}")))
    }

    pub async fn recent_transactions(&self, limit: i64) -> Result<Vec<TransactionRecord>, AppError> {
        sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("DB transaction query failed: {e}")))
    }
}
