// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use chrono::NaiveDateTime;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct CycleRecord {
    pub id: i64,
    pub chain_id: i64,
    pub owner_address: String,
    pub weights_json: String,
    pub signals_json: String,
    pub actions_json: String,
    pub summary: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub tx_hash: String,
    pub chain_id: i64,
    pub phase: String,
    pub from_address: String,
    pub to_address: Option<String>,
    pub nonce: i64,
    pub status: String,
    pub block_number: Option<i64>,
    pub timestamp: NaiveDateTime,
}
