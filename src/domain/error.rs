// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error("Strategy execution error: {0}")]
    Strategy(String),

    #[error("External API error: {provider} responded with {status}")]
    ApiCall { provider: String, status: u16 },

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Address {0} is invalid or not checksummed")]
    InvalidAddress(String),

    #[error("Desired allocation sums to {total} bps, expected 10000")]
    InvalidAllocation { total: u64 },

    #[error("Valuation unavailable for {token}: {reason}")]
    ValuationUnavailable { token: Address, reason: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Why a single pipeline phase produced nothing this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("approval of {token} for {spender} failed: {reason}")]
    ApprovalFailed {
        token: Address,
        spender: Address,
        reason: String,
    },

    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    #[error("transaction {hash} dropped (nonce {nonce} consumed without receipt)")]
    Dropped { hash: String, nonce: u64 },

    #[error("transaction {hash} unconfirmed after {attempts} attempts")]
    Unconfirmed { hash: String, attempts: u32 },

    #[error("transaction {hash} reverted on-chain")]
    Reverted { hash: String },

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("cancelled before simulation")]
    Cancelled,
}

impl From<AppError> for PhaseError {
    fn from(err: AppError) -> Self {
        PhaseError::Collaborator(err.to_string())
    }
}
