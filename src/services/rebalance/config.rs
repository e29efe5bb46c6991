// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{
    BPS_DENOMINATOR, DEFAULT_LIMIT_BPS, DEFAULT_RECEIPT_MAX_ATTEMPTS, DEFAULT_RECEIPT_POLL_MS,
    DEFAULT_SLIPPAGE_BPS, MAX_SLIPPAGE_BPS,
};
use crate::domain::error::AppError;
use alloy::primitives::Address;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// How long to wait for a submitted transaction and whether a consumed nonce
/// without a receipt counts as dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub drop_detection: bool,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECEIPT_MAX_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_MS),
            drop_detection: true,
        }
    }
}

/// Settings for one rebalance cycle. Built once from `GlobalSettings` and
/// passed by reference to every stage.
#[derive(Debug, Clone)]
pub struct RebalanceConfig {
    pub chain_id: u64,
    pub protocol: String,
    /// Agent contract executing each phase bundle.
    pub router: Address,
    /// DEX router used for quotes and swaps.
    pub dex_router: Address,
    pub limit_bps: u64,
    pub slippage_bps: u64,
    pub technical_analysis: bool,
    pub signal_timeframe: String,
    /// Underlying token -> yield vault.
    pub vaults: HashMap<Address, Address>,
    /// Tokens valued 1:1 with the quote token by decimal scaling.
    pub pegged_stables: HashSet<Address>,
    pub confirmation: ConfirmationPolicy,
    pub dry_run: bool,
    /// Size sells with the price captured at valuation instead of a fresh quote.
    pub reuse_valuation_price: bool,
}

impl RebalanceConfig {
    pub fn new(chain_id: u64, router: Address, dex_router: Address) -> Self {
        Self {
            chain_id,
            protocol: "uniswap_v2".to_string(),
            router,
            dex_router,
            limit_bps: DEFAULT_LIMIT_BPS,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            technical_analysis: false,
            signal_timeframe: "1h".to_string(),
            vaults: HashMap::new(),
            pegged_stables: HashSet::new(),
            confirmation: ConfirmationPolicy::default(),
            dry_run: false,
            reuse_valuation_price: false,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.router == Address::ZERO {
            return Err(AppError::Config("Rebalance router address is not set".into()));
        }
        if self.dex_router == Address::ZERO {
            return Err(AppError::Config(format!(
                "No DEX router for protocol {} on chain {}",
                self.protocol, self.chain_id
            )));
        }
        if self.limit_bps > BPS_DENOMINATOR {
            return Err(AppError::Validation {
                field: "limit_bps".into(),
                message: format!("{} exceeds {}", self.limit_bps, BPS_DENOMINATOR),
            });
        }
        if self.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(AppError::Validation {
                field: "slippage_bps".into(),
                message: format!("{} exceeds {}", self.slippage_bps, MAX_SLIPPAGE_BPS),
            });
        }
        if self.confirmation.max_attempts == 0 {
            return Err(AppError::Validation {
                field: "receipt_max_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.technical_analysis && self.signal_timeframe.trim().is_empty() {
            return Err(AppError::Validation {
                field: "signal_timeframe".into(),
                message: "required when technical analysis is enabled".into(),
            });
        }
        if let Some((token, _)) = self.vaults.iter().find(|(_, v)| **v == Address::ZERO) {
            return Err(AppError::Validation {
                field: "vaults".into(),
                message: format!("vault for {token:#x} is the zero address"),
            });
        }
        Ok(())
    }

    pub fn vault_for(&self, token: &Address) -> Option<Address> {
        self.vaults.get(token).copied()
    }

    /// Quote token and pegged stables skip the price source.
    pub fn uses_fixed_scaling(&self, token: &Address, quote_token: &Address) -> bool {
        token == quote_token || self.pegged_stables.contains(token)
    }
}
