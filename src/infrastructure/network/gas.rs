// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::network::provider::HttpProvider;
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::FeeHistory;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GWEI: u128 = 1_000_000_000;
const DEFAULT_PRIORITY_FEE: u128 = 2 * GWEI;

#[derive(Clone)]
pub struct GasOracle {
    provider: HttpProvider,
    max_fee_cap_wei: u128,
    last_good: Arc<Mutex<Option<GasFees>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub next_base_fee_per_gas: u128,
}

impl GasOracle {
    pub fn new(provider: HttpProvider, max_gas_price_gwei: u64) -> Self {
        Self {
            provider,
            max_fee_cap_wei: u128::from(max_gas_price_gwei).saturating_mul(GWEI),
            last_good: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn estimate_eip1559_fees(&self) -> Result<GasFees, AppError> {
        match self.with_retry_history().await {
            Ok(history) => {
                let fees = Self::fees_from_history(&history, self.max_fee_cap_wei)?;
                if let Ok(mut guard) = self.last_good.lock() {
                    *guard = Some(fees.clone());
                }
                Ok(fees)
            }
            Err(e) => {
                if let Ok(guard) = self.last_good.lock()
                    && let Some(fees) = guard.clone()
                {
                    tracing::debug!(target: "gas", error = %e, "Fee history failed; reusing last good fees");
                    return Ok(fees);
                }
                self.fallback_estimate().await
            }
        }
    }

    async fn with_retry_history(&self) -> Result<FeeHistory, AppError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move {
                    provider
                        .get_fee_history(5, BlockNumberOrTag::Latest, &[50.0f64])
                        .await
                }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Fee History failed: {}", e)))
    }

    fn fees_from_history(history: &FeeHistory, cap: u128) -> Result<GasFees, AppError> {
        let latest_base_fee = history
            .latest_block_base_fee()
            .or_else(|| history.base_fee_per_gas.iter().rev().nth(1).copied())
            .ok_or(AppError::Initialization("No base fee history".into()))?;
        let next_base_fee = history.next_block_base_fee().unwrap_or(latest_base_fee);

        let tips: Vec<u128> = history
            .reward
            .as_ref()
            .map(|rewards| rewards.iter().filter_map(|r| r.first().copied()).collect())
            .unwrap_or_default();
        Self::fees_from_samples(next_base_fee, &tips, cap)
    }

    /// Rebalance transactions are not latency sensitive: median tip, and twice
    /// the next base fee so the transaction stays valid for a few blocks.
    ///
    /// `cap` (0 disables it) is a hard ceiling on `max_fee_per_gas`. When the next
    /// base fee plus tip is already above it, nothing is sent this cycle.
    pub fn fees_from_samples(
        next_base_fee: u128,
        tips: &[u128],
        cap: u128,
    ) -> Result<GasFees, AppError> {
        let priority = if tips.is_empty() {
            DEFAULT_PRIORITY_FEE
        } else {
            let mut sorted = tips.to_vec();
            sorted.sort_unstable();
            sorted[sorted.len() / 2]
        };
        let floor = next_base_fee.saturating_add(priority);
        if cap > 0 && floor > cap {
            return Err(AppError::Strategy(format!(
                "Gas price above cap: next base {} gwei + tip {} gwei > {} gwei",
                next_base_fee / GWEI,
                priority / GWEI,
                cap / GWEI
            )));
        }
        let mut max_fee = next_base_fee.saturating_mul(2).saturating_add(priority);
        if cap > 0 {
            max_fee = max_fee.min(cap);
        }
        Ok(GasFees {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority.min(max_fee),
            next_base_fee_per_gas: next_base_fee,
        })
    }

    async fn fallback_estimate(&self) -> Result<GasFees, AppError> {
        // Nodes that disable feeHistory (common on some public RPCs).
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| AppError::Connection(format!("Latest block fetch failed: {}", e)))?;

        let base: u128 = block
            .as_ref()
            .and_then(|b| b.header.base_fee_per_gas)
            .map(|v| v as u128)
            .unwrap_or(3 * GWEI / 2);
        let priority: u128 = self
            .provider
            .get_max_priority_fee_per_gas()
            .await
            .unwrap_or(DEFAULT_PRIORITY_FEE);

        let next_base = base.saturating_mul(1125) / 1000;
        Self::fees_from_samples(next_base, &[priority], self.max_fee_cap_wei)
    }
}
