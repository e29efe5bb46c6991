// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use std::time::Duration;

/// Reads the signer's transaction count straight from chain.
///
/// Only one transaction from the signer is in flight at a time, so nothing is
/// cached: the pending count is the next nonce and the latest count tells
/// whether a submitted nonce has been consumed.
#[derive(Clone)]
pub struct NonceManager {
    provider: HttpProvider,
    address: Address,
}

impl NonceManager {
    pub fn new(provider: HttpProvider, address: Address) -> Self {
        Self { provider, address }
    }

    pub async fn next_nonce(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        let address = self.address;
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }

    /// Count of transactions from the signer included in the latest block.
    pub async fn confirmed_count(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        let address = self.address;
        let count = retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).latest().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch confirmed nonce: {}", e)))?;
        tracing::trace!(target: "nonce", address = %address, count, "Confirmed transaction count");
        Ok(count)
    }
}
