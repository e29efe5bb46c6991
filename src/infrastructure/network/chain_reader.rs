// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::data::abi::{ERC20, ERC4626Vault};
use crate::network::provider::HttpProvider;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
}

/// Read-only view of token and vault state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, AppError>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, AppError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError>;

    async fn vault_shares(&self, vault: Address, owner: Address) -> Result<U256, AppError>;

    /// Underlying token the vault accepts and redeems into.
    async fn vault_asset(&self, vault: Address) -> Result<Address, AppError>;

    /// Underlying assets `shares` would redeem for right now.
    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256, AppError>;

    /// Shares that must be burned to withdraw `assets` right now.
    async fn preview_withdraw(&self, vault: Address, assets: U256) -> Result<U256, AppError>;
}

pub struct RpcChainReader {
    provider: HttpProvider,
    metadata: DashMap<Address, TokenMetadata>,
}

impl RpcChainReader {
    pub fn new(provider: HttpProvider) -> Self {
        Self {
            provider,
            metadata: DashMap::new(),
        }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, AppError> {
        // Symbol and decimals never change for a deployed token.
        if let Some(cached) = self.metadata.get(&token) {
            return Ok(cached.clone());
        }

        let contract = ERC20::new(token, self.provider.clone());
        let decimals: u8 = retry_async(
            |_| {
                let c = contract.clone();
                async move { c.decimals().call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("decimals() failed for {token:#x}: {e}")))?;
        let symbol = match contract.symbol().call().await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(target: "chain_reader", token = %token, error = %e, "symbol() unavailable");
                format!("{token:#x}")
            }
        };

        let meta = TokenMetadata { symbol, decimals };
        self.metadata.insert(token, meta.clone());
        Ok(meta)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        let contract = ERC20::new(token, self.provider.clone());
        retry_async(
            |_| {
                let c = contract.clone();
                async move { c.balanceOf(owner).call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Token balance failed for {token:#x}: {e}")))
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError> {
        let contract = ERC20::new(token, self.provider.clone());
        retry_async(
            |_| {
                let c = contract.clone();
                async move { c.allowance(owner, spender).call().await }
            },
            2,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Allowance check failed for {token:#x}: {e}")))
    }

    async fn vault_shares(&self, vault: Address, owner: Address) -> Result<U256, AppError> {
        let contract = ERC4626Vault::new(vault, self.provider.clone());
        retry_async(
            |_| {
                let c = contract.clone();
                async move { c.balanceOf(owner).call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Vault share read failed for {vault:#x}: {e}")))
    }

    async fn vault_asset(&self, vault: Address) -> Result<Address, AppError> {
        let contract = ERC4626Vault::new(vault, self.provider.clone());
        retry_async(
            |_| {
                let c = contract.clone();
                async move { c.asset().call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Vault asset read failed for {vault:#x}: {e}")))
    }

    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256, AppError> {
        if shares.is_zero() {
            return Ok(U256::ZERO);
        }
        let contract = ERC4626Vault::new(vault, self.provider.clone());
        retry_async(
            |_| {
                let c = contract.clone();
                async move { c.previewRedeem(shares).call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("previewRedeem failed for {vault:#x}: {e}")))
    }

    async fn preview_withdraw(&self, vault: Address, assets: U256) -> Result<U256, AppError> {
        if assets.is_zero() {
            return Ok(U256::ZERO);
        }
        let contract = ERC4626Vault::new(vault, self.provider.clone());
        retry_async(
            |_| {
                let c = contract.clone();
                async move { c.previewWithdraw(assets).call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("previewWithdraw failed for {vault:#x}: {e}")))
    }
}
